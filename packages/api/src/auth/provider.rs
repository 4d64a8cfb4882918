//! The seam between session handling and the OAuth identity provider.
//!
//! Everything above this trait (code exchange, refresh, revoke) is provider-agnostic
//! and is tested against an in-memory fake; [`GoogleOAuth`](super::GoogleOAuth) is the
//! production implementation.

use async_trait::async_trait;
use oauth2::PkceCodeChallenge;

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    /// Only present on the first consent, or when the provider rotates it.
    pub refresh_token: Option<String>,
}

/// Who the provider says signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub subject_id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderGrant {
    pub tokens: ProviderTokens,
    /// Always set after a code exchange. Set after a refresh only when the provider
    /// returned a fresh ID token.
    pub identity: Option<ProviderIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered and said no (bad code, revoked grant, bad ID token).
    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    /// Transport failure, 5xx, or an unparseable answer.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The URL the user agent is sent to, carrying `state` and the PKCE challenge.
    fn authorization_url(&self, state: &str, pkce_challenge: PkceCodeChallenge) -> String;

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ProviderGrant, ProviderError>;

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderGrant, ProviderError>;

    /// Revoke a provider token. Already-revoked tokens count as success.
    async fn revoke(&self, token: &str) -> Result<(), ProviderError>;
}
