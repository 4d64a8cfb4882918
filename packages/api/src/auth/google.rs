//! # Google OAuth 2.0 implementation
//!
//! Implements [`IdentityProvider`] against Google's endpoints: authorization code with
//! PKCE, refresh, and revocation.
//!
//! ## Types
//!
//! - [`GoogleUser`]: deserialization target for the Google userinfo API response
//!   (`googleapis.com/oauth2/v2/userinfo`).
//! - [`GoogleIdClaims`]: the subset of ID token claims we read.
//! - [`ConfiguredClient`]: a fully-typed `oauth2::Client` alias with auth and token
//!   endpoints set, parsing Google's extra `id_token` field.
//! - [`GoogleOAuth`]: the public handler that wraps an [`OAuthConfig`].
//!
//! ## Flow
//!
//! 1. **[`authorization_url`](GoogleOAuth::authorization_url)**: requests `openid`,
//!    `email` and `profile` with `access_type=offline` and `prompt=consent`, so Google
//!    hands out a refresh token on every consent.
//!
//! 2. **[`exchange_code`](GoogleOAuth::exchange_code)**: trades the code and PKCE
//!    verifier for tokens. The identity comes from the returned ID token (audience and
//!    issuer checked). When the response has no ID token the userinfo endpoint is
//!    asked instead.
//!
//! 3. **[`refresh`](GoogleOAuth::refresh)** and **[`revoke`](GoogleOAuth::revoke)**:
//!    the token endpoint with `grant_type=refresh_token`, and a form post of `token=`
//!    to the revocation endpoint. Google answers `invalid_token` for tokens that are
//!    already dead; that counts as revoked.
//!
//! The ID token signature is not checked: it arrives directly from Google's token
//! endpoint over TLS, on a request authenticated with the client secret.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, ExtraTokenFields,
    PkceCodeChallenge, PkceCodeVerifier, RefreshToken, RequestTokenError, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenResponse,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::config::OAuthConfig;
use super::provider::{
    IdentityProvider, ProviderError, ProviderGrant, ProviderIdentity, ProviderTokens,
};

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Google user info from API.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

/// ID token claims.
#[derive(Debug, Deserialize)]
struct GoogleIdClaims {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Google's token response carries an `id_token` next to the standard fields.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct GoogleTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

impl ExtraTokenFields for GoogleTokenFields {}

type GoogleTokenResponse = StandardTokenResponse<GoogleTokenFields, BasicTokenType>;

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Debug, Deserialize)]
struct RevocationErrorBody {
    error: String,
}

/// Google OAuth handler.
pub struct GoogleOAuth {
    config: OAuthConfig,
    http: Client,
}

impl GoogleOAuth {
    pub fn new(config: OAuthConfig) -> Result<Self, ProviderError> {
        // Token requests must never follow redirects.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self { config, http })
    }

    fn create_client(&self) -> ConfiguredClient {
        oauth2::Client::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    fn identity_from_id_token(&self, id_token: &str) -> Result<ProviderIdentity, ProviderError> {
        let mut segments = id_token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(ProviderError::Rejected("malformed id_token".into())),
        };

        let json = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ProviderError::Rejected(format!("malformed id_token: {e}")))?;
        let claims: GoogleIdClaims = serde_json::from_slice(&json)
            .map_err(|e| ProviderError::Rejected(format!("malformed id_token: {e}")))?;

        if claims.aud != *self.config.client_id {
            return Err(ProviderError::Rejected("id_token audience mismatch".into()));
        }
        if !GOOGLE_ISSUERS.contains(&claims.iss.as_str()) {
            return Err(ProviderError::Rejected(format!(
                "id_token issuer {} is not Google",
                claims.iss
            )));
        }
        let email = claims
            .email
            .ok_or_else(|| ProviderError::Rejected("id_token carries no email".into()))?;

        Ok(ProviderIdentity {
            subject_id: claims.sub,
            email,
            name: claims.name,
            picture: claims.picture,
        })
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<ProviderIdentity, ProviderError> {
        let response = self
            .http
            .get(self.config.userinfo_url.as_str())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ProviderError::Rejected(format!("userinfo returned {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("userinfo returned {status}")));
        }

        let user: GoogleUser = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(ProviderIdentity {
            subject_id: user.id,
            email: user.email,
            name: user.name,
            picture: user.picture,
        })
    }
}

fn tokens_of(response: &GoogleTokenResponse) -> ProviderTokens {
    ProviderTokens {
        access_token: response.access_token().secret().clone(),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
    }
}

fn token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> ProviderError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => {
            let code = response.error().as_ref().to_string();
            match response.error_description() {
                Some(description) => ProviderError::Rejected(format!("{code}: {description}")),
                None => ProviderError::Rejected(code),
            }
        }
        RequestTokenError::Request(e) => ProviderError::Unavailable(e.to_string()),
        RequestTokenError::Parse(e, _) => {
            ProviderError::Unavailable(format!("unparseable token response: {e}"))
        }
        RequestTokenError::Other(message) => ProviderError::Unavailable(message),
        #[allow(unreachable_patterns)]
        _ => ProviderError::Unavailable("token request failed".into()),
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    fn authorization_url(&self, state: &str, pkce_challenge: PkceCodeChallenge) -> String {
        let client = self.create_client();
        let (auth_url, _) = client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        auth_url.to_string()
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ProviderGrant, ProviderError> {
        let client = self.create_client();

        let response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(token_error)?;

        let tokens = tokens_of(&response);
        let identity = match response.extra_fields().id_token.as_deref() {
            Some(id_token) => self.identity_from_id_token(id_token)?,
            None => {
                tracing::debug!("Token response had no id_token, asking userinfo");
                self.fetch_userinfo(&tokens.access_token).await?
            }
        };

        Ok(ProviderGrant {
            tokens,
            identity: Some(identity),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderGrant, ProviderError> {
        let client = self.create_client();
        let refresh_token = RefreshToken::new(refresh_token.to_string());

        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
            .map_err(token_error)?;

        let identity = match response.extra_fields().id_token.as_deref() {
            Some(id_token) => Some(self.identity_from_id_token(id_token)?),
            None => None,
        };

        Ok(ProviderGrant {
            tokens: tokens_of(&response),
            identity,
        })
    }

    async fn revoke(&self, token: &str) -> Result<(), ProviderError> {
        let response = self
            .http
            .post(self.config.revocation_url.as_str())
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: Option<RevocationErrorBody> = response.json().await.ok();
        match body {
            Some(body) if status.is_client_error() && body.error == "invalid_token" => {
                tracing::debug!("Token was already revoked");
                Ok(())
            }
            Some(body) if status.is_client_error() => Err(ProviderError::Rejected(body.error)),
            _ => Err(ProviderError::Unavailable(format!(
                "revocation endpoint returned {status}"
            ))),
        }
    }
}
