//! Minting and verifying session credentials.

use std::sync::Arc;

use chrono::Duration;

use super::provider::ProviderIdentity;
use crate::clock::Clock;
use crate::credential::{CredentialError, SessionCredential};
use crate::crypto::{CryptoError, SessionKeys};
use crate::error::AuthError;
use crate::models::IdentityClaims;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Signs credentials with the deployment's session keys.
pub struct SessionSigner {
    keys: SessionKeys,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionSigner {
    pub fn new(keys: SessionKeys, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { keys, ttl, clock }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Claims for `identity` over a fresh window starting now.
    pub fn claims_for(&self, identity: &ProviderIdentity) -> IdentityClaims {
        let now = self.clock.now();
        IdentityClaims::new(
            identity.subject_id.clone(),
            identity.email.clone(),
            identity.name.clone(),
            identity.picture.clone(),
            now,
            now + self.ttl,
        )
    }

    /// The same identity over a fresh window starting now.
    pub fn renew_claims(&self, previous: &IdentityClaims) -> IdentityClaims {
        let now = self.clock.now();
        previous.renewed(now, now + self.ttl)
    }

    /// Sign a credential. `refresh_token` is the plain provider token; it is sealed
    /// before it goes into the payload.
    pub fn issue(
        &self,
        claims: IdentityClaims,
        access_token: String,
        refresh_token: Option<&str>,
    ) -> Result<SessionCredential, SessionError> {
        let sealed = refresh_token.map(|t| self.keys.seal(t)).transpose()?;
        self.issue_sealed(claims, access_token, sealed)
    }

    /// Sign a credential around an already sealed refresh token.
    pub fn issue_sealed(
        &self,
        claims: IdentityClaims,
        access_token: String,
        sealed_refresh_token: Option<String>,
    ) -> Result<SessionCredential, SessionError> {
        let credential =
            SessionCredential::new_signed(claims, access_token, sealed_refresh_token, |bytes| {
                self.keys.sign(bytes)
            })?;
        Ok(credential)
    }

    /// Parse `token` and check its signature. Expiry is the caller's concern.
    pub fn verify(&self, token: &str) -> Result<SessionCredential, AuthError> {
        let credential = SessionCredential::decode(token).map_err(|e| {
            tracing::debug!("Rejecting credential: {}", e);
            AuthError::InvalidSignature
        })?;

        if !self
            .keys
            .verify(credential.signed_bytes(), credential.signature())
        {
            return Err(AuthError::InvalidSignature);
        }

        Ok(credential)
    }

    pub fn unseal_refresh_token(&self, sealed: &str) -> Result<String, CryptoError> {
        self.keys.unseal(sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{grace, signer_at, t0};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    #[test]
    fn test_issue_seals_the_refresh_token() {
        let (signer, _clock) = signer_at(t0());
        let credential = signer
            .issue(signer.claims_for(&grace()), "ya29.a".into(), Some("1//refresh"))
            .unwrap();

        let sealed = credential.refresh_token.clone().unwrap();
        assert_ne!(sealed, "1//refresh");
        assert_eq!(signer.unseal_refresh_token(&sealed).unwrap(), "1//refresh");
        assert_eq!(credential.issued_at, t0());
        assert_eq!(credential.expires_at, t0() + signer.ttl());
    }

    #[test]
    fn test_verify_accepts_own_credentials_only() {
        let (signer, _clock) = signer_at(t0());
        let (stranger, _) = signer_at(t0());
        let credential = signer
            .issue(signer.claims_for(&grace()), "ya29.a".into(), None)
            .unwrap();
        let token = credential.encode();

        assert_eq!(signer.verify(&token).unwrap(), credential);
        assert_eq!(stranger.verify(&token), Err(AuthError::InvalidSignature));
        assert_eq!(signer.verify("garbage"), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_verify_rejects_edited_payload() {
        let (signer, _clock) = signer_at(t0());
        let token = signer
            .issue(signer.claims_for(&grace()), "ya29.a".into(), None)
            .unwrap()
            .encode();
        let (payload, signature) = token.split_once('.').unwrap();

        let json = URL_SAFE_NO_PAD.decode(payload).unwrap();
        let edited = String::from_utf8(json)
            .unwrap()
            .replace("grace@example.com", "mallory@example.com");
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(edited), signature);

        assert_eq!(signer.verify(&forged), Err(AuthError::InvalidSignature));
    }
}
