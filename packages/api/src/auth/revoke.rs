//! Ending a session at the provider.
//!
//! Revoking the refresh token also kills every access token minted from it, so that
//! is what gets sent when the credential carries one. Expired credentials can still
//! be revoked.

use std::sync::Arc;

use tracing::{info, warn};

use super::provider::IdentityProvider;
use super::session::SessionSigner;
use crate::error::RevokeError;

pub struct SessionRevoker {
    provider: Arc<dyn IdentityProvider>,
    signer: Arc<SessionSigner>,
}

impl SessionRevoker {
    pub fn new(provider: Arc<dyn IdentityProvider>, signer: Arc<SessionSigner>) -> Self {
        Self { provider, signer }
    }

    pub async fn revoke(&self, token: &str) -> Result<(), RevokeError> {
        let credential = self
            .signer
            .verify(token)
            .map_err(|_| RevokeError::InvalidCredential)?;

        let target = match credential.refresh_token.as_deref() {
            Some(sealed) => match self.signer.unseal_refresh_token(sealed) {
                Ok(refresh_token) => refresh_token,
                Err(e) => {
                    warn!("Could not unseal refresh token, revoking access token: {}", e);
                    credential.access_token.clone()
                }
            },
            None => credential.access_token.clone(),
        };

        self.provider
            .revoke(&target)
            .await
            .map_err(|e| RevokeError::UpstreamUnavailable(e.to_string()))?;

        info!("Session revoked for subject {}", credential.claims.subject_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::auth::provider::ProviderError;
    use crate::auth::testing::{grace, signer_at, t0, FakeProvider};

    #[tokio::test]
    async fn test_revoke_prefers_refresh_token() {
        let provider = Arc::new(FakeProvider::new());
        let (signer, clock) = signer_at(t0());
        let revoker = SessionRevoker::new(provider.clone(), signer.clone());

        let with_refresh = signer
            .issue(signer.claims_for(&grace()), "ya29.a".into(), Some("1//r"))
            .unwrap();
        let access_only = signer
            .issue(signer.claims_for(&grace()), "ya29.b".into(), None)
            .unwrap();
        clock.advance(Duration::days(1));

        revoker.revoke(&with_refresh.encode()).await.unwrap();
        revoker.revoke(&access_only.encode()).await.unwrap();

        assert_eq!(
            provider.revocations.lock().unwrap().as_slice(),
            ["1//r".to_string(), "ya29.b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_revoke_errors() {
        let provider = Arc::new(FakeProvider::new());
        let (signer, _clock) = signer_at(t0());
        let revoker = SessionRevoker::new(provider.clone(), signer.clone());

        assert_eq!(
            revoker.revoke("not-a-credential").await,
            Err(RevokeError::InvalidCredential)
        );
        assert!(provider.revocations.lock().unwrap().is_empty());

        provider.on_revoke(Err(ProviderError::Unavailable("timeout".into())));
        let token = signer
            .issue(signer.claims_for(&grace()), "ya29.a".into(), None)
            .unwrap()
            .encode();
        assert!(matches!(
            revoker.revoke(&token).await,
            Err(RevokeError::UpstreamUnavailable(_))
        ));
    }
}
