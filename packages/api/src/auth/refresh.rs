//! Renewing a session with the provider refresh token sealed inside it.
//!
//! The presented credential only has to carry a valid signature. An expired
//! credential can be refreshed; that is the point of refreshing.

use std::sync::Arc;

use tracing::{info, warn};

use super::provider::{IdentityProvider, ProviderError};
use super::session::SessionSigner;
use crate::credential::SessionCredential;
use crate::error::RefreshError;

pub struct SessionRefresher {
    provider: Arc<dyn IdentityProvider>,
    signer: Arc<SessionSigner>,
}

impl SessionRefresher {
    pub fn new(provider: Arc<dyn IdentityProvider>, signer: Arc<SessionSigner>) -> Self {
        Self { provider, signer }
    }

    pub async fn refresh(&self, token: &str) -> Result<SessionCredential, RefreshError> {
        let previous = self
            .signer
            .verify(token)
            .map_err(|_| RefreshError::InvalidSignature)?;

        let sealed = previous
            .refresh_token
            .as_deref()
            .ok_or(RefreshError::NoRefreshToken)?;
        // Signed by us but sealed under other keys: treat as forged.
        let refresh_token = self
            .signer
            .unseal_refresh_token(sealed)
            .map_err(|_| RefreshError::InvalidSignature)?;

        let grant = self
            .provider
            .refresh(&refresh_token)
            .await
            .map_err(|e| match e {
                ProviderError::Rejected(detail) => RefreshError::InvalidGrant(detail),
                ProviderError::Unavailable(detail) => RefreshError::UpstreamUnavailable(detail),
            })?;

        let claims = match grant.identity {
            Some(identity) if identity.subject_id == previous.claims.subject_id => {
                self.signer.claims_for(&identity)
            }
            Some(identity) => {
                warn!(
                    "Refresh for subject {} returned subject {}",
                    previous.claims.subject_id, identity.subject_id
                );
                return Err(RefreshError::InvalidGrant("subject changed".into()));
            }
            None => self.signer.renew_claims(&previous.claims),
        };

        // Google only rotates the refresh token occasionally; keep the old one otherwise.
        let credential = match grant.tokens.refresh_token.as_deref() {
            Some(rotated) => {
                self.signer
                    .issue(claims, grant.tokens.access_token, Some(rotated))
            }
            None => self.signer.issue_sealed(
                claims,
                grant.tokens.access_token,
                Some(sealed.to_string()),
            ),
        }
        .map_err(|e| RefreshError::UpstreamUnavailable(e.to_string()))?;

        info!("Session refreshed for subject {}", credential.claims.subject_id);
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::auth::provider::{ProviderGrant, ProviderIdentity, ProviderTokens};
    use crate::auth::testing::{grace, signer_at, t0, FakeProvider};
    use crate::clock::ManualClock;

    struct Harness {
        provider: Arc<FakeProvider>,
        signer: Arc<SessionSigner>,
        clock: Arc<ManualClock>,
        refresher: SessionRefresher,
    }

    fn harness() -> Harness {
        let provider = Arc::new(FakeProvider::new());
        let (signer, clock) = signer_at(t0());
        let refresher = SessionRefresher::new(provider.clone(), signer.clone());
        Harness {
            provider,
            signer,
            clock,
            refresher,
        }
    }

    fn issue(h: &Harness, refresh_token: Option<&str>) -> SessionCredential {
        h.signer
            .issue(h.signer.claims_for(&grace()), "ya29.first".into(), refresh_token)
            .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_extends_an_expired_session() {
        let h = harness();
        let old = issue(&h, Some("1//refresh"));
        h.clock.advance(Duration::hours(2));

        let renewed = h.refresher.refresh(&old.encode()).await.unwrap();

        assert_eq!(renewed.access_token, "ya29.renewed");
        assert_eq!(renewed.issued_at, t0() + Duration::hours(2));
        assert!(renewed.expires_at > old.expires_at);
        assert_eq!(renewed.claims.subject_id, old.claims.subject_id);
        assert_eq!(renewed.refresh_token, old.refresh_token);
        assert_eq!(
            h.provider.refreshes.lock().unwrap().as_slice(),
            ["1//refresh".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_resealed() {
        let h = harness();
        h.provider.on_refresh(Ok(ProviderGrant {
            tokens: ProviderTokens {
                access_token: "ya29.renewed".into(),
                refresh_token: Some("1//rotated".into()),
            },
            identity: Some(grace()),
        }));
        let old = issue(&h, Some("1//refresh"));

        let renewed = h.refresher.refresh(&old.encode()).await.unwrap();
        let sealed = renewed.refresh_token.unwrap();
        assert_eq!(h.signer.unseal_refresh_token(&sealed).unwrap(), "1//rotated");
    }

    #[tokio::test]
    async fn test_refresh_errors() {
        let h = harness();

        assert_eq!(
            h.refresher.refresh("forged.token").await,
            Err(RefreshError::InvalidSignature)
        );

        let no_refresh = issue(&h, None);
        assert_eq!(
            h.refresher.refresh(&no_refresh.encode()).await,
            Err(RefreshError::NoRefreshToken)
        );

        let token = issue(&h, Some("1//refresh")).encode();
        h.provider
            .on_refresh(Err(ProviderError::Rejected("invalid_grant".into())));
        assert_eq!(
            h.refresher.refresh(&token).await,
            Err(RefreshError::InvalidGrant("invalid_grant".into()))
        );

        h.provider
            .on_refresh(Err(ProviderError::Unavailable("503".into())));
        let err = h.refresher.refresh(&token).await.unwrap_err();
        assert!(!err.is_terminal());
    }

    #[tokio::test]
    async fn test_subject_change_is_refused() {
        let h = harness();
        h.provider.on_refresh(Ok(ProviderGrant {
            tokens: ProviderTokens {
                access_token: "ya29.other".into(),
                refresh_token: None,
            },
            identity: Some(ProviderIdentity {
                subject_id: "someone-else".into(),
                ..grace()
            }),
        }));
        let token = issue(&h, Some("1//refresh")).encode();

        assert!(matches!(
            h.refresher.refresh(&token).await,
            Err(RefreshError::InvalidGrant(_))
        ));
    }
}
