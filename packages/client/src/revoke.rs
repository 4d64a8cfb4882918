//! Signing out.
//!
//! The backend is asked to revoke the grant at Google, but the local session ends
//! whatever it answers: an outage is logged and returned, never a reason to stay
//! signed in.

use api::RevokeError;
use std::sync::atomic::Ordering;
use store::CredentialStore;
use tracing::{info, warn};

use crate::auth_store::AuthStore;
use crate::state::AuthEvent;

impl<S: CredentialStore> AuthStore<S> {
    pub async fn revoke(&self) -> Result<(), RevokeError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        // The in-memory sign-out happens before the first await.
        let held = self.take_credential();
        let _ = self.transition(AuthEvent::SessionEnded);

        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Could not clear stored credential");
        }

        let outcome = match held {
            Some(credential) => self.backend.revoke(&credential).await,
            None => Ok(()),
        };
        if let Err(e) = &outcome {
            warn!(error = %e, "Revocation failed, signed out locally anyway");
        }

        info!("Signed out");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use api::RefreshError;
    use chrono::Duration;
    use store::MemoryStore;

    use super::*;
    use crate::error::ClientError;
    use crate::state::AuthState;
    use futures::FutureExt;

    use crate::testing::{credential_at, fixture, t0};

    #[tokio::test]
    async fn test_revoke_twice() {
        let fx = fixture(MemoryStore::with_credential(credential_at(t0(), Duration::hours(1)))).await;

        assert_eq!(fx.store.revoke().await, Ok(()));
        assert_eq!(fx.store.state(), AuthState::Unauthenticated);
        assert_eq!(fx.persisted.current(), None);

        assert_eq!(fx.store.revoke().await, Ok(()));
        assert_eq!(fx.store.state(), AuthState::Unauthenticated);
        assert_eq!(fx.backend.revoke_calls(), 1);
    }

    #[tokio::test]
    async fn test_outage_still_signs_out() {
        let fx = fixture(MemoryStore::with_credential(credential_at(t0(), Duration::hours(1)))).await;
        fx.backend
            .on_revoke(Err(RevokeError::UpstreamUnavailable("timeout".into())));

        let err = fx.store.revoke().await.unwrap_err();

        assert_eq!(err, RevokeError::UpstreamUnavailable("timeout".into()));
        assert_eq!(fx.store.state(), AuthState::Unauthenticated);
        assert_eq!(fx.persisted.current(), None);
        assert_eq!(fx.store.authorize().await, Err(ClientError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_refresh_finishing_after_revoke_is_discarded() {
        let fx = fixture(MemoryStore::with_credential(credential_at(t0(), Duration::hours(1)))).await;

        let (refreshed, revoked) = tokio::join!(fx.store.refresh(), fx.store.revoke());

        assert_eq!(revoked, Ok(()));
        assert!(refreshed.is_err());
        assert_eq!(fx.backend.refresh_calls(), 1);
        assert_eq!(fx.store.state(), AuthState::Unauthenticated);
        assert_eq!(fx.persisted.current(), None);
        assert_eq!(fx.store.credential(), None);
    }

    #[tokio::test]
    async fn test_revoke_after_session_already_ended() {
        let fx = fixture(MemoryStore::with_credential(credential_at(t0(), Duration::hours(1)))).await;
        fx.backend.on_refresh(Err(RefreshError::InvalidSignature));
        let _ = fx.store.refresh().await;

        assert_eq!(fx.store.revoke().await, Ok(()));
        assert_eq!(fx.store.state(), AuthState::Unauthenticated);
        assert_eq!(fx.backend.revoke_calls(), 0);
    }

    #[tokio::test]
    async fn test_dropped_revoke_is_still_signed_out() {
        let fx = fixture(MemoryStore::with_credential(credential_at(t0(), Duration::hours(1)))).await;

        // The backend yields once, so the first poll stops inside the revocation call.
        assert!(fx.store.revoke().now_or_never().is_none());

        assert_eq!(fx.store.state(), AuthState::Unauthenticated);
        assert_eq!(fx.store.credential(), None);
        assert_eq!(fx.persisted.current(), None);
    }
}
