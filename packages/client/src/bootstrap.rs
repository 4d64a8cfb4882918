//! # Restoring the persisted session at start-up
//!
//! [`StoreBootstrapper`] is handed the thing to restore and calls
//! [`Restore::restore`] on it once. For an [`AuthStore`]:
//!
//! | Persisted | Result | Network |
//! |-----------|--------|---------|
//! | nothing | `Unauthenticated` | none |
//! | unreadable or undecodable | `Unauthenticated`, storage cleared | none |
//! | storage unavailable | `Unauthenticated` | none |
//! | unexpired credential | `Authenticated` with its claims | none |
//! | expired credential | one refresh; `Unauthenticated` if that fails | `POST /auth/refresh` |
//!
//! Storage is only cleared for corrupt data or a definitive refresh rejection; an
//! outage leaves the credential for the next start, but it is not held in memory
//! while the client is signed out. Restoring twice is a no-op that
//! returns the current state. Finishing opens the readiness gate `authorize` waits on.

use std::future::Future;

use api::SessionCredential;
use store::{CredentialStore, StoreError};
use tracing::{debug, info, warn};

use crate::auth_store::AuthStore;
use crate::state::{AuthEvent, AuthState};

pub trait Restore {
    fn restore(&self) -> impl Future<Output = AuthState>;
}

pub struct StoreBootstrapper<'a, R> {
    target: &'a R,
}

impl<'a, R: Restore> StoreBootstrapper<'a, R> {
    pub fn new(target: &'a R) -> Self {
        Self { target }
    }

    pub async fn run(&self) -> AuthState {
        self.target.restore().await
    }
}

impl<S: CredentialStore> Restore for AuthStore<S> {
    async fn restore(&self) -> AuthState {
        self.restored
            .get_or_init(|| async {
                self.restore_persisted().await;
                self.mark_ready();
            })
            .await;
        self.state()
    }
}

impl<S: CredentialStore> AuthStore<S> {
    async fn restore_persisted(&self) {
        let raw = match self.store.load().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored session");
                return;
            }
            Err(e @ StoreError::Unreadable(_)) => {
                warn!(error = %e, "Discarding unreadable stored session");
                self.discard_stored().await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                return;
            }
        };

        let credential = match SessionCredential::decode(&raw) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Discarding undecodable stored session");
                self.discard_stored().await;
                return;
            }
        };

        self.set_credential(Some(raw));

        if !credential.is_expired_at(self.clock.now()) {
            let subject = credential.claims.subject_id.clone();
            match self.transition(AuthEvent::Restored {
                claims: credential.claims,
            }) {
                Ok(_) => info!(subject = %subject, "Restored session"),
                Err(e) => debug!(error = %e, "Session restored after another transition"),
            }
            return;
        }

        debug!(expires_at = %credential.expires_at, "Stored session expired, refreshing");
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Could not renew stored session");
        }
    }

    async fn discard_stored(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Could not clear stored session");
        }
    }
}
