//! Login attempts: starting one, finishing one, and giving up on one.
//!
//! Every attempt gets a fresh [`AttemptId`]. Completions name the attempt they belong
//! to, so a late answer for a replaced or cancelled attempt is dropped as
//! [`ClientError::StaleAttempt`] without touching the state or storage.

use api::{AuthError, IdentityClaims, SessionCredential};
use store::CredentialStore;
use tracing::{debug, info, warn};

use crate::auth_store::AuthStore;
use crate::callback::CallbackOutcome;
use crate::error::ClientError;
use crate::state::{AttemptId, AuthEvent, AuthState};

impl<S: CredentialStore> AuthStore<S> {
    /// Start a login and send the user to Google.
    ///
    /// From `Error` the error is acknowledged first; an attempt already in progress is
    /// cancelled and replaced.
    pub async fn begin_login(&self, return_to: &str) -> Result<AttemptId, ClientError> {
        let attempt = self.start_attempt(return_to)?;

        let start = match self.backend.login_url(return_to).await {
            Ok(start) => start,
            Err(e) => {
                warn!(attempt = %attempt, error = %e, "Could not start login");
                self.fail_attempt(attempt, e.clone());
                return Err(e);
            }
        };

        if self.state().attempt() != Some(attempt) {
            debug!(attempt = %attempt, "Login was replaced before redirect");
            return Err(ClientError::StaleAttempt);
        }

        if let Err(e) = self.navigator.navigate(&start.authorization_url) {
            self.fail_attempt(attempt, e.clone());
            return Err(e);
        }

        info!(attempt = %attempt, "Redirecting to identity provider");
        Ok(attempt)
    }

    /// Re-enter `Authenticating` after the page was reloaded by the provider's
    /// redirect, so the callback can be handed to [`complete_login`](Self::complete_login).
    pub fn resume_login(&self, return_to: &str) -> Result<AttemptId, ClientError> {
        self.start_attempt(return_to)
    }

    /// Finish `attempt` with what the callback page carried.
    pub async fn complete_login(
        &self,
        attempt: AttemptId,
        outcome: CallbackOutcome,
    ) -> Result<IdentityClaims, ClientError> {
        if self.state().attempt() != Some(attempt) {
            debug!(attempt = %attempt, "Ignoring result of stale login attempt");
            return Err(ClientError::StaleAttempt);
        }

        let credential = match outcome {
            CallbackOutcome::Credential { credential, .. } => credential,
            CallbackOutcome::Failed(e) => {
                warn!(attempt = %attempt, error = e.code(), "Login rejected by backend");
                let reason = ClientError::from(e);
                self.fail_attempt(attempt, reason.clone());
                return Err(reason);
            }
            CallbackOutcome::NotACallback => return Err(ClientError::NotAuthenticated),
        };

        let decoded = match SessionCredential::decode(&credential) {
            Ok(decoded) if decoded.is_expired_at(self.clock.now()) => {
                Err(ClientError::Rejected(AuthError::Expired))
            }
            Ok(decoded) => Ok(decoded),
            Err(e) => Err(ClientError::Credential(e.to_string())),
        };
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                self.fail_attempt(attempt, e.clone());
                return Err(e);
            }
        };

        // The attempt check and the state change happen before the first await.
        let claims = decoded.claims;
        self.transition(AuthEvent::LoginSucceeded {
            attempt,
            claims: claims.clone(),
        })?;
        self.set_credential(Some(credential.clone()));

        if let Err(e) = self.store.save(&credential).await {
            let reason = ClientError::from(e);
            warn!(attempt = %attempt, error = %reason, "Could not persist credential");
            if self.credential().as_deref() == Some(credential.as_str()) {
                self.set_credential(None);
                let _ = self.transition(AuthEvent::Failed {
                    reason: reason.clone(),
                });
            }
            return Err(reason);
        }
        if self.credential().as_deref() != Some(credential.as_str()) {
            debug!(attempt = %attempt, "Session changed while saving credential");
            self.persist_held().await;
        }

        info!(attempt = %attempt, subject = %claims.subject_id, "Signed in");
        Ok(claims)
    }

    pub fn cancel_login(&self, attempt: AttemptId) -> Result<AuthState, ClientError> {
        self.transition(AuthEvent::LoginCancelled { attempt })
    }

    /// Fail a login that has been pending longer than the login timeout. Returns
    /// whether one was expired.
    pub fn expire_pending_login(&self) -> bool {
        let AuthState::Authenticating {
            attempt,
            started_at,
            ..
        } = self.state()
        else {
            return false;
        };

        if self.clock.now() - started_at < self.login_timeout {
            return false;
        }

        warn!(attempt = %attempt, "Login timed out");
        self.transition(AuthEvent::LoginFailed {
            attempt,
            reason: ClientError::LoginTimedOut,
        })
        .is_ok()
    }

    fn start_attempt(&self, return_to: &str) -> Result<AttemptId, ClientError> {
        match self.state() {
            AuthState::Error { .. } => {
                self.transition(AuthEvent::Acknowledged)?;
            }
            AuthState::Authenticating { attempt, .. } => {
                self.transition(AuthEvent::LoginCancelled { attempt })?;
            }
            _ => {}
        }

        let attempt = self.new_attempt();
        self.transition(AuthEvent::LoginStarted {
            redirect_target: return_to.to_string(),
            attempt,
            started_at: self.clock.now(),
        })?;
        Ok(attempt)
    }

    fn fail_attempt(&self, attempt: AttemptId, reason: ClientError) {
        let _ = self.transition(AuthEvent::LoginFailed { attempt, reason });
    }

    /// Bring storage in line with the credential held in memory.
    async fn persist_held(&self) {
        let outcome = match self.credential() {
            Some(held) => self.store.save(&held).await,
            None => self.store.clear().await,
        };
        if let Err(e) = outcome {
            warn!(error = %e, "Could not update stored credential");
        }
    }
}
