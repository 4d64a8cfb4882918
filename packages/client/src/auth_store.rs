//! # AuthStore: the client's single source of truth for the session
//!
//! One [`AuthStore`] per app. It owns the [`AuthState`] (published on a `watch`
//! channel), the credential's wire form, and the [`CredentialStore`] it is persisted
//! in. Login lives in `login.rs`, sign-out in `revoke.rs`, start-up restore in
//! `bootstrap.rs`; this file holds construction, the gate in front of protected
//! calls, and refresh.
//!
//! ## Refresh is single-flight
//!
//! `refresh` takes an async mutex and a generation counter. A caller that had to wait
//! for the mutex while another refresh ran sees the generation move and returns the
//! recorded result of that refresh instead of starting its own, so any number of
//! concurrent triggers cost one backend call.
//!
//! ## Sign-out wins
//!
//! [`AuthStore::revoke`] bumps a session epoch. A refresh that finishes after the
//! epoch moved is discarded, so a slow refresh can never resurrect a revoked session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use api::{AuthError, Clock, IdentityClaims, SessionCredential, SystemClock};
use chrono::{DateTime, Duration, FixedOffset};
use store::{CredentialStore, SessionConfig};
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, warn};

use crate::backend::AuthBackend;
use crate::bootstrap::StoreBootstrapper;
use crate::error::ClientError;
use crate::navigator::Navigator;
use crate::preferences::{FixedTimeZone, TimeZoneSource};
use crate::state::{AttemptId, AuthEvent, AuthState};

pub struct AuthStore<S> {
    pub(crate) store: S,
    pub(crate) backend: Arc<dyn AuthBackend>,
    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) clock: Arc<dyn Clock>,
    time_zone: Arc<dyn TimeZoneSource>,
    refresh_leeway: Duration,
    pub(crate) login_timeout: Duration,

    state: watch::Sender<AuthState>,
    ready: watch::Sender<bool>,
    credential: Mutex<Option<String>>,

    pub(crate) next_attempt: AtomicU64,
    pub(crate) epoch: AtomicU64,
    refresh_gate: tokio::sync::Mutex<()>,
    refresh_generation: AtomicU64,
    last_refresh: Mutex<Option<Result<IdentityClaims, ClientError>>>,
    pub(crate) restored: OnceCell<()>,
}

pub struct AuthStoreBuilder<S> {
    store: S,
    backend: Arc<dyn AuthBackend>,
    navigator: Option<Arc<dyn Navigator>>,
    clock: Arc<dyn Clock>,
    time_zone: Arc<dyn TimeZoneSource>,
    session: SessionConfig,
}

fn seconds(secs: u64) -> Duration {
    Duration::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX)).unwrap_or(Duration::MAX)
}

#[cfg(target_arch = "wasm32")]
fn platform_navigator() -> Arc<dyn Navigator> {
    Arc::new(crate::navigator::BrowserNavigator)
}

#[cfg(not(target_arch = "wasm32"))]
fn platform_navigator() -> Arc<dyn Navigator> {
    Arc::new(crate::navigator::SystemBrowser)
}

impl<S: CredentialStore> AuthStoreBuilder<S> {
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn time_zone(mut self, time_zone: Arc<dyn TimeZoneSource>) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// The store, not yet restored. `authorize` waits until something calls
    /// [`StoreBootstrapper::run`].
    pub fn build(self) -> Arc<AuthStore<S>> {
        Arc::new(AuthStore {
            store: self.store,
            backend: self.backend,
            navigator: self.navigator.unwrap_or_else(platform_navigator),
            clock: self.clock,
            time_zone: self.time_zone,
            refresh_leeway: seconds(self.session.refresh_leeway_secs),
            login_timeout: seconds(self.session.login_timeout_secs),
            state: watch::Sender::new(AuthState::Unauthenticated),
            ready: watch::Sender::new(false),
            credential: Mutex::new(None),
            next_attempt: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
            last_refresh: Mutex::new(None),
            restored: OnceCell::new(),
        })
    }

    /// Build and restore the persisted session.
    pub async fn start(self) -> Arc<AuthStore<S>> {
        let store = self.build();
        StoreBootstrapper::new(&*store).run().await;
        store
    }
}

impl<S: CredentialStore> AuthStore<S> {
    pub fn builder(store: S, backend: Arc<dyn AuthBackend>) -> AuthStoreBuilder<S> {
        AuthStoreBuilder {
            store,
            backend,
            navigator: None,
            clock: Arc::new(SystemClock),
            time_zone: Arc::new(FixedTimeZone::default()),
            session: SessionConfig::default(),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub async fn wait_until_ready(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives as long as `self`, so this only ends when ready.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    /// The wire form of the held credential, without any validity check.
    pub fn credential(&self) -> Option<String> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// When the current session ends, in the user's time zone.
    pub fn session_expires_local(&self) -> Option<DateTime<FixedOffset>> {
        let offset = self.time_zone.offset();
        self.state()
            .claims()
            .map(|claims| claims.expires_at.with_timezone(&offset))
    }

    pub fn acknowledge_error(&self) -> Result<AuthState, ClientError> {
        self.transition(AuthEvent::Acknowledged)
    }

    /// The credential to send with a protected call.
    ///
    /// Waits for start-up restore, expires an abandoned login, and refreshes first
    /// when the credential is inside the refresh leeway. If that refresh hits an
    /// outage while the old credential is still valid, the old one is returned.
    pub async fn authorize(&self) -> Result<String, ClientError> {
        self.wait_until_ready().await;
        self.expire_pending_login();

        if !self.state().is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }
        let held = self.credential().ok_or(ClientError::NotAuthenticated)?;
        let decoded =
            SessionCredential::decode(&held).map_err(|e| ClientError::Credential(e.to_string()))?;

        let now = self.clock.now();
        if !decoded.expires_within(now, self.refresh_leeway) {
            return Ok(held);
        }

        debug!(expires_at = %decoded.expires_at, "Credential inside refresh leeway");
        match self.refresh().await {
            Ok(_) => self.credential().ok_or(ClientError::NotAuthenticated),
            Err(e) if e.is_retryable() && !decoded.is_expired_at(self.clock.now()) => {
                warn!(error = %e, "Refresh failed, using current credential");
                Ok(held)
            }
            Err(e) => Err(e),
        }
    }

    /// React to the backend refusing a credential: refresh once, and if that fails the
    /// session is over locally. Returns the credential to retry with.
    pub async fn handle_rejection(&self, rejection: AuthError) -> Result<String, ClientError> {
        if !self.state().is_authenticated() {
            return Err(ClientError::Rejected(rejection));
        }

        warn!(error = rejection.code(), "Backend rejected credential");
        match self.refresh().await {
            Ok(_) => self.credential().ok_or(ClientError::NotAuthenticated),
            Err(e) => {
                if self.state().is_authenticated() {
                    let _ = self.transition(AuthEvent::SessionEnded);
                }
                Err(e)
            }
        }
    }

    /// Ask the backend who the session belongs to (`GET /api/auth/me`).
    ///
    /// A rejection goes through [`handle_rejection`](Self::handle_rejection) and the
    /// call is retried once with the renewed credential.
    pub async fn identity(&self) -> Result<IdentityClaims, ClientError> {
        let credential = self.authorize().await?;
        match self.backend.identity(&credential).await {
            Err(ClientError::Rejected(reason)) => {
                let retry = self.handle_rejection(reason).await?;
                self.backend.identity(&retry).await
            }
            other => other,
        }
    }

    /// Renew the held credential through the backend.
    pub async fn refresh(&self) -> Result<IdentityClaims, ClientError> {
        let observed = self.refresh_generation.load(Ordering::SeqCst);
        let _gate = self.refresh_gate.lock().await;

        if self.refresh_generation.load(Ordering::SeqCst) != observed {
            let recorded = self
                .last_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(result) = recorded {
                debug!("Joined in-flight refresh");
                return result;
            }
        }

        let result = self.refresh_now().await;
        *self
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn refresh_now(&self) -> Result<IdentityClaims, ClientError> {
        let current = self.credential().ok_or(ClientError::NotAuthenticated)?;
        let previous = SessionCredential::decode(&current).ok();

        let started = match self.state() {
            AuthState::Authenticated { .. } => {
                self.transition(AuthEvent::RefreshStarted)?;
                true
            }
            // Restoring an expired credential.
            AuthState::Unauthenticated => false,
            other => {
                return Err(ClientError::InvalidTransition {
                    from: other.name(),
                    event: "refresh_started",
                })
            }
        };
        let mut in_flight = InFlightRefresh {
            owner: self,
            started,
            previous,
            armed: true,
        };

        let epoch = self.epoch.load(Ordering::SeqCst);
        let outcome = self.backend.refresh(&current).await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            in_flight.disarm();
            debug!("Discarding refresh that finished after sign-out");
            return Err(ClientError::NotAuthenticated);
        }

        let response = match outcome {
            Ok(response) => response,
            Err(e) if e.is_terminal() => {
                in_flight.disarm();
                warn!(error = %e, "Session can no longer be refreshed");
                self.end_session().await;
                return Err(e.into());
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, keeping stored credential");
                in_flight.abort();
                return Err(e.into());
            }
        };

        let renewed = match SessionCredential::decode(&response.credential) {
            Ok(renewed) => renewed,
            Err(e) => {
                warn!(error = %e, "Backend returned an unreadable credential");
                in_flight.abort();
                return Err(ClientError::Credential(e.to_string()));
            }
        };

        let claims = renewed.claims;
        let event = if started {
            AuthEvent::RefreshSucceeded {
                claims: claims.clone(),
            }
        } else {
            AuthEvent::Restored {
                claims: claims.clone(),
            }
        };
        self.set_credential(Some(response.credential.clone()));
        self.transition(event)?;
        in_flight.disarm();

        if let Err(e) = self.store.save(&response.credential).await {
            warn!(error = %e, "Could not persist renewed credential");
        }
        info!(subject = %claims.subject_id, expires_at = %claims.expires_at, "Session refreshed");
        Ok(claims)
    }

    /// Back to `Authenticated` on the old credential if it is still good; otherwise
    /// signed out locally with the stored credential left for a later retry. A failed
    /// restore lets go of the expired credential it was holding.
    fn abort_refresh(&self, started: bool, previous: Option<SessionCredential>) {
        if !started {
            self.set_credential(None);
            return;
        }
        let still_valid = previous.filter(|c| !c.is_expired_at(self.clock.now()));
        let event = match still_valid {
            Some(credential) => AuthEvent::RefreshAborted {
                claims: credential.claims,
            },
            None => AuthEvent::SessionEnded,
        };
        let _ = self.transition(event);
    }

    /// Forget the session here and in storage.
    pub(crate) async fn end_session(&self) {
        self.set_credential(None);
        let _ = self.transition(AuthEvent::SessionEnded);
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Could not clear stored credential");
        }
    }

    pub(crate) fn set_credential(&self, credential: Option<String>) {
        *self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = credential;
    }

    pub(crate) fn take_credential(&self) -> Option<String> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub(crate) fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub(crate) fn new_attempt(&self) -> AttemptId {
        AttemptId(self.next_attempt.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Apply `event` atomically. Refused events leave the state untouched.
    pub(crate) fn transition(&self, event: AuthEvent) -> Result<AuthState, ClientError> {
        let name = event.name();
        let mut outcome = Err(ClientError::NotAuthenticated);
        self.state.send_if_modified(|state| match state.apply(event) {
            Ok(next) => {
                debug!(from = state.name(), to = next.name(), event = name, "Auth state changed");
                *state = next.clone();
                outcome = Ok(next);
                true
            }
            Err(e) => {
                debug!(state = state.name(), event = name, error = %e, "Auth event refused");
                outcome = Err(e);
                false
            }
        });
        outcome
    }
}

/// Resolves an in-flight refresh if its future is dropped before the backend
/// answers, so the machine never stays in `Refreshing`.
struct InFlightRefresh<'a, S: CredentialStore> {
    owner: &'a AuthStore<S>,
    started: bool,
    previous: Option<SessionCredential>,
    armed: bool,
}

impl<S: CredentialStore> InFlightRefresh<'_, S> {
    fn disarm(&mut self) {
        self.armed = false;
    }

    fn abort(&mut self) {
        self.armed = false;
        self.owner.abort_refresh(self.started, self.previous.take());
    }
}

impl<S: CredentialStore> Drop for InFlightRefresh<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Refresh dropped before the backend answered");
            self.abort();
        }
    }
}
