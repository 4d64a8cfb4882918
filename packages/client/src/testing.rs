//! Test doubles for the client.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use api::{
    AuthError, Clock, IdentityClaims, LoginStart, ManualClock, RefreshError, RevokeError,
    SessionCredential, SessionResponse,
};
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use store::{CredentialStore, MemoryStore, StoreError};

use crate::auth_store::AuthStore;
use crate::backend::AuthBackend;
use crate::error::ClientError;
use crate::navigator::Navigator;
use crate::preferences::FixedTimeZone;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 30, 0).unwrap()
}

pub(crate) fn grace(issued_at: DateTime<Utc>, ttl: Duration) -> IdentityClaims {
    IdentityClaims::new(
        "google-108".into(),
        "grace@example.com".into(),
        Some("Grace Hopper".into()),
        None,
        issued_at,
        issued_at + ttl,
    )
}

fn mint(claims: IdentityClaims, access_token: String) -> String {
    SessionCredential::new_signed(claims, access_token, Some("sealed-refresh".into()), |_| {
        vec![7; 32]
    })
    .unwrap()
    .encode()
}

/// A credential for Grace issued at `issued_at`, valid for `ttl`.
pub(crate) fn credential_at(issued_at: DateTime<Utc>, ttl: Duration) -> String {
    mint(grace(issued_at, ttl), "ya29.first".into())
}

/// Backend double. Refresh mints a one-hour credential at the shared clock's time.
pub(crate) struct FakeBackend {
    clock: Arc<ManualClock>,
    login: Mutex<Result<LoginStart, ClientError>>,
    refresh: Mutex<Result<(), RefreshError>>,
    revoke: Mutex<Result<(), RevokeError>>,
    logins: AtomicUsize,
    refreshes: AtomicUsize,
    revocations: AtomicUsize,
    identities: AtomicUsize,
    reject_identity: AtomicBool,
}

impl FakeBackend {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            login: Mutex::new(Ok(LoginStart {
                authorization_url: "https://accounts.google.com/o/oauth2/v2/auth?state=abc123"
                    .into(),
                state: "abc123".into(),
            })),
            refresh: Mutex::new(Ok(())),
            revoke: Mutex::new(Ok(())),
            logins: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            revocations: AtomicUsize::new(0),
            identities: AtomicUsize::new(0),
            reject_identity: AtomicBool::new(false),
        }
    }

    pub fn on_login(&self, result: Result<LoginStart, ClientError>) {
        *self.login.lock().unwrap() = result;
    }

    pub fn on_refresh(&self, result: Result<(), RefreshError>) {
        *self.refresh.lock().unwrap() = result;
    }

    pub fn on_revoke(&self, result: Result<(), RevokeError>) {
        *self.revoke.lock().unwrap() = result;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn revoke_calls(&self) -> usize {
        self.revocations.load(Ordering::SeqCst)
    }

    pub fn identity_calls(&self) -> usize {
        self.identities.load(Ordering::SeqCst)
    }

    /// The next identity lookup answers 401 as if the backend distrusted the credential.
    pub fn reject_next_identity(&self) {
        self.reject_identity.store(true, Ordering::SeqCst);
    }

    pub fn total_calls(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
            + self.refresh_calls()
            + self.revoke_calls()
            + self.identity_calls()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl AuthBackend for FakeBackend {
    async fn login_url(&self, _return_to: &str) -> Result<LoginStart, ClientError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.login.lock().unwrap().clone()
    }

    async fn refresh(&self, credential: &str) -> Result<SessionResponse, RefreshError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        self.refresh.lock().unwrap().clone()?;

        let presented =
            SessionCredential::decode(credential).map_err(|_| RefreshError::InvalidSignature)?;
        let now = self.clock.now();
        let claims = presented.claims.renewed(now, now + Duration::hours(1));
        let expires_at = claims.expires_at;
        Ok(SessionResponse {
            credential: mint(claims, format!("ya29.renewed-{n}")),
            expires_at,
        })
    }

    async fn revoke(&self, _credential: &str) -> Result<(), RevokeError> {
        self.revocations.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.revoke.lock().unwrap().clone()
    }

    async fn identity(&self, credential: &str) -> Result<IdentityClaims, ClientError> {
        self.identities.fetch_add(1, Ordering::SeqCst);
        if self.reject_identity.swap(false, Ordering::SeqCst) {
            return Err(ClientError::Rejected(AuthError::InvalidSignature));
        }
        let presented = SessionCredential::decode(credential)
            .map_err(|_| ClientError::Rejected(AuthError::InvalidSignature))?;
        if presented.is_expired_at(self.clock.now()) {
            return Err(ClientError::Rejected(AuthError::Expired));
        }
        Ok(presented.claims)
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) -> Result<(), ClientError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(ClientError::Navigation("pop-up blocked".into()));
        }
        self.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Yields once before every save, leaving room for other operations mid-write.
pub(crate) struct SlowSaveStore {
    inner: MemoryStore,
}

impl SlowSaveStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

impl CredentialStore for SlowSaveStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        self.inner.load().await
    }

    async fn save(&self, credential: &str) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.save(credential).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}

pub(crate) struct Fixture {
    pub store: Arc<AuthStore<MemoryStore>>,
    /// Shares its slot with the store's `MemoryStore`.
    pub persisted: MemoryStore,
    pub backend: Arc<FakeBackend>,
    pub navigator: Arc<RecordingNavigator>,
    pub clock: Arc<ManualClock>,
}

/// A started store at `t0()` in UTC+2 with default session timing.
pub(crate) async fn fixture(persisted: MemoryStore) -> Fixture {
    fixture_with(persisted, |_| {}).await
}

pub(crate) async fn fixture_with(
    persisted: MemoryStore,
    configure: impl FnOnce(&FakeBackend),
) -> Fixture {
    let clock = Arc::new(ManualClock::new(t0()));
    let backend = Arc::new(FakeBackend::new(clock.clone()));
    configure(&backend);
    let navigator = Arc::new(RecordingNavigator::default());

    let store = AuthStore::builder(persisted.clone(), backend.clone())
        .navigator(navigator.clone())
        .clock(clock.clone())
        .time_zone(Arc::new(FixedTimeZone(
            FixedOffset::east_opt(2 * 3600).unwrap(),
        )))
        .start()
        .await;

    Fixture {
        store,
        persisted,
        backend,
        navigator,
        clock,
    }
}
