//! Shared fixtures for the auth tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use oauth2::PkceCodeChallenge;

use super::provider::{
    IdentityProvider, ProviderError, ProviderGrant, ProviderIdentity, ProviderTokens,
};
use super::session::SessionSigner;
use crate::clock::ManualClock;
use crate::crypto::SessionKeys;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 30, 0).unwrap()
}

pub(crate) fn grace() -> ProviderIdentity {
    ProviderIdentity {
        subject_id: "google-108".into(),
        email: "grace@example.com".into(),
        name: Some("Grace Hopper".into()),
        picture: None,
    }
}

/// A signer with fresh keys, a one hour ttl and a clock pinned at `now`.
pub(crate) fn signer_at(now: DateTime<Utc>) -> (Arc<SessionSigner>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let signer = SessionSigner::new(
        SessionKeys::generate().unwrap(),
        Duration::hours(1),
        clock.clone(),
    );
    (Arc::new(signer), clock)
}

/// Scripted provider that records every call.
pub(crate) struct FakeProvider {
    exchange: Mutex<Result<ProviderGrant, ProviderError>>,
    refresh: Mutex<Result<ProviderGrant, ProviderError>>,
    revoke: Mutex<Result<(), ProviderError>>,
    pub exchanges: Mutex<Vec<(String, String)>>,
    pub refreshes: Mutex<Vec<String>>,
    pub revocations: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self {
            exchange: Mutex::new(Ok(ProviderGrant {
                tokens: ProviderTokens {
                    access_token: "ya29.first".into(),
                    refresh_token: Some("1//refresh".into()),
                },
                identity: Some(grace()),
            })),
            refresh: Mutex::new(Ok(ProviderGrant {
                tokens: ProviderTokens {
                    access_token: "ya29.renewed".into(),
                    refresh_token: None,
                },
                identity: None,
            })),
            revoke: Mutex::new(Ok(())),
            exchanges: Mutex::new(Vec::new()),
            refreshes: Mutex::new(Vec::new()),
            revocations: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn on_exchange(&self, result: Result<ProviderGrant, ProviderError>) {
        *self.exchange.lock().unwrap() = result;
    }

    pub(crate) fn on_refresh(&self, result: Result<ProviderGrant, ProviderError>) {
        *self.refresh.lock().unwrap() = result;
    }

    pub(crate) fn on_revoke(&self, result: Result<(), ProviderError>) {
        *self.revoke.lock().unwrap() = result;
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, state: &str, pkce_challenge: PkceCodeChallenge) -> String {
        format!(
            "https://accounts.example.test/auth?state={state}&code_challenge={}",
            pkce_challenge.as_str()
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ProviderGrant, ProviderError> {
        self.exchanges
            .lock()
            .unwrap()
            .push((code.to_string(), pkce_verifier.to_string()));
        self.exchange.lock().unwrap().clone()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderGrant, ProviderError> {
        self.refreshes.lock().unwrap().push(refresh_token.to_string());
        self.refresh.lock().unwrap().clone()
    }

    async fn revoke(&self, token: &str) -> Result<(), ProviderError> {
        self.revocations.lock().unwrap().push(token.to_string());
        self.revoke.lock().unwrap().clone()
    }
}
