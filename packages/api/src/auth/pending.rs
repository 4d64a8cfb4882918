//! # Pending logins: anti-forgery state awaiting its callback
//!
//! Between `/auth/login` and `/auth/callback` the backend remembers, per `state`
//! value, the PKCE verifier and the path to return to. A record can be taken exactly
//! once and only before it expires; taking it is what makes `state` single-use.
//!
//! | Store | Backing | When |
//! |-------|---------|------|
//! | [`MemoryPendingStore`] | `tokio::sync::Mutex<HashMap>` | single instance, tests, no `DATABASE_URL` |
//! | [`PgPendingStore`] | `pending_logins` table | `DATABASE_URL` set, shared across instances |
//!
//! Both index records by `sha256(state)` and confirm the stored state with a
//! constant-time comparison before handing the record out.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::crypto::constant_time_eq;

pub const PENDING_LOGIN_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub state: String,
    pub pkce_verifier: String,
    pub return_to: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingLogin {
    fn is_live(&self, state: &str, now: DateTime<Utc>) -> bool {
        now < self.expires_at && constant_time_eq(self.state.as_bytes(), state.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PendingStoreError {
    #[error("Pending login store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for PendingStoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait PendingLoginStore: Send + Sync {
    async fn insert(&self, login: PendingLogin) -> Result<(), PendingStoreError>;

    /// Remove the record for `state` and return it if it was still live at `now`.
    /// A second call with the same state always returns `None`.
    async fn take(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingLogin>, PendingStoreError>;
}

fn state_key(state: &str) -> String {
    hex::encode(Sha256::digest(state.as_bytes()))
}

#[derive(Default)]
pub struct MemoryPendingStore {
    logins: Mutex<HashMap<String, PendingLogin>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.logins.lock().await.len()
    }
}

#[async_trait]
impl PendingLoginStore for MemoryPendingStore {
    async fn insert(&self, login: PendingLogin) -> Result<(), PendingStoreError> {
        let mut logins = self.logins.lock().await;
        // Abandoned logins are dropped whenever a new one starts.
        logins.retain(|_, pending| pending.expires_at > login.created_at);
        logins.insert(state_key(&login.state), login);
        Ok(())
    }

    async fn take(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingLogin>, PendingStoreError> {
        let taken = self.logins.lock().await.remove(&state_key(state));
        Ok(taken.filter(|login| login.is_live(state, now)))
    }
}

pub struct PgPendingStore {
    pool: PgPool,
}

impl PgPendingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingLoginStore for PgPendingStore {
    async fn insert(&self, login: PendingLogin) -> Result<(), PendingStoreError> {
        sqlx::query("DELETE FROM pending_logins WHERE expires_at <= $1")
            .bind(login.created_at)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO pending_logins (state_hash, state, pkce_verifier, return_to, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(state_key(&login.state))
        .bind(&login.state)
        .bind(&login.pkce_verifier)
        .bind(&login.return_to)
        .bind(login.created_at)
        .bind(login.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn take(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingLogin>, PendingStoreError> {
        // Delete and read in one statement so two callbacks cannot both win.
        let row: Option<(String, String, String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            DELETE FROM pending_logins
            WHERE state_hash = $1
            RETURNING state, pkce_verifier, return_to, created_at, expires_at
            "#,
        )
        .bind(state_key(state))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(
                |(state, pkce_verifier, return_to, created_at, expires_at)| PendingLogin {
                    state,
                    pkce_verifier,
                    return_to,
                    created_at,
                    expires_at,
                },
            )
            .filter(|login| login.is_live(state, now)))
    }
}
