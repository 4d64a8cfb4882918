//! # Credential persistence trait
//!
//! [`CredentialStore`] is the only thing the client knows about storage. It holds at
//! most one value, the session credential's wire form, under [`SESSION_KEY`].
//!
//! | Method | Contract |
//! |--------|----------|
//! | `load` | `Ok(None)` when nothing is stored |
//! | `save` | replaces whatever was stored |
//! | `clear` | succeeds when nothing is stored |
//!
//! The futures are not required to be `Send`: the IndexedDB implementation holds JS
//! handles across awaits.

use std::future::Future;

/// Key (file name, IndexedDB key) the credential lives under.
pub const SESSION_KEY: &str = "taskboard.session";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Credential storage unavailable: {0}")]
    Unavailable(String),

    #[error("Stored credential could not be read: {0}")]
    Unreadable(String),
}

/// Async storage for the single persisted credential.
pub trait CredentialStore {
    fn load(&self) -> impl Future<Output = Result<Option<String>, StoreError>>;
    fn save(&self, credential: &str) -> impl Future<Output = Result<(), StoreError>>;
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>>;
}
