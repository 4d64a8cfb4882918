//! # Store crate: client-side persistence for the Taskboard session
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | `taskboard.toml`: backend URL and session timing for clients |
//! | [`credential_store`] | The [`CredentialStore`] trait and the storage key |
//! | `memory` | [`MemoryStore`], for tests and hosts without persistence |
//! | `file_store` | [`FileStore`], one file under the platform data dir (native) |
//! | `idb` | [`IdbStore`], IndexedDB (WASM + `web` feature) |
//!
//! Stores hold the credential's wire form as an opaque string. They never parse it;
//! the client decides whether what it reads back is usable.

pub mod config;
pub mod credential_store;

mod memory;
pub use memory::MemoryStore;

#[cfg(not(target_arch = "wasm32"))]
mod file_store;
#[cfg(not(target_arch = "wasm32"))]
pub use file_store::FileStore;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod idb;
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use idb::IdbStore;

pub use config::{BackendConfig, ClientConfig, ConfigError, SessionConfig};
pub use credential_store::{CredentialStore, StoreError, SESSION_KEY};
