//! # IndexedDB credential store: browser-side persistence
//!
//! [`IdbStore`] is the [`CredentialStore`] implementation used on the **web platform**.
//! It keeps the credential in the browser's IndexedDB via the [`rexie`] crate, so a
//! reload or a new tab finds the session.
//!
//! ## Database schema
//!
//! | IndexedDB database | Store | Key | Value |
//! |--------------------|-------|-----|-------|
//! | `"taskboard"` (version 1) | `"session"` | [`SESSION_KEY`] | credential wire form (string) |
//!
//! ## Connection management
//!
//! `IdbStore` only holds the database name and opens a fresh [`Rexie`] connection on
//! every operation. `Rexie` does not implement `Clone`, and the browser caches
//! IndexedDB connections internally.

use rexie::{ObjectStore as RexieObjectStore, Rexie, TransactionMode};
use tracing::warn;
use wasm_bindgen::JsValue;

use crate::credential_store::{CredentialStore, StoreError, SESSION_KEY};

const DB_NAME: &str = "taskboard";
const DB_VERSION: u32 = 1;
const SESSION_STORE: &str = "session";

fn unavailable(err: rexie::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// IndexedDB-backed CredentialStore for the web platform.
#[derive(Clone, Debug)]
pub struct IdbStore {
    db_name: String,
}

impl Default for IdbStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdbStore {
    pub fn new() -> Self {
        Self {
            db_name: DB_NAME.to_string(),
        }
    }

    async fn open_db(&self) -> Result<Rexie, StoreError> {
        Rexie::builder(&self.db_name)
            .version(DB_VERSION)
            .add_object_store(RexieObjectStore::new(SESSION_STORE))
            .build()
            .await
            .map_err(unavailable)
    }
}

impl CredentialStore for IdbStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        let db = self.open_db().await?;
        let tx = db
            .transaction(&[SESSION_STORE], TransactionMode::ReadOnly)
            .map_err(unavailable)?;
        let store = tx.store(SESSION_STORE).map_err(unavailable)?;

        let value = store
            .get(JsValue::from_str(SESSION_KEY))
            .await
            .map_err(unavailable)?;

        match value {
            None => Ok(None),
            Some(js_val) if js_val.is_undefined() || js_val.is_null() => Ok(None),
            Some(js_val) => serde_wasm_bindgen::from_value::<String>(js_val)
                .map(Some)
                .map_err(|e| {
                    warn!(error = %e, "Stored session is not a string");
                    StoreError::Unreadable(e.to_string())
                }),
        }
    }

    async fn save(&self, credential: &str) -> Result<(), StoreError> {
        let db = self.open_db().await?;
        let tx = db
            .transaction(&[SESSION_STORE], TransactionMode::ReadWrite)
            .map_err(unavailable)?;
        let store = tx.store(SESSION_STORE).map_err(unavailable)?;

        let key = JsValue::from_str(SESSION_KEY);
        let value = JsValue::from_str(credential);
        store.put(&value, Some(&key)).await.map_err(unavailable)?;
        tx.done().await.map_err(unavailable)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let db = self.open_db().await?;
        let tx = db
            .transaction(&[SESSION_STORE], TransactionMode::ReadWrite)
            .map_err(unavailable)?;
        let store = tx.store(SESSION_STORE).map_err(unavailable)?;

        store
            .delete(JsValue::from_str(SESSION_KEY))
            .await
            .map_err(unavailable)?;
        tx.done().await.map_err(unavailable)?;
        Ok(())
    }
}
