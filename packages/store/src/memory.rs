use std::sync::{Arc, Mutex, PoisonError};

use crate::credential_store::{CredentialStore, StoreError};

/// In-memory CredentialStore for tests and hosts without persistence.
///
/// Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `credential`.
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(credential.into()))),
        }
    }

    /// Synchronous peek, for assertions.
    pub fn current(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.current())
    }

    async fn save(&self, credential: &str) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        store.save("first").await.unwrap();
        store.save("second").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("second"));

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_the_slot() {
        let store = MemoryStore::with_credential("abc");
        let other = store.clone();
        other.clear().await.unwrap();
        assert_eq!(store.current(), None);
    }
}
