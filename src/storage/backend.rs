//! Key-value persistence trait and the in-memory implementation.

use crate::core::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Durable key-value storage supplied by the host.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite a value.
    async fn set(&self, key: &str, value: String) -> Result<()>;
}

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no keys are held.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1".to_string()).await.unwrap();
        store.set("k", "v2".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
        assert_eq!(store.len(), 1);
    }
}
