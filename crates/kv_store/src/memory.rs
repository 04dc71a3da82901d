use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::{KvStore, StoreError, check_key};

/// In-memory key-value store.
///
/// Used by tests and by ephemeral runs that do not need state to survive a
/// restart. Contents are lost when the store is dropped.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        check_key(key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        check_key(key)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        check_key(key)?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}
