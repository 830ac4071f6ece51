//! In-memory blob store, useful for testing and ephemeral servers.

use async_trait::async_trait;
use factchat_core::error::StorageError;
use factchat_core::storage::BlobStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A blob store that keeps blobs in a sorted map.
/// Nothing survives the process.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn store(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.blobs.write().await.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Value, StorageError> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.blobs.read().await.keys().cloned().collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.blobs
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
