//! Blob storage trait and the fact records kept in it.
//!
//! Facts are question/answer pairs written one per blob. They are later
//! exported as a JSONL training corpus.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::StorageError;

/// A prompt/completion pair persisted to the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub prompt: String,
    pub completion: String,
}

impl Fact {
    pub fn new(prompt: impl Into<String>, completion: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            completion: completion.into(),
        }
    }
}

/// One line of an exported training file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub prompt: String,
    pub completion: String,
}

impl From<&Fact> for TrainingRecord {
    /// Completions are prefixed with a single space, the separator that
    /// fine-tuning corpora expect between prompt and completion.
    fn from(fact: &Fact) -> Self {
        Self {
            prompt: fact.prompt.clone(),
            completion: format!(" {}", fact.completion),
        }
    }
}

/// A key/value store of JSON documents.
///
/// Implementations: local directory, in-memory (for testing).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The backend name (e.g., "directory", "in_memory").
    fn name(&self) -> &str;

    /// Store `value` under `key`, overwriting any existing blob.
    async fn store(&self, key: &str, value: &serde_json::Value) -> std::result::Result<(), StorageError>;

    /// Fetch the blob stored under `key`.
    async fn get(&self, key: &str) -> std::result::Result<serde_json::Value, StorageError>;

    /// All keys, sorted ascending.
    async fn list(&self) -> std::result::Result<Vec<String>, StorageError>;

    /// Delete the blob under `key`.
    async fn delete(&self, key: &str) -> std::result::Result<(), StorageError>;
}
