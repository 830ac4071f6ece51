//! Background retrieval: similarity search over stored snippets.
//!
//! The orchestrator asks a [`BackgroundRetriever`] for the single snippet that
//! best matches the question and wraps it into the prompt as context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// One embedded snippet in a vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Unique ID for this record
    pub id: String,

    /// The text returned when this record matches
    pub text: String,

    /// Embedding vector of `text`
    pub embedding: Vec<f32>,
}

/// Best-match lookup over a vector index.
#[async_trait]
pub trait BackgroundRetriever: Send + Sync {
    /// The backend name (e.g., "embedding_index", "none").
    fn name(&self) -> &str;

    /// Return the best-matching snippet for `query`, or an empty string when
    /// nothing clears the relevance threshold or the index is empty.
    async fn find_match(&self, query: &str) -> std::result::Result<String, MemoryError>;
}

/// A retriever that never has background to offer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackground;

#[async_trait]
impl BackgroundRetriever for NoBackground {
    fn name(&self) -> &str {
        "none"
    }

    async fn find_match(&self, _query: &str) -> std::result::Result<String, MemoryError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_background_is_empty() {
        assert_eq!(NoBackground.find_match("anything").await.unwrap(), "");
    }

    #[test]
    fn index_record_serialization() {
        let record = IndexRecord {
            id: "0".into(),
            text: "The user prefers Rust".into(),
            embedding: vec![0.1, 0.2],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("prefers Rust"));
        assert!(json.contains("0.1"));
    }
}
