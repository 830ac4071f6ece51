//! Embedding index: the background knowledge the assistant draws on.
//!
//! Records are `(id, text, embedding)` triples kept in memory and persisted
//! as JSON lines, one record per line. Lookups embed the question through
//! the completion provider and return the closest stored text.
//!
//! Storage location: `~/.factchat/index.jsonl`

use async_trait::async_trait;
use factchat_core::error::MemoryError;
use factchat_core::memory::{BackgroundRetriever, IndexRecord};
use factchat_core::provider::{EmbeddingRequest, Provider};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::vector::best_match;

/// Default minimum similarity for a record to count as background.
pub const DEFAULT_MIN_SCORE: f32 = 0.75;

/// One line of a facts file fed to [`EmbeddingIndex::index_facts`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FactLine {
    Text { fact: String },
    Pair { prompt: String, completion: String },
}

impl FactLine {
    fn into_text(self) -> String {
        match self {
            FactLine::Text { fact } => fact,
            FactLine::Pair { prompt, completion } => format!("{prompt} {completion}"),
        }
    }
}

/// A vector index backed by an embedding provider.
pub struct EmbeddingIndex {
    path: Option<PathBuf>,
    records: RwLock<Vec<IndexRecord>>,
    provider: Arc<dyn Provider>,
    model: String,
    min_score: f32,
}

impl EmbeddingIndex {
    /// An index that lives only in memory.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            path: None,
            records: RwLock::new(Vec::new()),
            provider,
            model: model.into(),
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    /// Open an index persisted at `path`.
    ///
    /// A missing file starts empty (created on first write); corrupted
    /// lines are skipped.
    pub fn open(path: impl Into<PathBuf>, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let path = path.into();
        let records = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = records.len(), "Embedding index loaded");
        Self {
            path: Some(path),
            records: RwLock::new(records),
            provider,
            model: model.into(),
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn load_from_disk(path: &Path) -> Vec<IndexRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<IndexRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted index record");
                    None
                }
            })
            .collect()
    }

    async fn flush(&self) -> Result<(), MemoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let records = self.records.read().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create index directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for record in records.iter() {
            let line = serde_json::to_string(record)
                .map_err(|e| MemoryError::Storage(format!("Failed to serialize index record: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write index file: {e}")))
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
        let expected = inputs.len();
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs,
            })
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(MemoryError::EmbeddingFailed(format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    /// Embed and store `(id, text)` pairs, replacing records with the same id.
    pub async fn upsert_many(&self, items: Vec<(String, String)>) -> Result<usize, MemoryError> {
        if items.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embed(items.iter().map(|(_, text)| text.clone()).collect()).await?;

        {
            let mut records = self.records.write().await;
            for ((id, text), embedding) in items.into_iter().zip(embeddings) {
                let record = IndexRecord { id, text, embedding };
                match records.iter_mut().find(|r| r.id == record.id) {
                    Some(existing) => *existing = record,
                    None => records.push(record),
                }
            }
        }

        self.flush().await?;
        Ok(self.len().await)
    }

    pub async fn upsert(&self, id: impl Into<String>, text: impl Into<String>) -> Result<(), MemoryError> {
        self.upsert_many(vec![(id.into(), text.into())]).await.map(|_| ())
    }

    /// Index a JSONL file of facts.
    ///
    /// Each line is `{"fact": ...}` or `{"prompt": ..., "completion": ...}`.
    /// Records are keyed by line position, so re-indexing the same file
    /// replaces rather than duplicates. Returns how many facts were indexed.
    pub async fn index_facts(&self, path: &Path) -> Result<usize, MemoryError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to read {}: {e}", path.display())))?;

        let mut items = Vec::new();
        for (index, line) in content.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            let fact: FactLine = serde_json::from_str(line).map_err(|e| {
                MemoryError::Storage(format!("Invalid fact on line {}: {e}", index + 1))
            })?;
            items.push((index.to_string(), fact.into_text()));
        }

        let count = items.len();
        self.upsert_many(items).await?;
        info!(path = %path.display(), count, "Facts indexed");
        Ok(count)
    }
}

#[async_trait]
impl BackgroundRetriever for EmbeddingIndex {
    fn name(&self) -> &str {
        "embedding_index"
    }

    async fn find_match(&self, query: &str) -> Result<String, MemoryError> {
        if self.is_empty().await {
            return Ok(String::new());
        }

        let mut embeddings = self.embed(vec![query.to_string()]).await?;
        let query_embedding = embeddings.pop().unwrap_or_default();

        let records = self.records.read().await;
        Ok(match best_match(&records, &query_embedding, self.min_score) {
            Some((score, record)) => {
                debug!(id = %record.id, score, "Background match");
                record.text.clone()
            }
            None => String::new(),
        })
    }
}
