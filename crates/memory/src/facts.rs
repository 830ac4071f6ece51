//! Fact persistence and training-corpus export over a [`BlobStore`].
//!
//! Each fact is written to its own blob under a timestamped key. Export
//! walks every blob and writes one `{prompt, completion}` JSON line per fact.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use factchat_core::error::StorageError;
use factchat_core::storage::{BlobStore, Fact, TrainingRecord};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const KEY_PREFIX: &str = "blob.";
const KEY_SUFFIX: &str = ".json";

/// Default bound on a single blob operation.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a training export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingExport {
    pub path: PathBuf,
    pub count: usize,
}

/// Storage key for a fact written at `now`: `blob.<YYYYmmddHHMMSSfff>.json`.
pub fn fact_key(now: DateTime<Local>) -> String {
    format!("{KEY_PREFIX}{}{KEY_SUFFIX}", now.format("%Y%m%d%H%M%S%3f"))
}

/// Timestamp encoded in a fact key, if the key has one.
pub fn key_timestamp(key: &str) -> Option<NaiveDateTime> {
    let stamp = key.strip_prefix(KEY_PREFIX)?.strip_suffix(KEY_SUFFIX)?;
    let seconds = stamp.get(..14)?;
    NaiveDateTime::parse_from_str(seconds, "%Y%m%d%H%M%S").ok()
}

/// Writes, exports, and (when allowed) bulk-deletes facts.
pub struct FactStore {
    blobs: Arc<dyn BlobStore>,
    allow_kill_all: bool,
    timeout: Duration,
}

impl FactStore {
    /// Bulk delete starts disabled.
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            allow_kill_all: false,
            timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    /// Opt in to [`FactStore::kill_all_facts`].
    pub fn with_kill_all(mut self, allow: bool) -> Self {
        self.allow_kill_all = allow;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kill_all_enabled(&self) -> bool {
        self.allow_kill_all
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| StorageError::Timeout(self.timeout.as_secs()))?
    }

    /// Persist a fact under a fresh timestamped key and return the key.
    pub async fn write_fact(&self, fact: &Fact) -> Result<String, StorageError> {
        let key = fact_key(Local::now());
        let value = serde_json::to_value(fact).map_err(|e| StorageError::Serialization {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        self.bounded(self.blobs.store(&key, &value)).await?;
        info!(key = %key, backend = self.blobs.name(), "Fact stored");
        Ok(key)
    }

    /// Load one fact by key.
    pub async fn read_fact(&self, key: &str) -> Result<Fact, StorageError> {
        let value = self.bounded(self.blobs.get(key)).await?;
        serde_json::from_value(value).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Export every fact to `training.<YYYYmmddHHMMSS>.jsonl` in `dir`.
    ///
    /// With `newer_than`, facts whose key timestamp falls before that day are
    /// skipped. Keys without a timestamp are always exported.
    pub async fn create_training_file(
        &self,
        dir: &Path,
        newer_than: Option<NaiveDate>,
    ) -> Result<TrainingExport, StorageError> {
        let cutoff = newer_than.and_then(|d| d.and_hms_opt(0, 0, 0));
        let keys = self.bounded(self.blobs.list()).await?;

        let mut body = String::new();
        let mut count = 0;
        for key in keys {
            if let (Some(cutoff), Some(stamp)) = (cutoff, key_timestamp(&key)) {
                if stamp < cutoff {
                    continue;
                }
            }

            let fact = self.read_fact(&key).await?;
            let line = serde_json::to_string(&TrainingRecord::from(&fact)).map_err(|e| {
                StorageError::Serialization {
                    key: key.clone(),
                    reason: e.to_string(),
                }
            })?;
            body.push_str(&line);
            body.push('\n');
            count += 1;
        }

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("training.{}.jsonl", Local::now().format("%Y%m%d%H%M%S")));
        tokio::fs::write(&path, body).await?;

        info!(path = %path.display(), count, "Training file written");
        Ok(TrainingExport { path, count })
    }

    /// Delete every blob. Returns `StorageError::Disabled` unless enabled.
    pub async fn kill_all_facts(&self) -> Result<usize, StorageError> {
        if !self.allow_kill_all {
            warn!("Refusing to delete all facts: bulk delete is disabled");
            return Err(StorageError::Disabled(
                "deleting all facts requires storage.allow_kill_all_facts".into(),
            ));
        }

        let keys = self.bounded(self.blobs.list()).await?;
        for key in &keys {
            self.bounded(self.blobs.delete(key)).await?;
        }

        warn!(count = keys.len(), "All facts deleted");
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBlobStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    fn store() -> (InMemoryBlobStore, FactStore) {
        let blobs = InMemoryBlobStore::new();
        let facts = FactStore::new(Arc::new(blobs.clone()));
        (blobs, facts)
    }

    #[test]
    fn key_has_millisecond_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(fact_key(now), "blob.20240309140507000.json");
        assert_eq!(
            key_timestamp("blob.20240309140507123.json"),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(14, 5, 7)
        );
        assert_eq!(key_timestamp("notes.json"), None);
    }

    #[tokio::test]
    async fn write_then_read() {
        let (blobs, facts) = store();
        let key = facts.write_fact(&Fact::new("Who wrote Dune?", "Frank Herbert")).await.unwrap();
        assert!(key.starts_with("blob.") && key.ends_with(".json"));
        assert_eq!(blobs.len().await, 1);
        assert_eq!(facts.read_fact(&key).await.unwrap().completion, "Frank Herbert");
    }

    #[tokio::test]
    async fn training_file_has_one_line_per_fact_with_spaced_completion() {
        let (blobs, facts) = store();
        blobs.store("blob.20240101000000000.json", &json!({"prompt": "p1", "completion": "c1"})).await.unwrap();
        blobs.store("blob.20240102000000000.json", &json!({"prompt": "p2", "completion": "c2"})).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let export = facts.create_training_file(dir.path(), None).await.unwrap();
        assert_eq!(export.count, 2);

        let name = export.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("training.") && name.ends_with(".jsonl"));

        let content = std::fs::read_to_string(&export.path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines, vec![
            r#"{"prompt":"p1","completion":" c1"}"#,
            r#"{"prompt":"p2","completion":" c2"}"#,
        ]);
    }

    #[tokio::test]
    async fn newer_than_filters_by_key_date() {
        let (blobs, facts) = store();
        blobs.store("blob.20230101000000000.json", &json!({"prompt": "old", "completion": "x"})).await.unwrap();
        blobs.store("blob.20240601093000000.json", &json!({"prompt": "new", "completion": "y"})).await.unwrap();
        blobs.store("manual.json", &json!({"prompt": "undated", "completion": "z"})).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let cutoff = NaiveDate::from_ymd_opt(2024, 6, 1);
        let export = facts.create_training_file(dir.path(), cutoff).await.unwrap();
        assert_eq!(export.count, 2);

        let content = std::fs::read_to_string(&export.path).unwrap();
        assert!(content.contains("new"));
        assert!(content.contains("undated"));
        assert!(!content.contains("old"));
    }

    #[tokio::test]
    async fn malformed_fact_fails_export() {
        let (blobs, facts) = store();
        blobs.store("blob.20240101000000000.json", &json!({"unexpected": true})).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            facts.create_training_file(dir.path(), None).await,
            Err(StorageError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn kill_all_disabled_by_default() {
        let (blobs, facts) = store();
        facts.write_fact(&Fact::new("q", "a")).await.unwrap();

        assert!(!facts.kill_all_enabled());
        assert!(matches!(facts.kill_all_facts().await, Err(StorageError::Disabled(_))));
        assert_eq!(blobs.len().await, 1);
    }

    #[tokio::test]
    async fn kill_all_when_enabled() {
        let blobs = InMemoryBlobStore::new();
        let facts = FactStore::new(Arc::new(blobs.clone())).with_kill_all(true);
        blobs.store("a", &json!({})).await.unwrap();
        blobs.store("b", &json!({})).await.unwrap();

        assert_eq!(facts.kill_all_facts().await.unwrap(), 2);
        assert!(blobs.is_empty().await);
    }

    struct HangingStore;

    #[async_trait]
    impl BlobStore for HangingStore {
        fn name(&self) -> &str { "hanging" }
        async fn store(&self, _key: &str, _value: &serde_json::Value) -> Result<(), StorageError> {
            std::future::pending().await
        }
        async fn get(&self, key: &str) -> Result<serde_json::Value, StorageError> {
            Err(StorageError::NotFound(key.into()))
        }
        async fn list(&self) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Backend("unreachable".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let facts = FactStore::new(Arc::new(HangingStore)).with_timeout(Duration::from_secs(5));
        assert!(matches!(
            facts.write_fact(&Fact::new("q", "a")).await,
            Err(StorageError::Timeout(5))
        ));
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let facts = FactStore::new(Arc::new(HangingStore));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            facts.create_training_file(dir.path(), None).await,
            Err(StorageError::Backend(_))
        ));
    }
}
