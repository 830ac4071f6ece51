//! Directory-backed blob store: one pretty-printed JSON file per key.
//!
//! Storage location: `~/.factchat/blobs/<key>`
//!
//! Keys are plain file names. Anything that could escape the directory
//! (path separators, `..`) is rejected.

use async_trait::async_trait;
use factchat_core::error::StorageError;
use factchat_core::storage::BlobStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A blob store that keeps each blob as a file in a single directory.
pub struct DirectoryBlobStore {
    dir: PathBuf,
}

impl DirectoryBlobStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "Directory blob store opened");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key == "." || key.contains("..") || key.contains(['/', '\\']) {
            return Err(StorageError::Backend(format!("Invalid blob key: {key:?}")));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl BlobStore for DirectoryBlobStore {
    fn name(&self) -> &str {
        "directory"
    }

    async fn store(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let body = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, body).await?;
        debug!(key, "Blob stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<serde_json::Value, StorageError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            // Nothing written yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => keys.push(name),
                Err(name) => warn!(name = ?name, "Skipping blob with non-UTF-8 name"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn store_and_get_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(tmp.path().join("blobs"));
        store.store("blob.1.json", &json!({"prompt": "q", "completion": "a"})).await.unwrap();

        let reopened = DirectoryBlobStore::new(tmp.path().join("blobs"));
        let value = reopened.get("blob.1.json").await.unwrap();
        assert_eq!(value["completion"], "a");
    }

    #[tokio::test]
    async fn list_is_sorted_and_empty_before_first_write() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(tmp.path().join("blobs"));
        assert!(store.list().await.unwrap().is_empty());

        store.store("b", &json!(2)).await.unwrap();
        store.store("a", &json!(1)).await.unwrap();
        store.store("c", &json!(3)).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(tmp.path());
        store.store("k", &json!("old")).await.unwrap();
        store.store("k", &json!("new")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), json!("new"));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(tmp.path());
        assert!(matches!(store.get("nope").await, Err(StorageError::NotFound(_))));
        assert!(matches!(store.delete("nope").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(tmp.path());
        store.store("k", &json!({})).await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!tmp.path().join("k").exists());
    }

    #[tokio::test]
    async fn corrupted_blob_is_serialization_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.json"), "this is not json").unwrap();
        let store = DirectoryBlobStore::new(tmp.path());
        assert!(matches!(
            store.get("bad.json").await,
            Err(StorageError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_keys_that_escape_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(tmp.path());
        for key in ["../evil", "a/b", "", ".."] {
            assert!(matches!(
                store.store(key, &json!(1)).await,
                Err(StorageError::Backend(_))
            ));
        }
    }
}
