//! Local fallback storage for values that must survive a failed durable
//! write or an unreachable proxy.
//!
//! A [`LocalStore`] is a flat string key-value store, the way a browser's
//! local storage is. Callers serialize their own values.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key under which the edit history is mirrored.
pub const EDIT_HISTORY_KEY: &str = "editHistory";

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("Local store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid local store key: {0}")]
    InvalidKey(String),
}

#[async_trait::async_trait]
pub trait LocalStore: Send + Sync {
    /// The stored value, or `None` when the key was never written.
    async fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    /// Replace the value stored under `key`.
    async fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// One `<key>.json` file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, LocalStoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(LocalStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait::async_trait]
impl LocalStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        match tokio::fs::read_to_string(self.path_for(key)?).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LocalStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn file_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.read(EDIT_HISTORY_KEY).await.unwrap(), None);

        store.write(EDIT_HISTORY_KEY, "[1,2]").await.unwrap();
        assert_eq!(store.read(EDIT_HISTORY_KEY).await.unwrap().as_deref(), Some("[1,2]"));
        assert!(dir.path().join("nested/editHistory.json").exists());

        store.write(EDIT_HISTORY_KEY, "[]").await.unwrap();
        assert_eq!(store.read(EDIT_HISTORY_KEY).await.unwrap().as_deref(), Some("[]"));

        store.remove(EDIT_HISTORY_KEY).await.unwrap();
        store.remove(EDIT_HISTORY_KEY).await.unwrap();
        assert_eq!(store.read(EDIT_HISTORY_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert_matches!(store.write("../escape", "x").await, Err(LocalStoreError::InvalidKey(_)));
        assert_matches!(store.read("").await, Err(LocalStoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn memory_store_is_independent_per_instance() {
        let a = MemoryStore::new();
        let b = MemoryStore::new();
        a.write("k", "v").await.unwrap();

        assert_eq!(a.read("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(b.read("k").await.unwrap(), None);
    }
}
