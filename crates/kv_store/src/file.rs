use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::store::{KvStore, StoreError, check_key};

/// File-backed key-value store.
///
/// Each key maps to `<dir>/<key>.json` holding one JSON document. Writes
/// replace the file contents; reads of absent files return `None`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait::async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        check_key(key)?;
        let path = self.path_for(key);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value = serde_json::from_str(&raw)?;
        Ok(Some(value))
    }

    async fn put(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        check_key(key)?;
        let path = self.path_for(key);
        let raw = serde_json::to_string(value)?;

        tokio::fs::write(&path, raw).await?;
        debug!("Wrote key '{}' to {}", key, path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        check_key(key)?;
        let path = self.path_for(key);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
