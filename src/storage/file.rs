//! File-backed key-value store: one JSON document per key.

use super::backend::KeyValueStore;
use crate::core::{AegisError, Result};
use std::path::{Path, PathBuf};

/// Stores each key as `<data_dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `data_dir`. The directory is created lazily.
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(AegisError::storage(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.data_dir.join(format!("{}.json", key)))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.data_dir).await?;

        // Write then rename so a crash never leaves a truncated file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::trace!("Persisted {:?}", path);
        Ok(())
    }
}
