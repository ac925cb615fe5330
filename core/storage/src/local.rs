//! Local filesystem storage provider.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::provider::{RecordKey, StorageProvider};
use keyvault_common::Result;

/// Local filesystem storage provider.
///
/// Stores each record as one file named after its key in a root directory.
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Create a new local provider with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// Root directory of this provider.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    // Keys never start with '.', so a temp file cannot shadow a record.
    fn temp_path(&self, key: &RecordKey) -> PathBuf {
        self.root.join(format!(".{}.tmp", key.as_str()))
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn read(&self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
        match fs::read(self.record_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &RecordKey, data: Vec<u8>) -> Result<()> {
        let temp_path = self.temp_path(key);

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, self.record_path(key)).await?;
        debug!("Wrote record {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn remove(&self, key: &RecordKey) -> Result<()> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &RecordKey) -> Result<bool> {
        Ok(fs::try_exists(self.record_path(key)).await?)
    }
}
