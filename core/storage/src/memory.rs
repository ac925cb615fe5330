//! In-memory storage provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::provider::{RecordKey, StorageProvider};
use keyvault_common::{Error, Result};

/// In-memory storage provider.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<RwLock<bool>>,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write` fail (or succeed again).
    ///
    /// Lets callers exercise their handling of a storage failure.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.write() {
            *flag = fail;
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.storage.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Check if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> Error {
    Error::Storage("Memory storage lock poisoned".to_string())
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
        let storage = self.storage.read().map_err(|_| poisoned())?;
        Ok(storage.get(key.as_str()).cloned())
    }

    async fn write(&self, key: &RecordKey, data: Vec<u8>) -> Result<()> {
        if *self.fail_writes.read().map_err(|_| poisoned())? {
            return Err(Error::Storage(format!("Write rejected: {}", key)));
        }
        let mut storage = self.storage.write().map_err(|_| poisoned())?;
        storage.insert(key.as_str().to_string(), data);
        Ok(())
    }

    async fn remove(&self, key: &RecordKey) -> Result<()> {
        let mut storage = self.storage.write().map_err(|_| poisoned())?;
        storage.remove(key.as_str());
        Ok(())
    }

    async fn exists(&self, key: &RecordKey) -> Result<bool> {
        let storage = self.storage.read().map_err(|_| poisoned())?;
        Ok(storage.contains_key(key.as_str()))
    }
}
