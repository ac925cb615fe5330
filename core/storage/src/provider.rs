//! Storage provider trait definition.

use async_trait::async_trait;
use std::fmt;

use keyvault_common::{Error, Result};

/// Name of a stored record.
///
/// Restricted to ASCII letters, digits, `_`, `-` and `.` so that every
/// provider can map it to a file name or map key unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey(String);

impl RecordKey {
    /// Create a record key.
    ///
    /// # Errors
    /// - Returns error if the key is empty, starts with `.`, or contains
    ///   characters outside the allowed set
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidInput("Record key cannot be empty".to_string()));
        }
        if key.starts_with('.') {
            return Err(Error::InvalidInput(format!(
                "Record key cannot start with '.': {}",
                key
            )));
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(Error::InvalidInput(format!(
                "Record key contains invalid characters: {}",
                key
            )));
        }
        Ok(Self(key))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage provider trait for different backends.
///
/// Each record is written and replaced as a whole. There are no
/// transactions across records.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the provider name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Read a record.
    ///
    /// # Returns
    /// - `Ok(None)` if the record has never been written or was removed
    async fn read(&self, key: &RecordKey) -> Result<Option<Vec<u8>>>;

    /// Write a record, replacing any previous value.
    ///
    /// # Postconditions
    /// - A later `read` returns exactly `data`
    /// - A reader never observes a partially written record
    async fn write(&self, key: &RecordKey, data: Vec<u8>) -> Result<()>;

    /// Remove a record. Removing an absent record succeeds.
    async fn remove(&self, key: &RecordKey) -> Result<()>;

    /// Check if a record exists.
    async fn exists(&self, key: &RecordKey) -> Result<bool>;
}
