//! Common error types for KeyVault.

use thiserror::Error;

/// Top-level error type for KeyVault operations.
///
/// The first group of variants are the expected outcomes a front end must
/// surface to the user. The rest describe lower-level failures.
#[derive(Debug, Error)]
pub enum Error {
    /// Master password does not meet the minimum length.
    #[error("Master password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Supplied password does not match the stored verifier.
    #[error("Invalid master password")]
    InvalidPassword,

    /// Password verified but the stored vault could not be decrypted.
    #[error("Vault decryption failed, data might be corrupted")]
    CorruptVault,

    /// Authenticated decryption failed.
    ///
    /// Carries no detail. A wrong password and tampered ciphertext look
    /// the same.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// A change was applied in memory but could not be persisted.
    #[error("Failed to save vault: {0}")]
    SaveFailed(String),

    /// Import document is malformed.
    #[error("Invalid vault file format: {0}")]
    ImportFormatInvalid(String),

    /// Operation requires an unlocked session.
    #[error("Vault is locked")]
    Locked,

    /// Operation requires a vault that has been set up.
    #[error("Vault has not been set up")]
    NotInitialized,

    /// No entry with the given id.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Clipboard access failed.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
