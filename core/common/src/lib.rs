//! Common utilities and types shared across KeyVault modules.
//!
//! This module provides the error taxonomy used by every layer and the
//! scoped-secret wrapper that holds the master password in memory.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{MasterPassword, MIN_PASSWORD_LENGTH};
