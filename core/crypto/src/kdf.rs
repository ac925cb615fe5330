//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! The iteration count is not stored in the encrypted blob, so every
//! encrypt and decrypt of one vault must use the same parameters.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::keys::{DerivedKey, Salt, KEY_LENGTH};
use keyvault_common::{Error, Result};

/// Lowest iteration count accepted by `derive_key`.
pub const MIN_ITERATIONS: u32 = 1_000;

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Create parameters with an explicit iteration count.
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Parameters used by the persisted vault format (100,000 iterations).
    pub fn standard() -> Self {
        Self {
            iterations: 100_000,
        }
    }

    /// Higher cost parameters for vaults that never need to be read by
    /// the standard format.
    pub fn hardened() -> Self {
        Self {
            iterations: 600_000,
        }
    }

    /// Check the parameters before use.
    ///
    /// # Errors
    /// - Returns error if the iteration count is below `MIN_ITERATIONS`
    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_ITERATIONS {
            return Err(Error::InvalidInput(format!(
                "KDF iterations must be at least {}, got {}",
                MIN_ITERATIONS, self.iterations
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Derive a 256-bit key from a password and salt.
///
/// # Preconditions
/// - `password` must not be empty
/// - `params` must pass `KdfParams::validate`
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Security
/// - Password is not stored or logged
/// - The intermediate buffer is zeroized after derivation
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    params.validate()?;

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt.as_bytes(), params.iterations, &mut key_bytes);

    let key = DerivedKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}
