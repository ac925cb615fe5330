//! Key material and per-encryption random values.
//!
//! Derived keys zeroize their memory on drop. Salts and nonces are not
//! secret and are stored next to the ciphertext they protect.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use keyvault_common::{Error, Result};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of freshly generated salts in bytes.
pub const SALT_LENGTH: usize = 16;

/// Length of AES-GCM nonces in bytes (96-bit).
pub const NONCE_LENGTH: usize = 12;

/// Symmetric key derived from the master password and a salt.
///
/// Lives for the duration of a single encrypt or decrypt call.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Generate a random salt from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut salt = vec![0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from stored bytes.
    ///
    /// # Errors
    /// - Returns error if fewer than `SALT_LENGTH` bytes are given
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < SALT_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Salt too short: expected at least {}, got {}",
                SALT_LENGTH,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Nonce (IV) for AES-GCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_LENGTH]);

impl Nonce {
    /// Generate a random nonce from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        Self(nonce)
    }

    /// Create from stored bytes.
    ///
    /// # Errors
    /// - Returns error unless exactly `NONCE_LENGTH` bytes are given
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let nonce: [u8; NONCE_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Invalid nonce length: expected {}, got {}",
                NONCE_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(nonce))
    }

    /// Get the nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_LENGTH] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_generate() {
        let salt1 = Salt::generate();
        let salt2 = Salt::generate();

        assert_eq!(salt1.as_bytes().len(), SALT_LENGTH);
        // Random salts should be different
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_salt_too_short_rejected() {
        assert!(Salt::from_bytes(vec![0u8; SALT_LENGTH - 1]).is_err());
        assert!(Salt::from_bytes(vec![0u8; 32]).is_ok());
    }

    #[test]
    fn test_nonce_generate() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }

    #[test]
    fn test_nonce_length_enforced() {
        assert!(Nonce::from_slice(&[0u8; 11]).is_err());
        assert!(Nonce::from_slice(&[0u8; 24]).is_err());
        assert!(Nonce::from_slice(&[7u8; NONCE_LENGTH]).is_ok());
    }

    #[test]
    fn test_derived_key_debug_redacted() {
        let key = DerivedKey::from_bytes([0xAB; KEY_LENGTH]);
        assert_eq!(format!("{:?}", key), "DerivedKey([REDACTED])");
    }
}
