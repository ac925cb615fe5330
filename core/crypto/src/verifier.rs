//! Master password verification.
//!
//! The verifier is an unsalted SHA-256 digest of the password. It answers
//! "is this the right password" before any decryption is attempted, and is
//! independent of every salt used to derive encryption keys.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Stored one-way derivation of the master password.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthVerifier(String);

impl AuthVerifier {
    /// Wrap a verifier loaded from storage.
    pub fn from_string(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Get the encoded verifier for storage.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthVerifier([REDACTED])")
    }
}

/// Compute the verifier for a password.
pub fn compute_verifier(password: &[u8]) -> AuthVerifier {
    let digest = Sha256::digest(password);
    AuthVerifier(BASE64.encode(digest))
}

/// Check a password against a stored verifier.
///
/// # Security
/// The comparison runs in constant time with respect to the verifier
/// contents.
pub fn verify_password(password: &[u8], stored: &AuthVerifier) -> bool {
    let candidate = compute_verifier(password);
    candidate.0.as_bytes().ct_eq(stored.0.as_bytes()).into()
}
