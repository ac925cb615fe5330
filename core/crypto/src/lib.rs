//! Cryptographic primitives for KeyVault.
//!
//! This module provides:
//! - Key derivation using PBKDF2-HMAC-SHA256
//! - Authenticated encryption using AES-256-GCM
//! - Master password verification with constant-time comparison
//! - The encrypted blob format shared by storage and import/export
//! - A local password generator
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - A fresh salt and nonce are generated for every encryption

pub mod aead;
pub mod blob;
pub mod generator;
pub mod kdf;
pub mod keys;
pub mod verifier;

pub use aead::{decrypt, decrypt_with_params, encrypt, encrypt_with_params};
pub use blob::EncryptedBlob;
pub use generator::{generate_password, GeneratorOptions, Strength};
pub use kdf::{derive_key, KdfParams};
pub use keys::{DerivedKey, Nonce, Salt};
pub use verifier::{compute_verifier, verify_password, AuthVerifier};
