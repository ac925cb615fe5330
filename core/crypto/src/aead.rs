//! Authenticated encryption using AES-256-GCM.
//!
//! Every call derives its own key from the password and a fresh salt, so no
//! key outlives the call that needed it.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce as GcmNonce,
};

use crate::blob::EncryptedBlob;
use crate::kdf::{derive_key, KdfParams};
use crate::keys::{Nonce, Salt};
use keyvault_common::{Error, Result};

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt plaintext under a password with the standard KDF parameters.
pub fn encrypt(plaintext: &[u8], password: &[u8]) -> Result<EncryptedBlob> {
    encrypt_with_params(plaintext, password, &KdfParams::default())
}

/// Encrypt plaintext under a password.
///
/// # Postconditions
/// - The returned blob carries a newly generated salt and nonce
/// - The ciphertext length is plaintext length + TAG_SIZE
///
/// # Errors
/// - Returns error if the password is empty or the parameters are invalid
/// - Returns error if encryption fails
pub fn encrypt_with_params(
    plaintext: &[u8],
    password: &[u8],
    params: &KdfParams,
) -> Result<EncryptedBlob> {
    let salt = Salt::generate();
    let nonce = Nonce::generate();
    let key = derive_key(password, &salt, params)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(GcmNonce::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedBlob::new(salt, nonce, ciphertext))
}

/// Decrypt a blob with the standard KDF parameters.
pub fn decrypt(blob: &EncryptedBlob, password: &[u8]) -> Result<Vec<u8>> {
    decrypt_with_params(blob, password, &KdfParams::default())
}

/// Decrypt a blob.
///
/// # Errors
/// - `DecryptionFailed` if the tag does not verify. A wrong password and a
///   modified salt, nonce or ciphertext produce this same error.
/// - Returns error if the password is empty or the parameters are invalid
pub fn decrypt_with_params(
    blob: &EncryptedBlob,
    password: &[u8],
    params: &KdfParams,
) -> Result<Vec<u8>> {
    let key = derive_key(password, blob.salt(), params)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(GcmNonce::from_slice(blob.nonce().as_bytes()), blob.ciphertext())
        .map_err(|_| Error::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::NONCE_LENGTH;
    use proptest::prelude::*;

    fn fast() -> KdfParams {
        KdfParams::new(crate::kdf::MIN_ITERATIONS)
    }

    fn flip_bit(bytes: &[u8], bit: usize) -> Vec<u8> {
        let mut out = bytes.to_vec();
        let idx = bit % (out.len() * 8);
        out[idx / 8] ^= 1 << (idx % 8);
        out
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip_standard_params() {
        let plaintext = br#"[{"title":"GitHub"}]"#;

        let blob = encrypt(plaintext, b"longenough1").unwrap();
        let decrypted = decrypt(&blob, b"longenough1").unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let plaintext = b"Test message";
        let blob = encrypt_with_params(plaintext, b"password", &fast()).unwrap();

        assert_eq!(blob.ciphertext().len(), plaintext.len() + TAG_SIZE);
        assert_eq!(blob.nonce().as_bytes().len(), NONCE_LENGTH);
    }

    #[test]
    fn test_fresh_salt_and_nonce_each_time() {
        let plaintext = b"Same plaintext";

        let blob1 = encrypt_with_params(plaintext, b"password", &fast()).unwrap();
        let blob2 = encrypt_with_params(plaintext, b"password", &fast()).unwrap();

        assert_ne!(blob1.salt(), blob2.salt());
        assert_ne!(blob1.nonce(), blob2.nonce());
        assert_ne!(blob1.ciphertext(), blob2.ciphertext());
    }

    #[test]
    fn test_wrong_password_fails() {
        let blob = encrypt_with_params(b"Secret data", b"password-one", &fast()).unwrap();
        let result = decrypt_with_params(&blob, b"password-two", &fast());

        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_iterations_fail() {
        let blob = encrypt_with_params(b"Secret data", b"password", &fast()).unwrap();
        let result = decrypt_with_params(&blob, b"password", &KdfParams::new(2_000));

        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_empty_plaintext() {
        let blob = encrypt_with_params(b"", b"password", &fast()).unwrap();
        assert_eq!(blob.ciphertext().len(), TAG_SIZE);
        assert!(decrypt_with_params(&blob, b"password", &fast()).unwrap().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..512),
                     password in "[ -~]{1,40}") {
            let blob = encrypt_with_params(&plaintext, password.as_bytes(), &fast()).unwrap();
            let decrypted = decrypt_with_params(&blob, password.as_bytes(), &fast()).unwrap();
            prop_assert_eq!(decrypted, plaintext);
        }

        #[test]
        fn tampered_ciphertext_detected(plaintext in proptest::collection::vec(any::<u8>(), 1..128),
                                        bit in any::<usize>()) {
            let blob = encrypt_with_params(&plaintext, b"password", &fast()).unwrap();
            let tampered = EncryptedBlob::new(
                blob.salt().clone(),
                *blob.nonce(),
                flip_bit(blob.ciphertext(), bit),
            );
            let result = decrypt_with_params(&tampered, b"password", &fast());
            prop_assert!(matches!(result, Err(Error::DecryptionFailed)));
        }

        #[test]
        fn tampered_nonce_detected(bit in 0usize..(NONCE_LENGTH * 8)) {
            let blob = encrypt_with_params(b"payload", b"password", &fast()).unwrap();
            let nonce = Nonce::from_slice(&flip_bit(blob.nonce().as_bytes(), bit)).unwrap();
            let tampered = EncryptedBlob::new(blob.salt().clone(), nonce, blob.ciphertext().to_vec());
            let result = decrypt_with_params(&tampered, b"password", &fast());
            prop_assert!(matches!(result, Err(Error::DecryptionFailed)));
        }

        #[test]
        fn tampered_salt_detected(bit in 0usize..(crate::keys::SALT_LENGTH * 8)) {
            let blob = encrypt_with_params(b"payload", b"password", &fast()).unwrap();
            let salt = Salt::from_bytes(flip_bit(blob.salt().as_bytes(), bit)).unwrap();
            let tampered = EncryptedBlob::new(salt, *blob.nonce(), blob.ciphertext().to_vec());
            let result = decrypt_with_params(&tampered, b"password", &fast());
            prop_assert!(matches!(result, Err(Error::DecryptionFailed)));
        }

        #[test]
        fn wrong_password_rejected(a in "[a-z]{8,16}", b in "[a-z]{8,16}") {
            prop_assume!(a != b);
            let blob = encrypt_with_params(b"payload", a.as_bytes(), &fast()).unwrap();
            let result = decrypt_with_params(&blob, b.as_bytes(), &fast());
            prop_assert!(matches!(result, Err(Error::DecryptionFailed)));
        }
    }
}
