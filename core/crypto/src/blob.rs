//! Encrypted blob format.
//!
//! This is the only form in which vault contents reach persistent storage,
//! and the import/export document format:
//!
//! ```json
//! { "salt": "<base64>", "iv": "<base64>", "data": "<base64>" }
//! ```
//!
//! `data` holds the AES-GCM ciphertext with its 16-byte tag appended.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::aead::TAG_SIZE;
use crate::keys::{Nonce, Salt};
use keyvault_common::{Error, Result};

/// Salt, nonce and ciphertext of one encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlobDocument", into = "BlobDocument")]
pub struct EncryptedBlob {
    salt: Salt,
    nonce: Nonce,
    ciphertext: Vec<u8>,
}

/// Wire form of `EncryptedBlob`.
#[derive(Serialize, Deserialize)]
struct BlobDocument {
    salt: String,
    iv: String,
    data: String,
}

impl EncryptedBlob {
    /// Assemble a blob from its parts.
    pub fn new(salt: Salt, nonce: Nonce, ciphertext: Vec<u8>) -> Self {
        Self {
            salt,
            nonce,
            ciphertext,
        }
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON, for export files.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a blob document.
    ///
    /// All three fields must be present, base64 encoded, and of plausible
    /// length. Nothing else about the contents can be checked without the
    /// password.
    ///
    /// # Errors
    /// - `ImportFormatInvalid` describing the first problem found
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::ImportFormatInvalid(format!("not valid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| Error::ImportFormatInvalid("expected a JSON object".to_string()))?;

        let field = |name: &str| -> Result<String> {
            match object.get(name) {
                Some(serde_json::Value::String(s)) => Ok(s.clone()),
                Some(_) => Err(Error::ImportFormatInvalid(format!(
                    "field `{}` must be a string",
                    name
                ))),
                None => Err(Error::ImportFormatInvalid(format!(
                    "missing field `{}`",
                    name
                ))),
            }
        };

        Self::try_from(BlobDocument {
            salt: field("salt")?,
            iv: field("iv")?,
            data: field("data")?,
        })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| Error::ImportFormatInvalid(format!("field `{}` is not base64: {}", name, e)))
}

impl TryFrom<BlobDocument> for EncryptedBlob {
    type Error = Error;

    fn try_from(doc: BlobDocument) -> Result<Self> {
        let salt = Salt::from_bytes(decode_field("salt", &doc.salt)?)
            .map_err(|e| Error::ImportFormatInvalid(e.to_string()))?;
        let nonce = Nonce::from_slice(&decode_field("iv", &doc.iv)?)
            .map_err(|e| Error::ImportFormatInvalid(e.to_string()))?;
        let ciphertext = decode_field("data", &doc.data)?;

        if ciphertext.len() < TAG_SIZE {
            return Err(Error::ImportFormatInvalid(
                "field `data` is shorter than an authentication tag".to_string(),
            ));
        }

        Ok(Self {
            salt,
            nonce,
            ciphertext,
        })
    }
}

impl From<EncryptedBlob> for BlobDocument {
    fn from(blob: EncryptedBlob) -> Self {
        Self {
            salt: BASE64.encode(blob.salt.as_bytes()),
            iv: BASE64.encode(blob.nonce.as_bytes()),
            data: BASE64.encode(&blob.ciphertext),
        }
    }
}
