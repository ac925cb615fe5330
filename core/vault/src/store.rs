//! Typed persistence of the three vault records.
//!
//! No encryption happens here. The blob is already ciphertext when it
//! arrives, the verifier is already a one-way digest, and settings are not
//! secret.

use std::sync::Arc;
use tracing::debug;

use crate::settings::VaultSettings;
use keyvault_common::{Error, Result};
use keyvault_crypto::{AuthVerifier, EncryptedBlob};
use keyvault_storage::{RecordKey, StorageProvider};

/// Record holding the master password verifier.
pub const VERIFIER_RECORD: &str = "master_verifier";

/// Record holding the encrypted vault blob.
pub const BLOB_RECORD: &str = "vault_blob";

/// Record holding user settings.
pub const SETTINGS_RECORD: &str = "settings";

/// Durable store for the verifier, the encrypted blob and settings.
///
/// Each record is written independently; there is no transaction across
/// records.
#[derive(Clone)]
pub struct VaultStore {
    provider: Arc<dyn StorageProvider>,
    verifier_key: RecordKey,
    blob_key: RecordKey,
    settings_key: RecordKey,
}

impl VaultStore {
    /// Create a store on top of a provider.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Result<Self> {
        Ok(Self {
            provider,
            verifier_key: RecordKey::new(VERIFIER_RECORD)?,
            blob_key: RecordKey::new(BLOB_RECORD)?,
            settings_key: RecordKey::new(SETTINGS_RECORD)?,
        })
    }

    /// Get the storage provider.
    pub fn provider(&self) -> Arc<dyn StorageProvider> {
        self.provider.clone()
    }

    /// A vault is initialized once a verifier has been stored.
    pub async fn is_initialized(&self) -> Result<bool> {
        self.provider.exists(&self.verifier_key).await
    }

    pub async fn save_verifier(&self, verifier: &AuthVerifier) -> Result<()> {
        debug!("Saving {}", VERIFIER_RECORD);
        self.provider
            .write(&self.verifier_key, verifier.as_str().as_bytes().to_vec())
            .await
    }

    /// Load the verifier, `None` before setup.
    pub async fn load_verifier(&self) -> Result<Option<AuthVerifier>> {
        match self.provider.read(&self.verifier_key).await? {
            Some(bytes) => {
                let encoded = String::from_utf8(bytes).map_err(|_| {
                    Error::Serialization(format!("{} is not valid UTF-8", VERIFIER_RECORD))
                })?;
                Ok(Some(AuthVerifier::from_string(encoded.trim())))
            }
            None => Ok(None),
        }
    }

    pub async fn save_blob(&self, blob: &EncryptedBlob) -> Result<()> {
        debug!("Saving {}", BLOB_RECORD);
        self.provider
            .write(&self.blob_key, blob.to_json()?.into_bytes())
            .await
    }

    /// Load the encrypted blob, `None` if none has been written.
    ///
    /// # Errors
    /// - `Serialization` if the stored record is not a valid blob
    pub async fn load_blob(&self) -> Result<Option<EncryptedBlob>> {
        let Some(bytes) = self.provider.read(&self.blob_key).await? else {
            return Ok(None);
        };
        let json = String::from_utf8(bytes)
            .map_err(|_| Error::Serialization(format!("{} is not valid UTF-8", BLOB_RECORD)))?;
        match EncryptedBlob::from_json(&json) {
            Ok(blob) => Ok(Some(blob)),
            Err(Error::ImportFormatInvalid(reason)) => Err(Error::Serialization(format!(
                "{} is malformed: {}",
                BLOB_RECORD, reason
            ))),
            Err(e) => Err(e),
        }
    }

    pub async fn save_settings(&self, settings: &VaultSettings) -> Result<()> {
        debug!("Saving {}", SETTINGS_RECORD);
        self.provider
            .write(&self.settings_key, settings.to_bytes()?)
            .await
    }

    /// Load settings, falling back to defaults when none are stored.
    pub async fn load_settings(&self) -> Result<VaultSettings> {
        match self.provider.read(&self.settings_key).await? {
            Some(bytes) => VaultSettings::from_bytes(&bytes),
            None => Ok(VaultSettings::default()),
        }
    }

    /// Remove all three records.
    pub async fn clear_all(&self) -> Result<()> {
        debug!("Clearing all vault records");
        self.provider.remove(&self.blob_key).await?;
        self.provider.remove(&self.verifier_key).await?;
        self.provider.remove(&self.settings_key).await?;
        Ok(())
    }
}
