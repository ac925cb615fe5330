//! Vault session management.
//!
//! A session owns the vault's lifecycle: setup, unlock, lock, and every
//! mutation of the decrypted entry set. The master password and entries
//! exist in memory only while the session is unlocked, and are zeroized when
//! it locks or is dropped.
//!
//! All state transitions and entry mutations run under one async mutex. A
//! lock requested while a mutation is in flight waits for the mutation to
//! finish persisting and then locks.

use std::collections::BTreeSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::entry::{CredentialEntry, EntryDraft};
use crate::settings::VaultSettings;
use crate::store::VaultStore;
use keyvault_common::{Error, MasterPassword, Result, MIN_PASSWORD_LENGTH};
use keyvault_crypto::{
    compute_verifier, decrypt_with_params, encrypt_with_params, verify_password, EncryptedBlob,
    KdfParams,
};

/// State of the vault session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No verifier has been stored; the vault must be set up first.
    Uninitialized,
    /// Vault exists, nothing decrypted is held in memory.
    Locked,
    /// Password and entries are held in memory.
    Unlocked,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Locked => write!(f, "Locked"),
            Self::Unlocked => write!(f, "Unlocked"),
        }
    }
}

/// Result of importing a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The blob opened with the current password and its entries are now
    /// the active set.
    Activated { entries: usize },
    /// The blob was stored as the active vault without being opened. It
    /// will be checked on the next unlock.
    Stored,
}

/// Decrypted vault contents.
struct OpenVault {
    password: MasterPassword,
    entries: Vec<CredentialEntry>,
}

enum Inner {
    Uninitialized,
    Locked,
    Unlocked(OpenVault),
}

impl Inner {
    fn state(&self) -> SessionState {
        match self {
            Inner::Uninitialized => SessionState::Uninitialized,
            Inner::Locked => SessionState::Locked,
            Inner::Unlocked(_) => SessionState::Unlocked,
        }
    }

    fn open(&self) -> Result<&OpenVault> {
        match self {
            Inner::Unlocked(vault) => Ok(vault),
            Inner::Locked => Err(Error::Locked),
            Inner::Uninitialized => Err(Error::NotInitialized),
        }
    }

    fn open_mut(&mut self) -> Result<&mut OpenVault> {
        match self {
            Inner::Unlocked(vault) => Ok(vault),
            Inner::Locked => Err(Error::Locked),
            Inner::Uninitialized => Err(Error::NotInitialized),
        }
    }
}

fn save_failed(err: Error) -> Error {
    warn!("Vault change not persisted: {}", err);
    match err {
        Error::SaveFailed(_) => err,
        other => Error::SaveFailed(other.to_string()),
    }
}

/// Run CPU-bound crypto off the async worker threads.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Crypto(format!("Crypto task failed: {}", e)))?
}

/// The single vault session of a process.
pub struct VaultSession {
    store: VaultStore,
    params: KdfParams,
    inner: Mutex<Inner>,
    settings: RwLock<VaultSettings>,
}

impl VaultSession {
    /// Open a session over a store with the standard KDF parameters.
    pub async fn open(store: VaultStore) -> Result<Self> {
        Self::open_with_params(store, KdfParams::default()).await
    }

    /// Open a session over a store.
    ///
    /// # Postconditions
    /// - State is `Locked` if a verifier is stored, else `Uninitialized`
    /// - Settings are loaded; unreadable settings fall back to defaults
    pub async fn open_with_params(store: VaultStore, params: KdfParams) -> Result<Self> {
        params.validate()?;

        let inner = if store.is_initialized().await? {
            Inner::Locked
        } else {
            Inner::Uninitialized
        };

        let settings = match store.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings: {}", e);
                VaultSettings::default()
            }
        };

        debug!("Session opened in state {}", inner.state());

        Ok(Self {
            store,
            params,
            inner: Mutex::new(inner),
            settings: RwLock::new(settings),
        })
    }

    /// Get the current session state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state()
    }

    /// Whether a vault has been set up.
    pub async fn is_initialized(&self) -> bool {
        self.state().await != SessionState::Uninitialized
    }

    /// Check if the session is unlocked.
    pub async fn is_unlocked(&self) -> bool {
        self.state().await == SessionState::Unlocked
    }

    async fn seal(
        &self,
        password: &MasterPassword,
        entries: &[CredentialEntry],
    ) -> Result<EncryptedBlob> {
        let plaintext = Zeroizing::new(serde_json::to_vec(entries)?);
        let password = password.clone();
        let params = self.params;
        run_blocking(move || encrypt_with_params(&plaintext, password.as_bytes(), &params)).await
    }

    async fn unseal(
        &self,
        blob: EncryptedBlob,
        password: &MasterPassword,
    ) -> Result<Vec<CredentialEntry>> {
        let password = password.clone();
        let params = self.params;
        let plaintext = Zeroizing::new(
            run_blocking(move || decrypt_with_params(&blob, password.as_bytes(), &params)).await?,
        );
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Re-encrypt the full entry set and persist it.
    async fn persist(&self, vault: &OpenVault) -> Result<()> {
        let blob = self
            .seal(&vault.password, &vault.entries)
            .await
            .map_err(save_failed)?;
        self.store.save_blob(&blob).await.map_err(save_failed)
    }

    /// Create the vault.
    ///
    /// # Preconditions
    /// - State is `Uninitialized`
    /// - Password has at least `MIN_PASSWORD_LENGTH` characters
    ///
    /// # Postconditions
    /// - Verifier and an encrypted empty entry set are persisted
    /// - State is `Unlocked` with no entries
    ///
    /// # Errors
    /// - `WeakPassword` (nothing is written)
    /// - `AlreadyExists` if the vault is already set up
    /// - `SaveFailed` if persisting fails; state is unchanged
    pub async fn setup(&self, password: MasterPassword) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if !matches!(*inner, Inner::Uninitialized) {
            return Err(Error::AlreadyExists("Vault is already set up".to_string()));
        }
        if !password.meets_minimum() {
            return Err(Error::WeakPassword {
                min: MIN_PASSWORD_LENGTH,
            });
        }

        let verifier = compute_verifier(password.as_bytes());
        let blob = self.seal(&password, &[]).await.map_err(save_failed)?;

        // The verifier marks the vault as initialized, so it goes last.
        self.store.save_blob(&blob).await.map_err(save_failed)?;
        self.store
            .save_verifier(&verifier)
            .await
            .map_err(save_failed)?;

        *inner = Inner::Unlocked(OpenVault {
            password,
            entries: Vec::new(),
        });
        info!("Vault created and unlocked");
        Ok(())
    }

    /// Unlock the vault.
    ///
    /// # Errors
    /// - `NotInitialized` before setup
    /// - `InvalidPassword` if the password does not match the verifier
    /// - `CorruptVault` if the password matches but the stored blob cannot
    ///   be decrypted or parsed
    pub async fn unlock(&self, password: MasterPassword) -> Result<()> {
        let mut inner = self.inner.lock().await;

        match &*inner {
            Inner::Uninitialized => return Err(Error::NotInitialized),
            Inner::Locked => {}
            Inner::Unlocked(_) => {}
        }

        let verifier = self
            .store
            .load_verifier()
            .await?
            .ok_or(Error::NotInitialized)?;

        if !verify_password(password.as_bytes(), &verifier) {
            info!("Unlock rejected: invalid password");
            return Err(Error::InvalidPassword);
        }
        if matches!(*inner, Inner::Unlocked(_)) {
            return Ok(());
        }

        let entries = match self.store.load_blob().await {
            Ok(None) => Vec::new(),
            Ok(Some(blob)) => match self.unseal(blob, &password).await {
                Ok(entries) => entries,
                Err(Error::DecryptionFailed) | Err(Error::Serialization(_)) => {
                    warn!("Password verified but vault could not be decrypted");
                    return Err(Error::CorruptVault);
                }
                Err(e) => return Err(e),
            },
            Err(Error::Serialization(reason)) => {
                warn!("Stored vault is unreadable: {}", reason);
                return Err(Error::CorruptVault);
            }
            Err(e) => return Err(e),
        };

        info!("Vault unlocked with {} entries", entries.len());
        *inner = Inner::Unlocked(OpenVault { password, entries });
        Ok(())
    }

    /// Lock the vault, erasing the password and entries from memory.
    ///
    /// Idempotent. Does nothing before setup.
    pub async fn lock(&self) {
        let mut inner = self.inner.lock().await;
        if let Inner::Unlocked(_) = &*inner {
            // Dropping the open vault zeroizes the password and secrets.
            *inner = Inner::Locked;
            info!("Vault locked");
        }
    }

    /// Snapshot of all entries.
    pub async fn current_entries(&self) -> Result<Vec<CredentialEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.open()?.entries.clone())
    }

    /// Get one entry by id.
    pub async fn get_entry(&self, id: &str) -> Result<CredentialEntry> {
        let inner = self.inner.lock().await;
        inner
            .open()?
            .entries
            .iter()
            .find(|e| e.id() == id)
            .cloned()
            .ok_or_else(|| Error::EntryNotFound(id.to_string()))
    }

    /// Entries whose title, url or username contain `query`
    /// (case-insensitive). An empty query returns every entry.
    pub async fn search(&self, query: &str) -> Result<Vec<CredentialEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .open()?
            .entries
            .iter()
            .filter(|e| e.matches(query))
            .cloned()
            .collect())
    }

    /// Distinct categories in use, sorted.
    pub async fn categories(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        let categories: BTreeSet<String> = inner
            .open()?
            .entries
            .iter()
            .map(|e| e.category.clone())
            .collect();
        Ok(categories.into_iter().collect())
    }

    /// Add an entry and persist the vault.
    ///
    /// # Errors
    /// - `Locked` / `NotInitialized` unless unlocked
    /// - `SaveFailed` if persisting fails; the entry stays in memory
    pub async fn add_entry(&self, draft: EntryDraft) -> Result<CredentialEntry> {
        let mut inner = self.inner.lock().await;
        let vault = inner.open_mut()?;

        let entry = CredentialEntry::create(draft);
        vault.entries.push(entry.clone());
        debug!("Added entry {}", entry.id());

        self.persist(vault).await?;
        Ok(entry)
    }

    /// Edit an entry and persist the vault.
    ///
    /// # Errors
    /// - `EntryNotFound` if no entry has this id
    /// - `SaveFailed` if persisting fails; the edit stays in memory
    pub async fn update_entry(&self, id: &str, draft: EntryDraft) -> Result<CredentialEntry> {
        let mut inner = self.inner.lock().await;
        let vault = inner.open_mut()?;

        let entry = vault
            .entries
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or_else(|| Error::EntryNotFound(id.to_string()))?;
        entry.apply(draft);
        let updated = entry.clone();
        debug!("Updated entry {}", id);

        self.persist(vault).await?;
        Ok(updated)
    }

    /// Delete an entry and persist the vault.
    ///
    /// # Errors
    /// - `EntryNotFound` if no entry has this id
    /// - `SaveFailed` if persisting fails; the entry stays deleted in memory
    pub async fn delete_entry(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let vault = inner.open_mut()?;

        let index = vault
            .entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| Error::EntryNotFound(id.to_string()))?;
        vault.entries.remove(index);
        debug!("Deleted entry {}", id);

        self.persist(vault).await
    }

    /// Make `blob` the active vault.
    ///
    /// If unlocked and the blob opens with the current password, its entries
    /// replace the in-memory set. Otherwise the blob is stored as-is and the
    /// in-memory state is left alone; it will be checked on the next unlock.
    ///
    /// # Errors
    /// - `SaveFailed` if the blob cannot be stored
    pub async fn import_blob(&self, blob: EncryptedBlob) -> Result<ImportOutcome> {
        let mut inner = self.inner.lock().await;

        let outcome = match &mut *inner {
            Inner::Unlocked(vault) => match self.unseal(blob.clone(), &vault.password).await {
                Ok(entries) => {
                    vault.entries = entries;
                    ImportOutcome::Activated {
                        entries: vault.entries.len(),
                    }
                }
                Err(e) => {
                    debug!("Imported blob does not open with current password: {}", e);
                    ImportOutcome::Stored
                }
            },
            _ => ImportOutcome::Stored,
        };

        self.store.save_blob(&blob).await.map_err(save_failed)?;
        info!("Vault imported: {:?}", outcome);
        Ok(outcome)
    }

    /// The currently persisted blob, for backup. Available in any state.
    pub async fn export_blob(&self) -> Result<Option<EncryptedBlob>> {
        let _guard = self.inner.lock().await;
        self.store.load_blob().await
    }

    /// Change the master password.
    ///
    /// The entry set is re-encrypted under the new password and persisted
    /// before the new verifier is written. If the verifier write fails the
    /// blob is restored under the old password.
    ///
    /// # Errors
    /// - `InvalidPassword` if `old` is wrong
    /// - `WeakPassword` if `new` is too short
    /// - `SaveFailed` if persisting fails; the old password stays active
    pub async fn change_password(
        &self,
        old: MasterPassword,
        new: MasterPassword,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let vault = inner.open_mut()?;

        let verifier = self
            .store
            .load_verifier()
            .await?
            .ok_or(Error::NotInitialized)?;
        if !verify_password(old.as_bytes(), &verifier) {
            return Err(Error::InvalidPassword);
        }
        if !new.meets_minimum() {
            return Err(Error::WeakPassword {
                min: MIN_PASSWORD_LENGTH,
            });
        }

        let blob = self
            .seal(&new, &vault.entries)
            .await
            .map_err(save_failed)?;
        self.store.save_blob(&blob).await.map_err(save_failed)?;

        if let Err(e) = self.store.save_verifier(&compute_verifier(new.as_bytes())).await {
            if let Err(rollback) = self.persist(vault).await {
                warn!("Could not restore vault after failed password change: {}", rollback);
            }
            return Err(save_failed(e));
        }

        vault.password = new;
        info!("Master password changed");
        Ok(())
    }

    /// Delete every record and return to `Uninitialized`.
    pub async fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.store.clear_all().await?;
        *inner = Inner::Uninitialized;
        *self.settings.write().await = VaultSettings::default();
        warn!("Vault destroyed");
        Ok(())
    }

    /// Current settings.
    pub async fn settings(&self) -> VaultSettings {
        *self.settings.read().await
    }

    /// Validate, persist and apply new settings. Allowed in any state.
    ///
    /// # Errors
    /// - `InvalidInput` if a value is out of range
    /// - `SaveFailed` if persisting fails; the old settings stay active
    pub async fn update_settings(&self, settings: VaultSettings) -> Result<()> {
        settings.validate()?;
        self.store
            .save_settings(&settings)
            .await
            .map_err(save_failed)?;
        *self.settings.write().await = settings;
        debug!("Settings updated: {:?}", settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyvault_crypto::encrypt_with_params;
    use keyvault_storage::{MemoryProvider, RecordKey, StorageProvider};
    use std::sync::Arc;

    const PASSWORD: &str = "longenough1";

    fn fast() -> KdfParams {
        KdfParams::new(1_000)
    }

    async fn new_session() -> (VaultSession, MemoryProvider) {
        let provider = MemoryProvider::new();
        let store = VaultStore::new(Arc::new(provider.clone())).unwrap();
        let session = VaultSession::open_with_params(store, fast()).await.unwrap();
        (session, provider)
    }

    async fn unlocked_session() -> (VaultSession, MemoryProvider) {
        let (session, provider) = new_session().await;
        session.setup(PASSWORD.into()).await.unwrap();
        (session, provider)
    }

    fn github() -> EntryDraft {
        EntryDraft {
            title: Some("GitHub".to_string()),
            username: Some("octocat".to_string()),
            secret: Some("hunter2".to_string()),
            url: Some("https://github.com".to_string()),
            ..EntryDraft::default()
        }
    }

    #[tokio::test]
    async fn test_new_session_uninitialized() {
        let (session, _) = new_session().await;
        assert_eq!(session.state().await, SessionState::Uninitialized);
        assert!(!session.is_initialized().await);
        assert!(matches!(
            session.current_entries().await,
            Err(Error::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_setup_unlocks_empty_vault() {
        let (session, provider) = unlocked_session().await;

        assert_eq!(session.state().await, SessionState::Unlocked);
        assert!(session.current_entries().await.unwrap().is_empty());
        // verifier + blob
        assert_eq!(provider.len(), 2);
    }

    #[tokio::test]
    async fn test_setup_twice_rejected() {
        let (session, _) = unlocked_session().await;
        assert!(matches!(
            session.setup(PASSWORD.into()).await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_setup_storage_failure_keeps_state() {
        let (session, provider) = new_session().await;
        provider.set_fail_writes(true);

        assert!(matches!(
            session.setup(PASSWORD.into()).await,
            Err(Error::SaveFailed(_))
        ));
        assert_eq!(session.state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_reopen_is_locked() {
        let (session, provider) = unlocked_session().await;
        drop(session);

        let store = VaultStore::new(Arc::new(provider)).unwrap();
        let reopened = VaultSession::open_with_params(store, fast()).await.unwrap();
        assert_eq!(reopened.state().await, SessionState::Locked);
        assert!(reopened.is_initialized().await);
    }

    #[tokio::test]
    async fn test_lock_is_idempotent() {
        let (session, _) = unlocked_session().await;
        session.lock().await;
        session.lock().await;
        assert_eq!(session.state().await, SessionState::Locked);
        assert!(matches!(session.current_entries().await, Err(Error::Locked)));
    }

    #[tokio::test]
    async fn test_lock_before_setup_is_noop() {
        let (session, _) = new_session().await;
        session.lock().await;
        assert_eq!(session.state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_unlock_before_setup() {
        let (session, _) = new_session().await;
        assert!(matches!(
            session.unlock(PASSWORD.into()).await,
            Err(Error::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_unlock_when_unlocked_checks_password() {
        let (session, _) = unlocked_session().await;
        session.add_entry(github()).await.unwrap();

        session.unlock(PASSWORD.into()).await.unwrap();
        assert_eq!(session.current_entries().await.unwrap().len(), 1);
        assert!(matches!(
            session.unlock("wrongpass".into()).await,
            Err(Error::InvalidPassword)
        ));
        assert_eq!(session.state().await, SessionState::Unlocked);
    }

    #[tokio::test]
    async fn test_unlock_without_blob_is_empty() {
        let (session, provider) = unlocked_session().await;
        session.lock().await;
        provider
            .remove(&RecordKey::new(crate::store::BLOB_RECORD).unwrap())
            .await
            .unwrap();

        session.unlock(PASSWORD.into()).await.unwrap();
        assert!(session.current_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unlock_garbage_blob_is_corrupt() {
        let (session, provider) = unlocked_session().await;
        session.lock().await;
        provider
            .write(
                &RecordKey::new(crate::store::BLOB_RECORD).unwrap(),
                b"not json".to_vec(),
            )
            .await
            .unwrap();

        assert!(matches!(
            session.unlock(PASSWORD.into()).await,
            Err(Error::CorruptVault)
        ));
        assert_eq!(session.state().await, SessionState::Locked);
    }

    #[tokio::test]
    async fn test_add_update_delete() {
        let (session, _) = unlocked_session().await;

        let added = session.add_entry(github()).await.unwrap();
        let updated = session
            .update_entry(
                added.id(),
                EntryDraft {
                    notes: Some("2FA enabled".to_string()),
                    ..EntryDraft::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id(), added.id());
        assert_eq!(updated.created_at(), added.created_at());
        assert_eq!(updated.notes, "2FA enabled");
        assert_eq!(session.get_entry(added.id()).await.unwrap().notes, "2FA enabled");

        session.delete_entry(added.id()).await.unwrap();
        assert!(session.current_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_entry() {
        let (session, _) = unlocked_session().await;
        assert!(matches!(
            session.update_entry("missing", EntryDraft::default()).await,
            Err(Error::EntryNotFound(_))
        ));
        assert!(matches!(
            session.delete_entry("missing").await,
            Err(Error::EntryNotFound(_))
        ));
        assert!(matches!(
            session.get_entry("missing").await,
            Err(Error::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mutation_requires_unlock() {
        let (session, _) = unlocked_session().await;
        session.lock().await;
        assert!(matches!(session.add_entry(github()).await, Err(Error::Locked)));
        assert!(matches!(session.search("git").await, Err(Error::Locked)));
    }

    #[tokio::test]
    async fn test_every_save_is_fresh_blob() {
        let (session, _) = unlocked_session().await;
        let entry = session.add_entry(github()).await.unwrap();
        let first = session.export_blob().await.unwrap().unwrap();

        // Same plaintext, still a new salt and nonce.
        session
            .update_entry(entry.id(), EntryDraft::default())
            .await
            .unwrap();
        let second = session.export_blob().await.unwrap().unwrap();

        assert_ne!(first.salt(), second.salt());
        assert_ne!(first.nonce(), second.nonce());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_local_change() {
        let (session, provider) = unlocked_session().await;
        let before = session.export_blob().await.unwrap();
        provider.set_fail_writes(true);

        let result = session.add_entry(github()).await;

        assert!(matches!(result, Err(Error::SaveFailed(_))));
        assert_eq!(session.current_entries().await.unwrap().len(), 1);
        assert_eq!(session.export_blob().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_save_failure_keeps_edit() {
        let (session, provider) = unlocked_session().await;
        let entry = session.add_entry(github()).await.unwrap();
        let before = session.export_blob().await.unwrap();
        provider.set_fail_writes(true);

        let result = session
            .update_entry(
                entry.id(),
                EntryDraft {
                    secret: Some("rotated".to_string()),
                    ..EntryDraft::default()
                },
            )
            .await;

        assert!(matches!(result, Err(Error::SaveFailed(_))));
        assert_eq!(session.get_entry(entry.id()).await.unwrap().secret, "rotated");
        assert_eq!(session.export_blob().await.unwrap(), before);

        // The next successful save carries the edit.
        provider.set_fail_writes(false);
        session.add_entry(EntryDraft::titled("Bank")).await.unwrap();
        session.lock().await;
        session.unlock(PASSWORD.into()).await.unwrap();
        assert_eq!(session.get_entry(entry.id()).await.unwrap().secret, "rotated");
    }

    #[tokio::test]
    async fn test_delete_save_failure_keeps_deletion() {
        let (session, provider) = unlocked_session().await;
        let entry = session.add_entry(github()).await.unwrap();
        let before = session.export_blob().await.unwrap();
        provider.set_fail_writes(true);

        let result = session.delete_entry(entry.id()).await;

        assert!(matches!(result, Err(Error::SaveFailed(_))));
        assert!(session.current_entries().await.unwrap().is_empty());
        assert_eq!(session.export_blob().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_import_save_failure_while_unlocked() {
        let (session, provider) = unlocked_session().await;
        let before = session.export_blob().await.unwrap();
        let payload = serde_json::to_vec(&vec![CredentialEntry::create(github())]).unwrap();
        let blob = encrypt_with_params(&payload, PASSWORD.as_bytes(), &fast()).unwrap();
        provider.set_fail_writes(true);

        let result = session.import_blob(blob).await;

        assert!(matches!(result, Err(Error::SaveFailed(_))));
        let entries = session.current_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "GitHub");
        assert_eq!(session.export_blob().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_import_save_failure_while_locked() {
        let (session, provider) = unlocked_session().await;
        session.lock().await;
        let before = session.export_blob().await.unwrap();
        let blob = encrypt_with_params(b"[]", PASSWORD.as_bytes(), &fast()).unwrap();
        provider.set_fail_writes(true);

        let result = session.import_blob(blob).await;

        assert!(matches!(result, Err(Error::SaveFailed(_))));
        assert_eq!(session.state().await, SessionState::Locked);
        assert_eq!(session.export_blob().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_persisted_blob_holds_no_plaintext() {
        let (session, _) = unlocked_session().await;
        session.add_entry(github()).await.unwrap();

        let json = session.export_blob().await.unwrap().unwrap().to_json().unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("GitHub"));
        assert!(!json.contains(PASSWORD));
    }

    #[tokio::test]
    async fn test_search_and_categories() {
        let (session, _) = unlocked_session().await;
        session.add_entry(github()).await.unwrap();
        session
            .add_entry(EntryDraft {
                title: Some("Bank".to_string()),
                category: Some("Finance".to_string()),
                ..EntryDraft::default()
            })
            .await
            .unwrap();

        assert_eq!(session.search("octo").await.unwrap().len(), 1);
        assert_eq!(session.search("").await.unwrap().len(), 2);
        assert!(session.search("nothing").await.unwrap().is_empty());
        assert_eq!(
            session.categories().await.unwrap(),
            vec!["Finance".to_string(), "General".to_string()]
        );
    }

    #[tokio::test]
    async fn test_import_same_password_activates() {
        let (session, _) = unlocked_session().await;
        let payload = serde_json::to_vec(&vec![CredentialEntry::create(github())]).unwrap();
        let blob = encrypt_with_params(&payload, PASSWORD.as_bytes(), &fast()).unwrap();

        let outcome = session.import_blob(blob.clone()).await.unwrap();

        assert_eq!(outcome, ImportOutcome::Activated { entries: 1 });
        assert_eq!(session.current_entries().await.unwrap()[0].title, "GitHub");
        assert_eq!(session.export_blob().await.unwrap(), Some(blob));
    }

    #[tokio::test]
    async fn test_import_while_locked_stores() {
        let (session, _) = unlocked_session().await;
        session.lock().await;
        let blob = encrypt_with_params(b"[]", b"someoneelse", &fast()).unwrap();

        let outcome = session.import_blob(blob.clone()).await.unwrap();

        assert_eq!(outcome, ImportOutcome::Stored);
        assert_eq!(session.state().await, SessionState::Locked);
        assert_eq!(session.export_blob().await.unwrap(), Some(blob));
    }

    #[tokio::test]
    async fn test_change_password() {
        let (session, _) = unlocked_session().await;
        session.add_entry(github()).await.unwrap();

        assert!(matches!(
            session
                .change_password("wrongpass".into(), "newpassword".into())
                .await,
            Err(Error::InvalidPassword)
        ));
        assert!(matches!(
            session.change_password(PASSWORD.into(), "short".into()).await,
            Err(Error::WeakPassword { .. })
        ));

        session
            .change_password(PASSWORD.into(), "newpassword".into())
            .await
            .unwrap();
        session.lock().await;

        assert!(matches!(
            session.unlock(PASSWORD.into()).await,
            Err(Error::InvalidPassword)
        ));
        session.unlock("newpassword".into()).await.unwrap();
        assert_eq!(session.current_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let (session, provider) = unlocked_session().await;
        session
            .update_settings(VaultSettings {
                auto_lock_minutes: 9,
                clipboard_clear_seconds: 20,
            })
            .await
            .unwrap();

        session.reset().await.unwrap();

        assert_eq!(session.state().await, SessionState::Uninitialized);
        assert!(provider.is_empty());
        assert_eq!(session.settings().await, VaultSettings::default());
        session.setup("anotherpass".into()).await.unwrap();
    }

    #[tokio::test]
    async fn test_settings_persist_without_unlock() {
        let (session, provider) = new_session().await;
        let settings = VaultSettings {
            auto_lock_minutes: 5,
            clipboard_clear_seconds: 30,
        };

        session.update_settings(settings).await.unwrap();
        assert_eq!(session.settings().await, settings);

        let store = VaultStore::new(Arc::new(provider)).unwrap();
        let reopened = VaultSession::open_with_params(store, fast()).await.unwrap();
        assert_eq!(reopened.settings().await, settings);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let (session, _) = new_session().await;
        let result = session
            .update_settings(VaultSettings {
                auto_lock_minutes: 0,
                clipboard_clear_seconds: 10,
            })
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(session.settings().await, VaultSettings::default());
    }

    #[tokio::test]
    async fn test_lock_waits_for_inflight_mutation() {
        let (session, _) = unlocked_session().await;
        let session = Arc::new(session);

        let writer = {
            let session = session.clone();
            tokio::spawn(async move { session.add_entry(github()).await })
        };
        tokio::task::yield_now().await;
        session.lock().await;

        // Whichever ran first, the add either completed and persisted or
        // was refused because the vault was already locked.
        match writer.await.unwrap() {
            Ok(_) => {
                session.unlock(PASSWORD.into()).await.unwrap();
                assert_eq!(session.current_entries().await.unwrap().len(), 1);
            }
            Err(e) => assert!(matches!(e, Error::Locked)),
        }
    }
}
