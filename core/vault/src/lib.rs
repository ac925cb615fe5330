//! Vault engine for KeyVault.
//!
//! This module provides:
//! - The session state machine (setup, unlock, lock, entry mutations)
//! - Credential entries and user settings
//! - A typed record store over storage providers
//! - Inactivity auto-lock and timed clipboard clearing
//!
//! # Architecture
//! The session sits between the front end and the store. Everything it hands
//! to the store is already encrypted; passwords and derived keys never leave
//! the session.

pub mod activity;
pub mod clipboard;
pub mod entry;
pub mod session;
pub mod settings;
pub mod store;

pub use activity::{ActivityMonitor, MonitorHandle, DEFAULT_TICK};
pub use clipboard::{ClearHandle, Clipboard, ClipboardGuard, MemoryClipboard};
pub use entry::{CredentialEntry, EntryDraft, DEFAULT_CATEGORY, DEFAULT_TITLE};
pub use session::{ImportOutcome, SessionState, VaultSession};
pub use settings::VaultSettings;
pub use store::VaultStore;
