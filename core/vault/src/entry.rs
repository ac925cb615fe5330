//! Credential entries.
//!
//! The decrypted vault is a JSON array of entries. Field names follow the
//! stored format (`password`, `website`, camelCase timestamps in epoch
//! milliseconds), so vaults exported by earlier versions open unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroize;

/// Title used when an entry is saved without one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Category used when an entry is saved without one.
pub const DEFAULT_CATEGORY: &str = "General";

/// One stored credential.
///
/// `id` and `created_at` are fixed when the entry is created. The secret
/// and notes are zeroized when the entry is dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEntry {
    id: String,
    pub title: String,
    #[serde(default)]
    pub username: String,
    #[serde(rename = "password", default)]
    pub secret: String,
    #[serde(rename = "website", default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    updated_at: DateTime<Utc>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// User-supplied fields for creating or editing an entry.
///
/// `None` means "not provided": defaults apply on create, and the current
/// value is kept on edit.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EntryDraft {
    pub title: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
}

impl EntryDraft {
    /// Start a draft with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

impl fmt::Debug for EntryDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryDraft")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("url", &self.url)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

impl CredentialEntry {
    /// Create a new entry with a fresh id and timestamps.
    pub fn create(draft: EntryDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: or_default(draft.title, DEFAULT_TITLE),
            username: draft.username.unwrap_or_default(),
            secret: draft.secret.unwrap_or_default(),
            url: draft.url.unwrap_or_default(),
            notes: draft.notes.unwrap_or_default(),
            category: or_default(draft.category, DEFAULT_CATEGORY),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an edit and refresh `updated_at`.
    pub fn apply(&mut self, draft: EntryDraft) {
        if let Some(title) = draft.title {
            self.title = or_default(Some(title), DEFAULT_TITLE);
        }
        if let Some(username) = draft.username {
            self.username = username;
        }
        if let Some(secret) = draft.secret {
            self.secret.zeroize();
            self.secret = secret;
        }
        if let Some(url) = draft.url {
            self.url = url;
        }
        if let Some(notes) = draft.notes {
            self.notes.zeroize();
            self.notes = notes;
        }
        if let Some(category) = draft.category {
            self.category = or_default(Some(category), DEFAULT_CATEGORY);
        }
        // Clock steps backwards must not move updated_at before created_at.
        self.updated_at = Utc::now().max(self.created_at);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Case-insensitive match of `query` against title, url and username.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query)
            || self.url.to_lowercase().contains(&query)
            || self.username.to_lowercase().contains(&query)
    }
}

impl Drop for CredentialEntry {
    fn drop(&mut self) {
        self.secret.zeroize();
        self.notes.zeroize();
    }
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("url", &self.url)
            .field("category", &self.category)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}
