//! User settings.
//!
//! Settings are plain configuration and are stored unencrypted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use keyvault_common::{Error, Result};

/// Auto-lock and clipboard timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultSettings {
    /// Minutes of inactivity before an unlocked vault locks itself.
    #[serde(alias = "autoLockTimer")]
    pub auto_lock_minutes: u32,
    /// Seconds a copied secret stays on the clipboard.
    #[serde(alias = "clipboardClearDelay")]
    pub clipboard_clear_seconds: u32,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            auto_lock_minutes: 3,
            clipboard_clear_seconds: 10,
        }
    }
}

impl VaultSettings {
    /// Check that both timers are at least one unit long.
    pub fn validate(&self) -> Result<()> {
        if self.auto_lock_minutes == 0 {
            return Err(Error::InvalidInput(
                "Auto-lock must be at least 1 minute".to_string(),
            ));
        }
        if self.clipboard_clear_seconds == 0 {
            return Err(Error::InvalidInput(
                "Clipboard clear delay must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    /// Idle time after which the vault locks.
    pub fn auto_lock_after(&self) -> Duration {
        Duration::from_secs(u64::from(self.auto_lock_minutes) * 60)
    }

    /// Delay before a copied secret is wiped.
    pub fn clipboard_clear_after(&self) -> Duration {
        Duration::from_secs(u64::from(self.clipboard_clear_seconds))
    }

    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let settings: Self = serde_json::from_slice(bytes)?;
        settings.validate()?;
        Ok(settings)
    }
}
