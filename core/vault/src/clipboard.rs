//! Timed clipboard clearing for copied secrets.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::settings::VaultSettings;
use keyvault_common::{Error, Result};

/// Access to a clipboard.
pub trait Clipboard: Send + Sync {
    /// Replace the clipboard contents with `text`.
    fn set_text(&self, text: &str) -> Result<()>;

    /// Empty the clipboard.
    fn clear(&self) -> Result<()>;
}

/// In-process clipboard.
#[derive(Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<Zeroizing<String>>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents, if any.
    pub fn contents(&self) -> Result<Option<String>> {
        let guard = self
            .contents
            .lock()
            .map_err(|_| Error::Clipboard("Lock poisoned".to_string()))?;
        Ok(guard.as_ref().map(|text| text.to_string()))
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| Error::Clipboard("Lock poisoned".to_string()))?;
        *guard = Some(Zeroizing::new(text.to_string()));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| Error::Clipboard("Lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Copies secrets to a clipboard and clears them after a delay.
#[derive(Clone)]
pub struct ClipboardGuard {
    clipboard: Arc<dyn Clipboard>,
}

impl ClipboardGuard {
    pub fn new(clipboard: Arc<dyn Clipboard>) -> Self {
        Self { clipboard }
    }

    /// Copy `secret` and schedule a clear after `delay`.
    ///
    /// The clear runs whatever the clipboard holds by then; it does not
    /// check whether the secret is still there.
    ///
    /// # Errors
    /// - `Clipboard` if the initial write fails; no clear is scheduled
    pub fn copy_with_expiry(&self, secret: &str, delay: Duration) -> Result<ClearHandle> {
        self.clipboard.set_text(secret)?;
        debug!("Copied to clipboard, clearing in {:?}", delay);

        let clipboard = self.clipboard.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match clipboard.clear() {
                Ok(()) => {
                    debug!("Clipboard cleared");
                    Ok(())
                }
                Err(e) => {
                    warn!("Failed to clear clipboard: {}", e);
                    Err(e)
                }
            }
        });

        Ok(ClearHandle { task })
    }

    /// Copy `secret` and clear it after the configured clipboard delay.
    pub fn copy_with_settings(
        &self,
        secret: &str,
        settings: &VaultSettings,
    ) -> Result<ClearHandle> {
        self.copy_with_expiry(secret, settings.clipboard_clear_after())
    }
}

/// Pending clipboard clear.
///
/// Dropping the handle leaves the clear scheduled.
pub struct ClearHandle {
    task: JoinHandle<Result<()>>,
}

impl ClearHandle {
    /// Cancel the clear. The clipboard keeps its contents.
    pub fn cancel(self) {
        self.task.abort();
    }

    /// Whether the clear has already run.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the clear to run.
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::Clipboard(format!("Clear task failed: {}", e)))?
    }
}
