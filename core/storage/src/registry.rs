//! Provider resolution by name.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::local::LocalProvider;
use crate::memory::MemoryProvider;
use crate::provider::StorageProvider;
use keyvault_common::{Error, Result};

/// Built-in provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Records live in process memory only.
    Memory,
    /// Records are files in a local directory.
    Local,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(Self::Memory),
            "local" => Ok(Self::Local),
            other => Err(Error::InvalidInput(format!(
                "Unknown storage provider: {}",
                other
            ))),
        }
    }
}

/// Create a provider of the given kind.
///
/// `root` is the directory for `Local` and ignored for `Memory`.
pub fn create_provider(kind: ProviderKind, root: &Path) -> Result<Arc<dyn StorageProvider>> {
    match kind {
        ProviderKind::Memory => Ok(Arc::new(MemoryProvider::new())),
        ProviderKind::Local => Ok(Arc::new(LocalProvider::new(root)?)),
    }
}
