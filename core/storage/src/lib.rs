//! Storage provider abstraction for KeyVault.
//!
//! Providers are flat key-value stores of opaque bytes. They know nothing
//! about encryption; the vault layer decides what each record contains.
//!
//! # Design Principles
//! - Provider isolation: No provider-specific logic in vault or crypto modules
//! - Async operations: All I/O operations are async
//! - Absence is a value: reading a missing record is `Ok(None)`, not an error

pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{RecordKey, StorageProvider};
pub use registry::{create_provider, ProviderKind};
