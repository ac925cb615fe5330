//! Common types used throughout KeyVault.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum number of characters accepted for a master password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Master password held in memory while a session is unlocked.
///
/// The buffer is zeroized when the value is dropped, so locking a session
/// only has to drop its copy. Clones are independent buffers that are
/// zeroized the same way.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterPassword(String);

impl MasterPassword {
    /// Wrap a password string.
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Get the password text.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Get the password bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this password is long enough to protect a vault.
    pub fn meets_minimum(&self) -> bool {
        self.char_len() >= MIN_PASSWORD_LENGTH
    }
}

impl From<String> for MasterPassword {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MasterPassword {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for MasterPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterPassword([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_minimum_length_counts_chars() {
        assert!(!MasterPassword::from("short12").meets_minimum());
        assert!(MasterPassword::from("longenough1").meets_minimum());
        // Eight multi-byte characters
        assert!(MasterPassword::from("éééééééé").meets_minimum());
    }

    #[test]
    fn test_zeroize_clears_buffer() {
        let mut password = MasterPassword::from("hunter2hunter2");
        password.zeroize();
        assert!(password.is_empty());
    }

    proptest! {
        #[test]
        fn debug_never_reveals_password(secret in "[a-z0-9]{8,32}") {
            let password = MasterPassword::new(secret.clone());
            let rendered = format!("{:?}", password);
            prop_assert!(!rendered.contains(&secret));
        }
    }
}
