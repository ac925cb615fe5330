//! Local password generator.

use rand::seq::SliceRandom;
use rand::Rng;
use zeroize::Zeroizing;

use keyvault_common::{Error, Result};

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMBERS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Shortest password the generator produces.
pub const MIN_GENERATED_LENGTH: usize = 8;

/// Longest password the generator produces.
pub const MAX_GENERATED_LENGTH: usize = 64;

/// Character classes and length for a generated password.
///
/// Lowercase letters are always included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub length: usize,
    pub uppercase: bool,
    pub numbers: bool,
    pub symbols: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            length: 16,
            uppercase: true,
            numbers: true,
            symbols: true,
        }
    }
}

impl GeneratorOptions {
    fn classes(&self) -> Vec<&'static [u8]> {
        let mut classes = vec![LOWERCASE];
        if self.uppercase {
            classes.push(UPPERCASE);
        }
        if self.numbers {
            classes.push(NUMBERS);
        }
        if self.symbols {
            classes.push(SYMBOLS);
        }
        classes
    }
}

/// Rough strength rating shown next to a generated password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Weak,
    Strong,
    Maximum,
}

impl Strength {
    /// Rate a password by length.
    pub fn for_length(length: usize) -> Self {
        if length < 12 {
            Strength::Weak
        } else if length < 20 {
            Strength::Strong
        } else {
            Strength::Maximum
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weak => write!(f, "Weak"),
            Self::Strong => write!(f, "Strong"),
            Self::Maximum => write!(f, "Maximum"),
        }
    }
}

/// Generate a random password.
///
/// Each enabled class contributes at least one character; the remaining
/// positions are drawn uniformly from the union of all enabled classes.
///
/// # Errors
/// - Returns error if `length` is outside 8..=64
pub fn generate_password(options: &GeneratorOptions) -> Result<Zeroizing<String>> {
    if !(MIN_GENERATED_LENGTH..=MAX_GENERATED_LENGTH).contains(&options.length) {
        return Err(Error::InvalidInput(format!(
            "Password length must be between {} and {}",
            MIN_GENERATED_LENGTH, MAX_GENERATED_LENGTH
        )));
    }

    let classes = options.classes();
    let charset: Vec<u8> = classes.concat();
    let mut rng = rand::thread_rng();

    let mut chars: Zeroizing<Vec<u8>> = Zeroizing::new(Vec::with_capacity(options.length));
    for class in &classes {
        chars.push(class[rng.gen_range(0..class.len())]);
    }
    while chars.len() < options.length {
        chars.push(charset[rng.gen_range(0..charset.len())]);
    }
    chars.shuffle(&mut rng);

    // All charset bytes are ASCII.
    let password: String = chars.iter().map(|&b| b as char).collect();
    Ok(Zeroizing::new(password))
}
