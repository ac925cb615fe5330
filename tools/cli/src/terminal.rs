//! Terminal clipboard using the OSC 52 escape sequence.
//!
//! Terminals that support OSC 52 (and tmux with `set-clipboard on`) copy the
//! payload to the system clipboard, including over SSH.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::io::Write;
use std::sync::Mutex;
use zeroize::Zeroizing;

use keyvault_common::{Error, Result};
use keyvault_vault::Clipboard;

/// Build the OSC 52 sequence that sets the clipboard to `text`.
///
/// An empty payload asks the terminal to clear the clipboard.
pub fn osc52_sequence(text: &str) -> Zeroizing<String> {
    Zeroizing::new(format!("\x1b]52;c;{}\x07", BASE64.encode(text.as_bytes())))
}

/// Writes OSC 52 sequences to a terminal.
pub struct Osc52Clipboard<W: Write + Send> {
    out: Mutex<W>,
}

impl Osc52Clipboard<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn emit(&self, sequence: &str) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| Error::Clipboard("Terminal lock poisoned".to_string()))?;
        out.write_all(sequence.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| Error::Clipboard(e.to_string()))
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Clipboard for Osc52Clipboard<W> {
    fn set_text(&self, text: &str) -> Result<()> {
        self.emit(&osc52_sequence(text))
    }

    fn clear(&self) -> Result<()> {
        self.emit(&osc52_sequence(""))
    }
}
