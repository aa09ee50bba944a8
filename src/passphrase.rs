//! Passphrase input and the policy applied to new passphrases.

use std::fmt;
use std::io::{self, IsTerminal, Read, Write};

use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// Minimum length of a new passphrase, in characters.
pub const MIN_LEN: usize = 8;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as raw bytes.
    ///
    /// Returns the passphrase wrapped in `Zeroizing` so it is wiped from
    /// memory when dropped. Use [`as_str`] to get text out of it.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Reads a passphrase from any `io::Read` source, up to the first newline.
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading passphrase: {}", e),
                e,
            )
        })?;
        let line_end = data
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(data.len());
        let line = &data[..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Ok(Zeroizing::new(line.to_vec()))
    }
}

/// Reads passphrase from terminal with no echo
pub struct TerminalPassphraseReader {
    prompt: String,
}

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self::with_prompt("Passphrase (lifevault): ")
    }

    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read passphrase from terminal - stdin is not a terminal (use --passphrase-stdin)",
            ));
        }

        let mut stderr = io::stderr();
        stderr
            .write_all(self.prompt.as_bytes())
            .and_then(|()| stderr.flush())
            .map_err(|e| {
                VaultError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // rpassword hands back a plain String; move it into a zeroizing buffer.
        let passphrase = Zeroizing::new(rpassword::read_password().map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading passphrase: {}", e),
                e,
            )
        })?);

        Ok(Zeroizing::new(passphrase.as_bytes().to_vec()))
    }
}

/// Views raw passphrase bytes as text. Passphrases must be UTF-8.
pub fn as_str(passphrase: &[u8]) -> Result<&str> {
    std::str::from_utf8(passphrase).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "passphrase is not valid UTF-8",
            e,
        )
    })
}

/// Checks a new passphrase against the policy: at least [`MIN_LEN`]
/// characters with an uppercase letter, a lowercase letter and a digit.
pub fn validate_new_passphrase(passphrase: &str) -> Result<()> {
    let problem = if passphrase.chars().count() < MIN_LEN {
        Some(format!("passphrase must be at least {} characters long", MIN_LEN))
    } else if !passphrase.chars().any(|c| c.is_ascii_uppercase()) {
        Some("passphrase must contain at least one uppercase letter".to_string())
    } else if !passphrase.chars().any(|c| c.is_ascii_lowercase()) {
        Some("passphrase must contain at least one lowercase letter".to_string())
    } else if !passphrase.chars().any(|c| c.is_ascii_digit()) {
        Some("passphrase must contain at least one number".to_string())
    } else {
        None
    };

    match problem {
        Some(msg) => Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::WeakPassphrase,
            msg,
        )),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strength::Weak => "weak",
            Strength::Medium => "medium",
            Strength::Strong => "strong",
        })
    }
}

/// Rough strength rating, one point per satisfied criterion.
pub fn strength(passphrase: &str) -> Strength {
    let len = passphrase.chars().count();
    let score = [
        len >= MIN_LEN,
        len >= 12,
        passphrase.chars().any(|c| c.is_ascii_uppercase()),
        passphrase.chars().any(|c| c.is_ascii_lowercase()),
        passphrase.chars().any(|c| c.is_ascii_digit()),
        passphrase.chars().any(|c| !c.is_ascii_alphanumeric()),
    ]
    .iter()
    .filter(|&&met| met)
    .count();

    match score {
        0..=2 => Strength::Weak,
        3..=4 => Strength::Medium,
        _ => Strength::Strong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests the terminal reader. This is ignored by default and must be run
    /// explicitly and with human input:
    ///
    /// cargo test test_terminal_reader_interactive -- --ignored --nocapture
    #[test]
    #[ignore]
    fn test_terminal_reader_interactive() {
        let mut reader = TerminalPassphraseReader::new();
        let passphrase = reader.read_passphrase().unwrap();
        assert!(!passphrase.is_empty(), "Expected non-empty passphrase");
    }

    #[test]
    fn test_reader_stops_at_newline() {
        let data = b"Str0ngPass!\nsecond line";
        let mut reader = ReaderPassphraseReader::new(Box::new(&data[..]));
        assert_eq!(&*reader.read_passphrase().unwrap(), b"Str0ngPass!");

        let data = b"Str0ngPass!\r\n";
        let mut reader = ReaderPassphraseReader::new(Box::new(&data[..]));
        assert_eq!(&*reader.read_passphrase().unwrap(), b"Str0ngPass!");
    }

    #[test]
    fn test_reader_without_newline() {
        let data = b"mypassword";
        let mut reader = ReaderPassphraseReader::new(Box::new(&data[..]));
        assert_eq!(&*reader.read_passphrase().unwrap(), b"mypassword");

        let mut reader = ReaderPassphraseReader::new(Box::new(&b""[..]));
        assert_eq!(&*reader.read_passphrase().unwrap(), b"");
    }

    #[test]
    fn test_as_str() {
        assert_eq!(as_str(b"hello").unwrap(), "hello");
        let err = as_str(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PassphraseUnavailable));
    }

    #[test]
    fn test_validate_new_passphrase() {
        assert!(validate_new_passphrase("Str0ngPass!").is_ok());
        assert!(validate_new_passphrase("Abcdefg1").is_ok());

        for weak in ["Abc1", "abcdefg1", "ABCDEFG1", "Abcdefgh", ""] {
            let err = validate_new_passphrase(weak).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::WeakPassphrase), "{:?}", weak);
            assert_eq!(err.category, ErrorCategory::User);
        }
    }

    #[test]
    fn test_strength() {
        assert_eq!(strength(""), Strength::Weak);
        assert_eq!(strength("abc"), Strength::Weak);
        assert_eq!(strength("Abcdefg1"), Strength::Medium);
        assert_eq!(strength("Str0ngPass!"), Strength::Strong);
        assert_eq!(strength("Correct-Horse-7"), Strength::Strong);
        assert!(Strength::Weak < Strength::Strong);
    }
}
