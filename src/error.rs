use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,

    /// Data at rest failed an integrity check. Retrying will not help; the
    /// user has to restore from a backup.
    Integrity,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The passphrase did not unlock the vault.
    WrongPassphrase,
    /// A persisted record could not be decrypted or decoded even though the
    /// vault was unlocked.
    CorruptedCiphertext,
    /// A record operation was attempted while no record is in memory.
    NoDataLoaded,
    /// The durable store rejected an operation.
    StorageFailure,
    /// No wrapped key exists yet; setup is required.
    NotSetup,
    /// Setup was requested but a wrapped key already exists.
    AlreadySetup,
    /// The session is in a state where the operation makes no sense.
    InvalidState,
    /// A record holds a value that cannot be stored, such as a non-finite amount.
    InvalidRecord,
    /// A new passphrase did not satisfy the passphrase policy.
    WeakPassphrase,
    /// scrypt parameters were rejected or derivation failed.
    KeyDerivation,
    /// The armored representation is malformed (prefix, encoding, or unsupported version).
    ArmoringInvalid,
    /// Base64 decoding of the armored payload failed.
    ArmoringDecode,
    /// Input claimed to be lifevault ciphertext but used a future/unsupported version.
    ArmoringFromFuture,
    /// Length fields or binary layout are invalid, or plaintext is not UTF-8.
    BinaryFormat,
    /// Input data ended before the expected component could be read.
    TruncatedInput,
    /// Additional bytes were present after the sealed payload.
    TrailingData,
    /// Authentication failed due to a wrong key, tampering or corruption.
    AuthenticationFailed,
    /// NaCl secretbox (XSalsa20Poly1305) failed to seal data.
    SecretboxFailure,
    /// The operating system RNG failed.
    RandomSource,
    /// JSON encoding or decoding failed.
    Serialization,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct VaultError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl VaultError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for a failed durable-store operation.
    pub fn storage(msg: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::StorageFailure,
            msg,
            source,
        )
    }

    /// Shorthand for a record operation attempted without an unlocked session.
    pub fn no_data_loaded() -> Self {
        Self::with_kind(
            ErrorCategory::User,
            ErrorKind::NoDataLoaded,
            "no data loaded; unlock the vault first",
        )
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// True if the error came out of ciphertext parsing or authentication,
    /// i.e. the payload could not be decrypted with the given key.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self.kind,
            Some(
                ErrorKind::ArmoringInvalid
                    | ErrorKind::ArmoringDecode
                    | ErrorKind::ArmoringFromFuture
                    | ErrorKind::BinaryFormat
                    | ErrorKind::TruncatedInput
                    | ErrorKind::TrailingData
                    | ErrorKind::AuthenticationFailed
            )
        )
    }

    /// Text suitable for showing to the end user, with guidance on what to do next.
    pub fn user_message(&self) -> String {
        match self.kind {
            Some(ErrorKind::WrongPassphrase) => "Incorrect passphrase. Please try again.".into(),
            Some(ErrorKind::CorruptedCiphertext) => format!(
                "Stored data is corrupted and cannot be read ({}). Restore from a backup export.",
                self.msg
            ),
            Some(ErrorKind::StorageFailure) | Some(ErrorKind::Io) => {
                format!("Storage operation failed ({}). Please try again.", self.msg)
            }
            _ => self.msg.clone(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VaultError>;
