//! Versioned armoring for ciphertext
//!
//! Ciphertext is persisted as text inside JSON documents, so the binary
//! sealed box is wrapped as `lifevault1:{base64url-no-padding}`. The armored
//! form contains no whitespace, quotes or backslashes and therefore embeds in
//! JSON strings verbatim.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Magic prefix for all lifevault ciphertext versions
const MAGIC_PREFIX: &str = "lifevault";

/// Version 1 magic marker
const V1_MAGIC: &str = "lifevault1:";

/// Wrap bytes in armor, returning the armored string
pub fn wrap(body: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(body);
    format!("{}{}", V1_MAGIC, encoded)
}

/// Unwrap an armored string, returning the original bytes
pub fn unwrap(armored: &str) -> Result<Vec<u8>> {
    if let Some(encoded) = armored.strip_prefix(V1_MAGIC) {
        URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::ArmoringDecode,
                format!("base64 decoding failed: {}", e),
                e,
            )
        })
    } else if armored.starts_with(MAGIC_PREFIX) && armored.len() > V1_MAGIC.len() {
        Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringFromFuture,
            "ciphertext claims to be lifevault data, but not a version we support",
        ))
    } else {
        Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "ciphertext unrecognized as lifevault data",
        ))
    }
}
