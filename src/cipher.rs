//! Symmetric encryption of text payloads using XSalsa20Poly1305
//!
//! Every call to [`encrypt`] draws a fresh random nonce, so encrypting the
//! same plaintext twice under the same key yields different ciphertext.
//! [`decrypt`] authenticates the payload before returning anything and
//! refuses plaintext that is not valid UTF-8, so a wrong key or tampered
//! input is always reported as an error rather than as garbage text.
//!
//! The binary format, before armoring (see [`crate::varmor`]), is:
//! - nonce: 24 bytes
//! - length: 8 bytes (big-endian signed int64)
//! - sealed box: variable length (includes 16-byte Poly1305 MAC)

use std::fmt;
use std::mem::size_of;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use rand::TryRngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::varmor;

/// Length of a symmetric key in bytes
pub const KEY_LEN: usize = 32;

/// Length of nonce in bytes
const NONCE_LEN: usize = 24;

/// A 32-byte symmetric key, wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Generates a fresh key from the operating system RNG.
    pub fn generate() -> Result<Self> {
        let mut key = Self::from_bytes([0u8; KEY_LEN]);
        fill_random(&mut key.0[..])?;
        Ok(key)
    }

    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Text form of the key, used as the plaintext when wrapping it.
    pub fn to_text(&self) -> Zeroizing<String> {
        Zeroizing::new(URL_SAFE_NO_PAD.encode(&self.0[..]))
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let decoded = Zeroizing::new(URL_SAFE_NO_PAD.decode(text).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::BinaryFormat,
                "key text is not valid base64",
                e,
            )
        })?);
        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::BinaryFormat,
                format!("key must be {} bytes, got {}", KEY_LEN, decoded.len()),
            )
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Fill `buf` from the operating system RNG.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::RandomSource,
            "operating system RNG failed",
            e,
        )
    })
}

/// Encrypt text under `key` with a random nonce, returning armored ciphertext.
pub fn encrypt(plaintext: &str, key: &SecretKey) -> Result<String> {
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;

    let sealed = seal(plaintext.as_bytes(), key, &nonce)?;
    Ok(varmor::wrap(&sealed))
}

/// Decrypt armored ciphertext produced by [`encrypt`].
pub fn decrypt(ciphertext: &str, key: &SecretKey) -> Result<String> {
    let body = varmor::unwrap(ciphertext)?;
    let plaintext = open(&body, key)?;

    String::from_utf8(plaintext).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::BinaryFormat,
            "decrypted payload is not valid UTF-8 text",
            e,
        )
    })
}

/// Seal bytes with an explicit nonce into the binary format.
///
/// Callers outside of tests must go through [`encrypt`], which never reuses a nonce.
fn seal(plaintext: &[u8], key: &SecretKey, nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
    let cipher = new_cipher(key)?;
    let sealed_box = cipher
        .encrypt(&Nonce::from(*nonce), plaintext)
        .map_err(|e| {
            VaultError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::SecretboxFailure,
                format!("encryption failed: {}", e),
            )
        })?;

    let sealed_box_len = sealed_box.len() as i64;
    let mut output = Vec::with_capacity(NONCE_LEN + size_of::<i64>() + sealed_box.len());
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed_box_len.to_be_bytes());
    output.extend_from_slice(&sealed_box);

    Ok(output)
}

fn open(body: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
    let mut pos = 0;

    if body.len() < pos + NONCE_LEN {
        return Err(format_error(
            ErrorKind::TruncatedInput,
            "input likely truncated while reading nonce",
        ));
    }
    let nonce: [u8; NONCE_LEN] = body[pos..pos + NONCE_LEN]
        .try_into()
        .map_err(|_| format_error(ErrorKind::BinaryFormat, "failed to read nonce"))?;
    pos += NONCE_LEN;

    if body.len() < pos + size_of::<i64>() {
        return Err(format_error(
            ErrorKind::TruncatedInput,
            "input likely truncated while reading sealed box length",
        ));
    }
    let length_bytes: [u8; 8] = body[pos..pos + size_of::<i64>()]
        .try_into()
        .map_err(|_| format_error(ErrorKind::BinaryFormat, "failed to read length"))?;
    let sealed_box_len = i64::from_be_bytes(length_bytes);
    pos += size_of::<i64>();

    if sealed_box_len < 0 {
        return Err(format_error(
            ErrorKind::BinaryFormat,
            "negative sealed box length (when interpreted as a big-endian i64)",
        ));
    }

    // Valid input can fail this check on platforms with a small isize.
    if sealed_box_len > isize::MAX as i64 {
        return Err(format_error(
            ErrorKind::BinaryFormat,
            "sealed box length exceeds this system's max isize",
        ));
    }
    let sealed_box_len = sealed_box_len as usize;

    if body.len() - pos < sealed_box_len {
        return Err(format_error(
            ErrorKind::TruncatedInput,
            "truncated or corrupt input; claimed length greater than available input",
        ));
    }
    let sealed_box = &body[pos..pos + sealed_box_len];
    pos += sealed_box_len;

    if pos < body.len() {
        return Err(format_error(
            ErrorKind::TrailingData,
            "invalid input: unexpected data after sealed box",
        ));
    }

    let cipher = new_cipher(key)?;
    cipher
        .decrypt(&Nonce::from(nonce), sealed_box)
        .map_err(|_| {
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt input, tampered-with data, or wrong key",
            )
        })
}

fn new_cipher(key: &SecretKey) -> Result<XSalsa20Poly1305> {
    XSalsa20Poly1305::new_from_slice(key.expose()).map_err(|e| {
        VaultError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::SecretboxFailure,
            format!("invalid key: {}", e),
        )
    })
}

fn format_error(kind: ErrorKind, msg: &str) -> VaultError {
    VaultError::with_kind(ErrorCategory::User, kind, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SecretKey {
        SecretKey::from_bytes([byte; KEY_LEN])
    }

    fn body_of(ciphertext: &str) -> Vec<u8> {
        varmor::unwrap(ciphertext).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        for plaintext in ["", "hello", "{\"name\":\"Alice\"}", "naïve café ✓"] {
            let ciphertext = encrypt(plaintext, &key(7)).unwrap();
            assert_eq!(decrypt(&ciphertext, &key(7)).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_large_plaintext() {
        let plaintext = "x".repeat(128 * 1024);
        let ciphertext = encrypt(&plaintext, &key(1)).unwrap();
        assert_eq!(decrypt(&ciphertext, &key(1)).unwrap(), plaintext);
    }

    #[test]
    fn test_encryption_is_not_deterministic() {
        let ct1 = encrypt("same text", &key(3)).unwrap();
        let ct2 = encrypt("same text", &key(3)).unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_fixed_nonce_is_deterministic() {
        let nonce = [0x24u8; NONCE_LEN];
        let ct1 = seal(b"payload", &key(0x42), &nonce).unwrap();
        let ct2 = seal(b"payload", &key(0x42), &nonce).unwrap();
        assert_eq!(ct1, ct2);
        assert_eq!(&ct1[..NONCE_LEN], &nonce);
        // 7 bytes of payload plus the 16-byte MAC
        assert_eq!(&ct1[NONCE_LEN..NONCE_LEN + 8], &23i64.to_be_bytes());
    }

    #[test]
    fn test_wrong_key() {
        let ciphertext = encrypt("secret data", &key(1)).unwrap();
        let err = decrypt(&ciphertext, &key(2)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert!(err.is_decryption_failure());
    }

    #[test]
    fn test_tampered_byte() {
        let ciphertext = encrypt("secret data", &key(1)).unwrap();
        let mut body = body_of(&ciphertext);
        let last = body.len() - 1;
        body[last] ^= 0x01;

        let err = decrypt(&varmor::wrap(&body), &key(1)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_truncated_nonce() {
        let err = decrypt(&varmor::wrap(&[0u8; 3]), &key(1)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.to_string().contains("reading nonce"));
    }

    #[test]
    fn test_truncated_length() {
        let err = decrypt(&varmor::wrap(&[0u8; NONCE_LEN + 3]), &key(1)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
    }

    #[test]
    fn test_negative_length() {
        let mut body = vec![0u8; NONCE_LEN + 8];
        body[NONCE_LEN..].copy_from_slice(&(-1i64).to_be_bytes());

        let err = decrypt(&varmor::wrap(&body), &key(1)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
        assert!(err.to_string().contains("negative sealed box length"));
    }

    #[test]
    fn test_length_exceeds_available() {
        let mut body = body_of(&encrypt("hello", &key(1)).unwrap());
        body[NONCE_LEN..NONCE_LEN + 8].copy_from_slice(&1_000_000i64.to_be_bytes());

        let err = decrypt(&varmor::wrap(&body), &key(1)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
    }

    #[test]
    fn test_trailing_data() {
        let mut body = body_of(&encrypt("hello", &key(1)).unwrap());
        body.push(0xFF);

        let err = decrypt(&varmor::wrap(&body), &key(1)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TrailingData));
    }

    #[test]
    fn test_non_utf8_plaintext_rejected() {
        let body = seal(&[0xff, 0xfe, 0x00], &key(5), &[9u8; NONCE_LEN]).unwrap();
        let err = decrypt(&varmor::wrap(&body), &key(5)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_key_text_roundtrip() {
        let generated = SecretKey::generate().unwrap();
        let restored = SecretKey::from_text(&generated.to_text()).unwrap();
        assert_eq!(generated, restored);
        assert_ne!(generated, SecretKey::generate().unwrap());
    }

    #[test]
    fn test_key_text_wrong_length() {
        let err = SecretKey::from_text("AAAA").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_debug_is_redacted() {
        assert_eq!(format!("{:?}", key(1)), "SecretKey(<redacted>)");
    }
}
