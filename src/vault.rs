//! Lifecycle of the data encryption key (DEK).
//!
//! The DEK is random and never leaves memory in the clear. At rest it exists
//! only as a [`WrappedKeyRecord`]: the DEK encrypted under a credential
//! derived from the user's passphrase, together with the salt and scrypt cost
//! needed to derive that credential again.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cipher::{self, SecretKey};
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::kdf::{KeyDerivation, SALT_LEN, ScryptCost};
use crate::store::KeyValueStore;

/// Fixed store id of the wrapped key record.
pub const WRAPPED_KEY_ID: &str = "encryption_key";

const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KdfRecord {
    #[serde(flatten)]
    cost: ScryptCost,
    salt: String,
}

/// The persisted, encrypted form of the DEK.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKeyRecord {
    version: u32,
    kdf: KdfRecord,
    wrapped_key: String,
}

impl WrappedKeyRecord {
    fn key_derivation(&self) -> Result<KeyDerivation> {
        let salt = URL_SAFE_NO_PAD.decode(&self.kdf.salt).map_err(|e| {
            corrupted_record(format!("salt is not valid base64: {}", e))
        })?;
        let salt: [u8; SALT_LEN] = salt.as_slice().try_into().map_err(|_| {
            corrupted_record(format!("salt must be {} bytes, got {}", SALT_LEN, salt.len()))
        })?;
        Ok(KeyDerivation::new(salt, self.kdf.cost))
    }
}

/// View over a store that manages the wrapped key record.
pub struct KeyVault<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> KeyVault<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Produces a fresh random DEK. Used exactly once, at first-time setup.
    pub fn generate_key() -> Result<SecretKey> {
        SecretKey::generate()
    }

    /// Wraps `dek` under a credential derived from `passphrase` with a new
    /// random salt and persists it, replacing any prior record.
    pub fn wrap_and_persist(
        &self,
        dek: &SecretKey,
        passphrase: &str,
        cost: ScryptCost,
    ) -> Result<()> {
        let kdf = KeyDerivation::generate(cost)?;
        let credential = kdf.derive(passphrase)?;
        let wrapped_key = cipher::encrypt(&dek.to_text(), credential.key())?;

        let record = WrappedKeyRecord {
            version: RECORD_VERSION,
            kdf: KdfRecord {
                cost: kdf.cost(),
                salt: URL_SAFE_NO_PAD.encode(kdf.salt()),
            },
            wrapped_key,
        };
        let json = serde_json::to_string(&record).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Serialization,
                "failed to encode wrapped key record",
                e,
            )
        })?;

        self.store
            .put(WRAPPED_KEY_ID, &json)
            .map_err(|e| e.with_context("failed to persist wrapped key"))?;
        info!(log_n = cost.log_n, "wrapped data key persisted");
        Ok(())
    }

    /// Recovers the DEK.
    ///
    /// Returns `Ok(None)` when the passphrase is wrong or the wrapped key has
    /// been tampered with. A missing record, an unreadable record envelope
    /// and storage failures are errors.
    pub fn unwrap(&self, passphrase: &str) -> Result<Option<SecretKey>> {
        let record = self.read_record()?.ok_or_else(|| {
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::NotSetup,
                "vault is not set up",
            )
        })?;

        let credential = record.key_derivation()?.derive(passphrase)?;
        match cipher::decrypt(&record.wrapped_key, credential.key()) {
            Ok(text) => {
                let dek = SecretKey::from_text(&Zeroizing::new(text)).map_err(|e| {
                    VaultError::with_kind_and_source(
                        ErrorCategory::Integrity,
                        ErrorKind::CorruptedCiphertext,
                        "wrapped key decrypted to malformed key text",
                        e,
                    )
                })?;
                debug!("data key unwrapped");
                Ok(Some(dek))
            }
            Err(e) if e.is_decryption_failure() => {
                debug!(error = %e, "failed to unwrap data key");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// True iff a wrapped key record exists.
    pub fn is_setup(&self) -> Result<bool> {
        Ok(self.store.get(WRAPPED_KEY_ID)?.is_some())
    }

    /// Deletes the wrapped key record.
    pub fn clear(&self) -> Result<()> {
        self.store.delete(WRAPPED_KEY_ID)?;
        info!("wrapped data key deleted");
        Ok(())
    }

    fn read_record(&self) -> Result<Option<WrappedKeyRecord>> {
        let Some(json) = self.store.get(WRAPPED_KEY_ID)? else {
            return Ok(None);
        };
        let record: WrappedKeyRecord = serde_json::from_str(&json).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Integrity,
                ErrorKind::CorruptedCiphertext,
                "wrapped key record is not readable",
                e,
            )
        })?;
        if record.version != RECORD_VERSION {
            return Err(corrupted_record(format!(
                "unsupported wrapped key record version {}",
                record.version
            )));
        }
        Ok(Some(record))
    }
}

fn corrupted_record(msg: String) -> VaultError {
    VaultError::with_kind(ErrorCategory::Integrity, ErrorKind::CorruptedCiphertext, msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::varmor;
    use serde_json::Value;

    const FAST: ScryptCost = ScryptCost {
        log_n: 10,
        r: 8,
        p: 1,
    };

    fn setup(store: &MemoryStore, passphrase: &str) -> SecretKey {
        let dek = KeyVault::<MemoryStore>::generate_key().unwrap();
        KeyVault::new(store)
            .wrap_and_persist(&dek, passphrase, FAST)
            .unwrap();
        dek
    }

    #[test]
    fn test_unwrap_with_correct_passphrase() {
        let store = MemoryStore::new();
        let dek = setup(&store, "Str0ngPass!");

        let vault = KeyVault::new(&store);
        assert!(vault.is_setup().unwrap());
        assert_eq!(vault.unwrap("Str0ngPass!").unwrap(), Some(dek));
    }

    #[test]
    fn test_unwrap_with_wrong_passphrase() {
        let store = MemoryStore::new();
        setup(&store, "Str0ngPass!");

        assert_eq!(KeyVault::new(&store).unwrap("wrongpass").unwrap(), None);
    }

    #[test]
    fn test_rewrap_replaces_record() {
        let store = MemoryStore::new();
        let dek = setup(&store, "first");
        KeyVault::new(&store)
            .wrap_and_persist(&dek, "second", FAST)
            .unwrap();

        let vault = KeyVault::new(&store);
        assert_eq!(vault.unwrap("first").unwrap(), None);
        assert_eq!(vault.unwrap("second").unwrap(), Some(dek));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_contains_no_plain_key() {
        let store = MemoryStore::new();
        let dek = setup(&store, "Str0ngPass!");

        let json = store.get(WRAPPED_KEY_ID).unwrap().unwrap();
        assert!(!json.contains(dek.to_text().as_str()));

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["kdf"]["logN"], 10);
        assert!(value["wrappedKey"].as_str().unwrap().starts_with("lifevault1:"));
    }

    #[test]
    fn test_tampered_wrapped_key() {
        let store = MemoryStore::new();
        setup(&store, "Str0ngPass!");

        let json = store.get(WRAPPED_KEY_ID).unwrap().unwrap();
        let mut value: Value = serde_json::from_str(&json).unwrap();
        let mut body = varmor::unwrap(value["wrappedKey"].as_str().unwrap()).unwrap();
        body[40] ^= 0x80;
        value["wrappedKey"] = Value::String(varmor::wrap(&body));
        store.put(WRAPPED_KEY_ID, &value.to_string()).unwrap();

        assert_eq!(KeyVault::new(&store).unwrap("Str0ngPass!").unwrap(), None);
    }

    #[test]
    fn test_unreadable_record_is_an_error() {
        let store = MemoryStore::new();
        store.put(WRAPPED_KEY_ID, "not json").unwrap();

        let err = KeyVault::new(&store).unwrap("x").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::CorruptedCiphertext));
        assert_eq!(err.category, ErrorCategory::Integrity);
    }

    #[test]
    fn test_unwrap_without_record() {
        let store = MemoryStore::new();
        let err = KeyVault::new(&store).unwrap("x").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NotSetup));
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        setup(&store, "Str0ngPass!");

        let vault = KeyVault::new(&store);
        vault.clear().unwrap();
        assert!(!vault.is_setup().unwrap());
    }
}
