//! Passphrase to credential derivation using scrypt
//!
//! A [`Credential`] is only ever used to wrap the data encryption key. The
//! salt and cost are chosen once at setup and persisted next to the wrapped
//! key, which makes [`KeyDerivation::derive`] a deterministic function of the
//! passphrase for a given installation.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::cipher::{self, KEY_LEN, SecretKey};
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScryptCost {
    /// log2 of the CPU/memory cost N
    pub log_n: u8,
    /// block size
    pub r: u32,
    /// parallelization
    pub p: u32,
}

impl Default for ScryptCost {
    fn default() -> Self {
        Self {
            log_n: 15,
            r: 8,
            p: 1,
        }
    }
}

impl ScryptCost {
    fn params(&self) -> Result<scrypt::Params> {
        scrypt::Params::new(self.log_n, self.r, self.p, KEY_LEN).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::KeyDerivation,
                format!(
                    "invalid scrypt parameters (log_n={}, r={}, p={})",
                    self.log_n, self.r, self.p
                ),
                e,
            )
        })
    }
}

/// Key-wrapping material derived from a passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(SecretKey);

impl Credential {
    pub fn key(&self) -> &SecretKey {
        &self.0
    }
}

/// A configured derivation: salt plus scrypt cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDerivation {
    salt: [u8; SALT_LEN],
    cost: ScryptCost,
}

impl KeyDerivation {
    pub fn new(salt: [u8; SALT_LEN], cost: ScryptCost) -> Self {
        Self { salt, cost }
    }

    /// New derivation with a random salt.
    pub fn generate(cost: ScryptCost) -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        cipher::fill_random(&mut salt)?;
        Ok(Self::new(salt, cost))
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn cost(&self) -> ScryptCost {
        self.cost
    }

    /// Derive the credential for `passphrase`.
    pub fn derive(&self, passphrase: &str) -> Result<Credential> {
        let params = self.cost.params()?;

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        scrypt::scrypt(passphrase.as_bytes(), &self.salt, &params, &mut key[..]).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::KeyDerivation,
                "scrypt key derivation failed",
                e,
            )
        })?;

        Ok(Credential(SecretKey::from_bytes(*key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: ScryptCost = ScryptCost {
        log_n: 10,
        r: 8,
        p: 1,
    };

    #[test]
    fn test_deterministic() {
        let kdf = KeyDerivation::new([1u8; SALT_LEN], FAST);
        assert_eq!(
            kdf.derive("Str0ngPass!").unwrap(),
            kdf.derive("Str0ngPass!").unwrap()
        );
    }

    #[test]
    fn test_distinct_passphrases() {
        let kdf = KeyDerivation::new([1u8; SALT_LEN], FAST);
        let corpus = ["", "a", "b", "password", "Password", "password ", "Str0ngPass!"];
        let derived: Vec<Credential> = corpus.iter().map(|p| kdf.derive(p).unwrap()).collect();

        for i in 0..derived.len() {
            for j in (i + 1)..derived.len() {
                assert_ne!(derived[i], derived[j], "{:?} vs {:?}", corpus[i], corpus[j]);
            }
        }
    }

    #[test]
    fn test_salt_matters() {
        let a = KeyDerivation::new([1u8; SALT_LEN], FAST);
        let b = KeyDerivation::new([2u8; SALT_LEN], FAST);
        assert_ne!(a.derive("same").unwrap(), b.derive("same").unwrap());
    }

    #[test]
    fn test_generated_salts_differ() {
        let a = KeyDerivation::generate(FAST).unwrap();
        let b = KeyDerivation::generate(FAST).unwrap();
        assert_ne!(a.salt(), b.salt());
        assert_eq!(a.cost(), FAST);
    }

    #[test]
    fn test_invalid_cost() {
        let kdf = KeyDerivation::new(
            [0u8; SALT_LEN],
            ScryptCost {
                log_n: 64,
                r: 8,
                p: 1,
            },
        );
        let err = kdf.derive("x").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::KeyDerivation));
    }

    #[test]
    fn test_default_cost() {
        assert_eq!(
            ScryptCost::default(),
            ScryptCost {
                log_n: 15,
                r: 8,
                p: 1
            }
        );
    }
}
