//! Persistence of [`AppData`] with per-section encryption.
//!
//! The record's envelope (id and timestamps) stays readable; each of the
//! three plan sections is serialized to JSON and replaced by its ciphertext
//! before the record is written.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::{self, SecretKey};
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::record::{AppData, EstatePlan, FinancialPlan, NextOfKinPlan};
use crate::store::KeyValueStore;

/// A section as it sits in the store: either ciphertext or the plain object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Section<T> {
    Sealed(String),
    Open(T),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: String,
    financial_plan: Section<FinancialPlan>,
    estate_plan: Section<EstatePlan>,
    next_of_kin_plan: Section<NextOfKinPlan>,
    created_at: String,
    updated_at: String,
}

/// View over a store that reads and writes application records.
pub struct RecordStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> RecordStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Persists `record` under its id, encrypting each section under `dek`
    /// when one is given. Overwrites any existing record with the same id.
    /// Records that fail [`AppData::validate`] are rejected before anything
    /// is written.
    pub fn save(&self, record: &AppData, dek: Option<&SecretKey>) -> Result<()> {
        record.validate()?;
        let stored = StoredRecord {
            id: record.id.clone(),
            financial_plan: seal("financialPlan", &record.financial_plan, dek)?,
            estate_plan: seal("estatePlan", &record.estate_plan, dek)?,
            next_of_kin_plan: seal("nextOfKinPlan", &record.next_of_kin_plan, dek)?,
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        };
        let json = serde_json::to_string(&stored).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Serialization,
                "failed to encode record",
                e,
            )
        })?;

        self.store
            .put(&record.id, &json)
            .map_err(|e| e.with_context(format!("failed to save record {}", record.id)))?;
        debug!(id = %record.id, encrypted = dek.is_some(), "record saved");
        Ok(())
    }

    /// Reads the record stored under `id`, decrypting its sections with
    /// `dek` when one is given. `Ok(None)` means there is no such record.
    pub fn load(&self, id: &str, dek: Option<&SecretKey>) -> Result<Option<AppData>> {
        let Some(json) = self.store.get(id)? else {
            return Ok(None);
        };
        let stored: StoredRecord = serde_json::from_str(&json).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Integrity,
                ErrorKind::CorruptedCiphertext,
                format!("record {} is not readable", id),
                e,
            )
        })?;

        let record = AppData {
            id: stored.id,
            financial_plan: open("financialPlan", stored.financial_plan, dek)?,
            estate_plan: open("estatePlan", stored.estate_plan, dek)?,
            next_of_kin_plan: open("nextOfKinPlan", stored.next_of_kin_plan, dek)?,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        };
        debug!(id, encrypted = dek.is_some(), "record loaded");
        Ok(Some(record))
    }
}

fn seal<T: Serialize + Clone>(
    name: &str,
    section: &T,
    dek: Option<&SecretKey>,
) -> Result<Section<T>> {
    let Some(dek) = dek else {
        return Ok(Section::Open(section.clone()));
    };
    let json = Zeroizing::new(serde_json::to_string(section).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Serialization,
            format!("failed to encode {}", name),
            e,
        )
    })?);
    let ciphertext = cipher::encrypt(&json, dek)
        .map_err(|e| e.with_context(format!("failed to encrypt {}", name)))?;
    Ok(Section::Sealed(ciphertext))
}

fn open<T: DeserializeOwned>(
    name: &str,
    section: Section<T>,
    dek: Option<&SecretKey>,
) -> Result<T> {
    match (section, dek) {
        (Section::Open(value), None) => Ok(value),
        (Section::Sealed(_), None) => Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidState,
            format!("{} is encrypted; unlock the vault to read it", name),
        )),
        (Section::Open(_), Some(_)) => Err(VaultError::with_kind(
            ErrorCategory::Integrity,
            ErrorKind::CorruptedCiphertext,
            format!("{} is stored unencrypted", name),
        )),
        (Section::Sealed(ciphertext), Some(dek)) => {
            let json = Zeroizing::new(cipher::decrypt(&ciphertext, dek).map_err(|e| {
                VaultError::with_kind_and_source(
                    ErrorCategory::Integrity,
                    ErrorKind::CorruptedCiphertext,
                    format!("failed to decrypt {}", name),
                    e,
                )
            })?);
            serde_json::from_str(&json).map_err(|e| {
                VaultError::with_kind_and_source(
                    ErrorCategory::Integrity,
                    ErrorKind::CorruptedCiphertext,
                    format!("decrypted {} is not a valid section", name),
                    e,
                )
            })
        }
    }
}
