//! Plain JSON bundle used to export and import the decrypted record.
//!
//! Bundles are NOT encrypted. They are meant for backups the user stores
//! somewhere they trust, and for moving data to a new installation.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::record::{self, AppData};

pub const BUNDLE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub app_data: Vec<AppData>,
    pub export_date: String,
    pub version: String,
}

impl ExportBundle {
    pub fn from_record(record: AppData) -> Self {
        Self {
            app_data: vec![record],
            export_date: record::timestamp(),
            version: BUNDLE_VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        for record in &self.app_data {
            record.validate()?;
        }
        serde_json::to_string_pretty(self).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Serialization,
                "failed to encode export bundle",
                e,
            )
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: Self = serde_json::from_str(json).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Serialization,
                format!("not a valid export bundle: {}", e),
                e,
            )
        })?;
        if bundle.version != BUNDLE_VERSION {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::Serialization,
                format!("unsupported export bundle version {}", bundle.version),
            ));
        }
        Ok(bundle)
    }

    /// The record to import. Bundles hold exactly one valid record.
    pub fn into_record(self) -> Result<AppData> {
        let count = self.app_data.len();
        let mut records = self.app_data.into_iter();
        match (records.next(), count) {
            (Some(record), 1) => {
                record.validate()?;
                Ok(record)
            }
            _ => Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::Serialization,
                format!("export bundle must contain exactly one record, found {}", count),
            )),
        }
    }
}
