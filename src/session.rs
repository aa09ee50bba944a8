//! The lock/unlock state machine.
//!
//! A [`Session`] is the only thing the rest of the application talks to. It
//! owns the durable store, holds the data key and the decrypted record while
//! unlocked, and forgets both on [`Session::lock`].
//!
//! ```text
//! Uninitialized --setup--> Unlocked --lock--> Locked --unlock--> Unlocked
//!       ^                                                          |
//!       +------------------------- wipe (from any state) ---------+
//! ```
//!
//! Saves are split into [`Session::begin_save`] and
//! [`Session::complete_save`]. The pending save captures the data key when
//! it begins. If the session is locked before the save completes, the save
//! still writes its ciphertext but leaves the locked session untouched. If
//! the vault is wiped in between, the save is discarded.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::autosave::Debouncer;
use crate::cipher::SecretKey;
use crate::config::SessionConfig;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::passphrase;
use crate::record::{self, AppData, DEFAULT_RECORD_ID, EstatePlan, FinancialPlan, NextOfKinPlan};
use crate::record_store::RecordStore;
use crate::store::KeyValueStore;
use crate::vault::KeyVault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No wrapped key exists; `setup` is required.
    Uninitialized,
    /// A wrapped key exists but the data key is not in memory.
    Locked,
    /// The data key and the decrypted record are in memory.
    Unlocked,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockState::Uninitialized => "uninitialized",
            LockState::Locked => "locked",
            LockState::Unlocked => "unlocked",
        })
    }
}

/// What happened to a save when it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Persisted while the session that started it was still unlocked.
    Applied,
    /// Persisted, but the session was locked in the meantime. Nothing was
    /// restored into memory.
    Detached,
    /// Not persisted, because the vault was wiped in the meantime.
    Discarded,
}

/// A save that has captured its record snapshot and data key.
pub struct PendingSave {
    record: AppData,
    dek: Arc<SecretKey>,
    epoch: u64,
    generation: u64,
}

impl PendingSave {
    pub fn record(&self) -> &AppData {
        &self.record
    }
}

struct Unlocked {
    dek: Arc<SecretKey>,
    record: AppData,
}

pub struct Session<S: KeyValueStore> {
    store: S,
    config: SessionConfig,
    initialized: bool,
    unlocked: Option<Unlocked>,
    // Bumped on every unlock, lock and wipe.
    epoch: u64,
    // Bumped whenever the data key is replaced or destroyed.
    generation: u64,
    autosave: Debouncer,
    last_error: Option<String>,
}

impl<S: KeyValueStore> Session<S> {
    /// Creates a session over `store`. The initial state is `Locked` if a
    /// wrapped key exists and `Uninitialized` otherwise.
    pub fn open(store: S, config: SessionConfig) -> Result<Self> {
        let initialized = KeyVault::new(&store).is_setup()?;
        let autosave = Debouncer::new(config.autosave_delay);
        let session = Self {
            store,
            config,
            initialized,
            unlocked: None,
            epoch: 0,
            generation: 0,
            autosave,
            last_error: None,
        };
        info!(state = %session.state(), "session opened");
        Ok(session)
    }

    pub fn state(&self) -> LockState {
        match (self.initialized, self.unlocked.is_some()) {
            (false, _) => LockState::Uninitialized,
            (true, false) => LockState::Locked,
            (true, true) => LockState::Unlocked,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The most recent user-visible error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// First-time setup: generates and wraps a data key, persists a default
    /// record under it and leaves the session unlocked.
    pub fn setup(&mut self, passphrase: &str) -> Result<()> {
        let result = self.setup_inner(passphrase);
        self.surface(result)
    }

    fn setup_inner(&mut self, passphrase: &str) -> Result<()> {
        if self.initialized {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::AlreadySetup,
                "vault is already set up",
            ));
        }
        passphrase::validate_new_passphrase(passphrase)?;

        let vault = KeyVault::new(&self.store);
        let dek = KeyVault::<S>::generate_key()?;
        vault.wrap_and_persist(&dek, passphrase, self.config.scrypt)?;

        let record = AppData::new_default();
        if let Err(e) = RecordStore::new(&self.store).save(&record, Some(&dek)) {
            if let Err(rollback) = vault.clear() {
                warn!(error = %rollback, "failed to roll back wrapped key after setup failure");
            }
            return Err(e.with_context("failed to save initial record"));
        }

        self.initialized = true;
        self.generation += 1;
        self.epoch += 1;
        self.unlocked = Some(Unlocked {
            dek: Arc::new(dek),
            record,
        });
        info!("vault set up");
        Ok(())
    }

    /// Attempts to unlock with `passphrase`.
    ///
    /// Returns `Ok(false)` and stays locked when the passphrase is wrong. A
    /// record that cannot be decrypted with the recovered key is an error.
    pub fn unlock(&mut self, passphrase: &str) -> Result<bool> {
        let result = self.unlock_inner(passphrase);
        self.surface(result)
    }

    fn unlock_inner(&mut self, passphrase: &str) -> Result<bool> {
        match self.state() {
            LockState::Uninitialized => {
                return Err(VaultError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::NotSetup,
                    "vault is not set up; run setup first",
                ));
            }
            LockState::Unlocked => {
                return Err(VaultError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::InvalidState,
                    "vault is already unlocked",
                ));
            }
            LockState::Locked => {}
        }

        let Some(dek) = KeyVault::new(&self.store).unwrap(passphrase)? else {
            warn!("unlock attempt with incorrect passphrase");
            self.last_error = Some(wrong_passphrase().user_message());
            return Ok(false);
        };

        let records = RecordStore::new(&self.store);
        let record = match records.load(DEFAULT_RECORD_ID, Some(&dek))? {
            Some(record) => record,
            None => {
                debug!("no record found, creating defaults");
                let record = AppData::new_default();
                records.save(&record, Some(&dek))?;
                record
            }
        };

        self.epoch += 1;
        self.unlocked = Some(Unlocked {
            dek: Arc::new(dek),
            record,
        });
        self.last_error = None;
        info!("vault unlocked");
        Ok(true)
    }

    /// Forgets the data key and the decrypted record. Pending debounced
    /// edits that were not flushed are dropped; nothing is written.
    pub fn lock(&mut self) {
        if self.unlocked.take().is_some() {
            self.epoch += 1;
            if self.autosave.cancel() {
                warn!("locked with unsaved edits pending");
            }
            info!("vault locked");
        }
    }

    /// Deletes the wrapped key and every record with a single
    /// [`KeyValueStore::clear`]. The session returns to `Uninitialized`; the
    /// old data is unrecoverable.
    pub fn wipe(&mut self) -> Result<()> {
        self.lock();
        self.generation += 1;
        let result = self.store.clear();
        if result.is_ok() {
            self.initialized = false;
            self.last_error = None;
            info!("vault wiped");
        }
        self.surface(result)
    }

    /// The decrypted record.
    pub fn record(&self) -> Result<&AppData> {
        self.unlocked
            .as_ref()
            .map(|u| &u.record)
            .ok_or_else(VaultError::no_data_loaded)
    }

    /// A copy of the decrypted record, for export.
    pub fn export_record(&self) -> Result<AppData> {
        self.record().cloned()
    }

    /// Replaces the record and persists it.
    pub fn save(&mut self, record: AppData) -> Result<()> {
        let result = self.replace_and_persist(record);
        self.surface(result)
    }

    /// Replaces the record with an imported one and persists it under the
    /// vault's record id.
    pub fn import_record(&mut self, mut record: AppData) -> Result<()> {
        record.id = DEFAULT_RECORD_ID.to_string();
        let result = self.replace_and_persist(record);
        if result.is_ok() {
            info!("record imported");
        }
        self.surface(result)
    }

    fn replace_and_persist(&mut self, record: AppData) -> Result<()> {
        let unlocked = self.unlocked.as_mut().ok_or_else(VaultError::no_data_loaded)?;
        record.validate()?;
        unlocked.record = record;
        self.autosave.cancel();
        self.persist_now()
    }

    pub fn update_financial_plan(&mut self, f: impl FnOnce(&mut FinancialPlan)) -> Result<()> {
        self.update_section(|record| {
            f(&mut record.financial_plan);
            record.financial_plan.last_updated = record::timestamp();
        })
    }

    pub fn update_estate_plan(&mut self, f: impl FnOnce(&mut EstatePlan)) -> Result<()> {
        self.update_section(|record| {
            f(&mut record.estate_plan);
            record.estate_plan.last_updated = record::timestamp();
        })
    }

    pub fn update_next_of_kin_plan(&mut self, f: impl FnOnce(&mut NextOfKinPlan)) -> Result<()> {
        self.update_section(|record| {
            f(&mut record.next_of_kin_plan);
            record.next_of_kin_plan.last_updated = record::timestamp();
        })
    }

    fn update_section(&mut self, f: impl FnOnce(&mut AppData)) -> Result<()> {
        let result = self.apply(f).and_then(|()| {
            self.autosave.cancel();
            self.persist_now()
        });
        self.surface(result)
    }

    /// Runs `f` on a copy of the record and keeps the result only if it
    /// passes [`AppData::validate`].
    fn apply(&mut self, f: impl FnOnce(&mut AppData)) -> Result<()> {
        let unlocked = self.unlocked.as_mut().ok_or_else(VaultError::no_data_loaded)?;
        let mut record = unlocked.record.clone();
        f(&mut record);
        record.validate()?;
        unlocked.record = record;
        Ok(())
    }

    /// Applies an edit in memory and schedules a debounced save at `now`.
    /// With auto-save disabled the edit is saved immediately. An edit that
    /// leaves the record invalid is rejected and not applied.
    pub fn edit(&mut self, now: Instant, f: impl FnOnce(&mut AppData)) -> Result<()> {
        let result = self.apply(f).and_then(|()| {
            if self.config.autosave {
                self.autosave.schedule(now);
                Ok(())
            } else {
                self.persist_now()
            }
        });
        self.surface(result)
    }

    /// Whether a debounced save is waiting for its deadline.
    pub fn has_unsaved_edits(&self) -> bool {
        self.autosave.is_pending()
    }

    /// Saves if the debounce deadline has passed at `now`. Returns whether a
    /// save happened.
    pub fn poll_autosave(&mut self, now: Instant) -> Result<bool> {
        if !self.autosave.fire(now) {
            return Ok(false);
        }
        let result = self.persist_now().map(|()| true);
        self.surface(result)
    }

    /// Saves a pending debounced edit right away. Returns whether there was one.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.autosave.cancel() {
            return Ok(false);
        }
        let result = self.persist_now().map(|()| true);
        self.surface(result)
    }

    /// Stamps `updatedAt` and snapshots the record together with the current
    /// data key.
    pub fn begin_save(&mut self) -> Result<PendingSave> {
        let unlocked = self.unlocked.as_mut().ok_or_else(VaultError::no_data_loaded)?;
        unlocked.record.updated_at = record::timestamp();
        Ok(PendingSave {
            record: unlocked.record.clone(),
            dek: Arc::clone(&unlocked.dek),
            epoch: self.epoch,
            generation: self.generation,
        })
    }

    /// Persists a pending save with the key it captured.
    pub fn complete_save(&mut self, pending: PendingSave) -> Result<SaveOutcome> {
        if pending.generation != self.generation {
            warn!("discarding save that started before the vault was wiped");
            return Ok(SaveOutcome::Discarded);
        }

        let result = RecordStore::new(&self.store).save(&pending.record, Some(&pending.dek));
        self.surface(result)?;

        if pending.epoch == self.epoch && self.unlocked.is_some() {
            Ok(SaveOutcome::Applied)
        } else {
            debug!("save completed after the session was locked");
            Ok(SaveOutcome::Detached)
        }
    }

    fn persist_now(&mut self) -> Result<()> {
        let pending = self.begin_save()?;
        self.complete_save(pending).map(|_| ())
    }

    fn surface<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = Some(e.user_message());
        }
        result
    }
}

fn wrong_passphrase() -> VaultError {
    VaultError::with_kind(
        ErrorCategory::User,
        ErrorKind::WrongPassphrase,
        "incorrect passphrase",
    )
}
