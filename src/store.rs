//! Durable key-value storage
//!
//! The vault keeps exactly two logical records: the wrapped data key and the
//! application record. Both are JSON text keyed by a fixed string id.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// Extension of files written by [`FileStore`].
const FILE_EXTENSION: &str = "json";

/// A local key-value record store keyed by string id.
pub trait KeyValueStore {
    /// Returns the value stored under `id`, or `None` if absent.
    fn get(&self, id: &str) -> Result<Option<String>>;

    /// Inserts or replaces the value stored under `id`.
    fn put(&self, id: &str, value: &str) -> Result<()>;

    /// Removes `id`. Removing an absent id is not an error.
    fn delete(&self, id: &str) -> Result<()>;

    /// Removes every record.
    fn clear(&self) -> Result<()>;
}

/// Volatile store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<String>> {
        Ok(self.records.borrow().get(id).cloned())
    }

    fn put(&self, id: &str, value: &str) -> Result<()> {
        self.records
            .borrow_mut()
            .insert(id.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.records.borrow_mut().remove(id);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.records.borrow_mut().clear();
        Ok(())
    }
}

/// Store backed by a directory holding one `<id>.json` file per record.
///
/// Writes go to a tempfile in the same directory which is fsynced and then
/// renamed over the target, so a reader sees either the old or the new
/// record and never a partial one. Files are created with mode 0o600 on
/// Unix systems.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if necessary) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        create_private_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(VaultError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::StorageFailure,
                format!("invalid record id {:?}", id),
            ));
        }
        Ok(self.dir.join(format!("{}.{}", id, FILE_EXTENSION)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, id: &str) -> Result<Option<String>> {
        let path = self.path_for(id)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaultError::storage(
                format!("failed to read from {}", path.display()),
                e,
            )),
        }
    }

    fn put(&self, id: &str, value: &str) -> Result<()> {
        let path = self.path_for(id)?;
        write_atomic(&self.dir, &path, value.as_bytes())
            .map_err(|e| e.with_context(format!("failed to write to {}", path.display())))?;
        debug!(id, bytes = value.len(), "record written");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::storage(
                format!("failed to remove {}", path.display()),
                e,
            )),
        }
    }

    fn clear(&self) -> Result<()> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            VaultError::storage(format!("failed to list {}", self.dir.display()), e)
        })?;
        for entry in entries {
            let path = entry
                .map_err(|e| {
                    VaultError::storage(format!("failed to list {}", self.dir.display()), e)
                })?
                .path();
            if path.extension().is_some_and(|ext| ext == FILE_EXTENSION) {
                fs::remove_file(&path).map_err(|e| {
                    VaultError::storage(format!("failed to remove {}", path.display()), e)
                })?;
            }
        }
        Ok(())
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .map_err(|e| VaultError::storage(format!("failed to create {}", dir.display()), e))
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
            .map_err(|e| VaultError::storage(format!("failed to create {}", dir.display()), e))
    }
}

/// Atomically writes `contents` to `path`, readable by the owner only.
pub fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    write_atomic(dir, path, contents)
}

/// Tempfile + fsync + rename, with the result readable by the owner only.
fn write_atomic(dir: &Path, target: &Path, contents: &[u8]) -> Result<()> {
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| VaultError::storage("failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| VaultError::storage("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| VaultError::storage("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| VaultError::storage("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| VaultError::storage("failed to get tempfile metadata", e))?
            .permissions();
        perms.set_mode(0o600);
        temp_file
            .as_file()
            .set_permissions(perms)
            .map_err(|e| VaultError::storage("failed to set tempfile permissions", e))?;
    }

    temp_file.persist(target).map_err(|e| {
        VaultError::storage(
            format!("failed to rename to target file {}", target.display()),
            e,
        )
    })?;
    Ok(())
}
