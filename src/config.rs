//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

use crate::autosave;
use crate::kdf::ScryptCost;

/// Tunables for a [`crate::session::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// scrypt cost used when wrapping a new data key. Unlocking always uses
    /// the cost recorded next to the wrapped key.
    pub scrypt: ScryptCost,
    /// Whether [`crate::session::Session::edit`] debounces saves. When
    /// disabled every edit is saved immediately.
    pub autosave: bool,
    /// Quiescence delay before a debounced save fires.
    pub autosave_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scrypt: ScryptCost::default(),
            autosave: true,
            autosave_delay: autosave::DEFAULT_DELAY,
        }
    }
}

impl SessionConfig {
    pub fn with_scrypt(mut self, scrypt: ScryptCost) -> Self {
        self.scrypt = scrypt;
        self
    }

    pub fn with_autosave(mut self, enabled: bool, delay: Duration) -> Self {
        self.autosave = enabled;
        self.autosave_delay = delay;
        self
    }
}

/// Platform data directory for the vault, e.g. `~/.local/share/lifevault`.
pub fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "lifevault").map(|dirs| dirs.data_dir().to_path_buf())
}
