//! # Filesystem-backed credential store
//!
//! [`FileStore`] persists the credential to a single file so a desktop or mobile
//! client stays signed in across restarts.
//!
//! ## Layout
//!
//! ```text
//! <base_dir>/
//! └── taskboard.session      # credential wire form, mode 0600 on unix
//! ```
//!
//! Writes go to a sibling temp file first and are renamed into place, so a crash
//! mid-write leaves either the old credential or the new one.
//!
//! ## Platform data directories
//!
//! [`FileStore::in_data_dir`] uses [`dirs::data_dir()`]:
//!
//! | Platform | Path |
//! |----------|------|
//! | macOS / iOS | `~/Library/Application Support/taskboard/` |
//! | Linux | `~/.local/share/taskboard/` |
//! | Windows | `C:\Users\<user>\AppData\Roaming\taskboard\` |
//! | Android | App-internal storage (via `dirs`) |

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::credential_store::{CredentialStore, StoreError, SESSION_KEY};

/// Filesystem-backed CredentialStore for desktop and mobile persistence.
#[derive(Clone, Debug)]
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    /// `<data_dir>/taskboard`, or `./taskboard` when the platform has no data dir.
    pub fn in_data_dir() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskboard");
        Self::new(base)
    }

    pub fn path(&self) -> PathBuf {
        self.base.join(SESSION_KEY)
    }

    fn temp_path(&self) -> PathBuf {
        self.base.join(format!("{SESSION_KEY}.tmp"))
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl CredentialStore for FileStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        let path = self.path();
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let content = content.trim();
                Ok((!content.is_empty()).then(|| content.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(path = %path.display(), error = %e, "Credential file is not UTF-8");
                Err(StoreError::Unreadable(e.to_string()))
            }
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    async fn save(&self, credential: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.base).map_err(|e| unavailable(&self.base, e))?;

        let temp = self.temp_path();
        std::fs::write(&temp, credential).map_err(|e| unavailable(&temp, e))?;
        restrict_permissions(&temp).map_err(|e| unavailable(&temp, e))?;

        let path = self.path();
        std::fs::rename(&temp, &path).map_err(|e| unavailable(&path, e))?;
        debug!(path = %path.display(), "Saved credential");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let path = self.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed credential file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(&path, e)),
        }
    }
}
