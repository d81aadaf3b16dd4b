//! Credential storage for the session's token pair
//!
//! The store holds at most one access/refresh pair. Reads are served from
//! memory; writes replace the pair in one step and are mirrored to a
//! `CredentialBackend` so the session survives a restart. The file backend
//! uses atomic temp-file + rename so a crash never leaves a torn file.
//!
//! All operations are synchronous. The in-memory pair is authoritative: if
//! the backend fails, the caller gets the error but memory already reflects
//! the new state.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// The session's access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    access: Secret<String>,
    refresh: Secret<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            refresh: Secret::new(refresh.into()),
        }
    }

    /// Bearer token presented on every API call.
    pub fn access(&self) -> &str {
        self.access.expose()
    }

    /// Token presented only to the refresh exchange.
    pub fn refresh(&self) -> &str {
        self.refresh.expose()
    }
}

/// On-disk shape. Key names match the ones the web front end kept in local storage.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(rename = "access_token", default, skip_serializing_if = "Option::is_none")]
    access: Option<String>,
    #[serde(rename = "refresh_token", default, skip_serializing_if = "Option::is_none")]
    refresh: Option<String>,
}

/// Durable persistence behind the store.
pub trait CredentialBackend: Send + Sync {
    /// Read the persisted pair, `None` if nothing usable is stored.
    fn load(&self) -> Result<Option<CredentialPair>>;

    /// Persist `pair`, replacing whatever was stored.
    fn save(&self, pair: &CredentialPair) -> Result<()>;

    /// Remove the persisted pair. Removing nothing is not an error.
    fn erase(&self) -> Result<()>;
}

/// JSON file backend.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "credential file not found, starting logged out");
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(format!("reading credential file: {e}"))),
        };

        let stored: StoredCredentials = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;

        match (stored.access, stored.refresh) {
            (Some(access), Some(refresh)) => {
                info!(path = %self.path.display(), "loaded stored credentials");
                Ok(Some(CredentialPair::new(access, refresh)))
            }
            (None, None) => Ok(None),
            _ => {
                warn!(path = %self.path.display(), "credential file holds only half a token pair, ignoring it");
                Ok(None)
            }
        }
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        let stored = StoredCredentials {
            access: Some(pair.access().to_owned()),
            refresh: Some(pair.refresh().to_owned()),
        };
        write_atomic(&self.path, &stored)
    }

    fn erase(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed credential file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(format!("removing credential file: {e}"))),
        }
    }
}

/// Process-local backend. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<CredentialPair>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with a pair, as if a previous session had saved it.
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            slot: Mutex::new(Some(pair)),
        }
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<Option<CredentialPair>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(pair.clone());
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Holder of the session's single credential pair.
///
/// The RwLock makes `write` and `clear` atomic with respect to `read`: a
/// reader sees either the old pair or the new one, never a mix.
pub struct CredentialStore {
    current: RwLock<Option<CredentialPair>>,
    backend: Box<dyn CredentialBackend>,
}

impl CredentialStore {
    /// Build a store from whatever the backend has persisted.
    pub fn load(backend: impl CredentialBackend + 'static) -> Result<Self> {
        let current = backend.load()?;
        Ok(Self {
            current: RwLock::new(current),
            backend: Box::new(backend),
        })
    }

    /// Empty store with no persistence.
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(None),
            backend: Box::new(MemoryBackend::new()),
        }
    }

    /// Current pair, if any.
    pub fn read(&self) -> Option<CredentialPair> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the stored pair.
    ///
    /// Memory takes the new pair even if the backend write fails. The write
    /// lock is held across both so concurrent writers persist in the order
    /// they land.
    pub fn write(&self, pair: CredentialPair) -> Result<()> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let persisted = self.backend.save(&pair);
        *current = Some(pair);
        debug!("stored new credential pair");
        persisted
    }

    /// Drop both tokens. Idempotent.
    ///
    /// The backend is erased even when memory is already empty: a half pair
    /// on disk, or an earlier erase that failed, must not outlive a logout.
    pub fn clear(&self) -> Result<()> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.take().is_some() {
            debug!("cleared credential pair");
        } else {
            debug!("credential pair already empty, erasing backend");
        }
        self.backend.erase()
    }

    /// Whether no pair is stored (the session must log in again).
    pub fn is_empty(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Write credentials to a file atomically.
///
/// Writes a temporary file next to the target, restricts it to 0600 on unix,
/// then renames it over the target.
fn write_atomic(path: &Path, data: &StoredCredentials) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
