use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::credentials::Credentials;
use super::error::AuthError;

/// Storage backend that keeps credentials across restarts.
pub trait CredentialPersistence: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>, AuthError>;
    fn save(&self, credentials: &Credentials) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Persistence that keeps nothing; credentials live only in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl CredentialPersistence for NoPersistence {
    fn load(&self) -> Result<Option<Credentials>, AuthError> {
        Ok(None)
    }

    fn save(&self, _credentials: &Credentials) -> Result<(), AuthError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Holder of the current session credentials.
///
/// The access and refresh tokens are swapped together under one write lock,
/// so readers never see the new access token next to the old refresh token.
/// [`RefreshCoordinator`](super::RefreshCoordinator) is the only writer
/// during normal operation; everything else reads through [`get`](Self::get).
///
/// Every sign-in and every clear starts a new session epoch. A writer that
/// read the store earlier (a refresh) only lands its result through
/// [`replace_if_epoch`](Self::replace_if_epoch), so a logout cannot be undone
/// by a refresh that was already running.
pub struct CredentialStore {
    state: RwLock<StoreState>,
    persistence: Arc<dyn CredentialPersistence>,
}

#[derive(Debug, Default)]
struct StoreState {
    credentials: Option<Credentials>,
    epoch: u64,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("signed_in", &self.get().is_some())
            .finish()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl CredentialStore {
    pub fn new(persistence: Arc<dyn CredentialPersistence>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            persistence,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(NoPersistence))
    }

    /// Build a store and restore whatever the persistence backend holds.
    pub fn load_persisted(persistence: Arc<dyn CredentialPersistence>) -> Result<Self, AuthError> {
        let loaded = persistence.load()?;
        Ok(Self {
            state: RwLock::new(StoreState {
                credentials: loaded,
                epoch: 0,
            }),
            persistence,
        })
    }

    /// Snapshot of the current credentials.
    pub fn get(&self) -> Option<Credentials> {
        self.read().credentials.clone()
    }

    /// Current session epoch.
    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    /// Credentials and the epoch they belong to, read together.
    pub fn snapshot(&self) -> (Option<Credentials>, u64) {
        let state = self.read();
        (state.credentials.clone(), state.epoch)
    }

    /// Atomically swap in a new credential pair, persisting it first.
    /// Starts a new session epoch.
    pub fn replace(&self, credentials: Credentials) -> Result<(), AuthError> {
        let mut state = self.write();
        self.persistence.save(&credentials)?;
        state.credentials = Some(credentials);
        state.epoch += 1;
        Ok(())
    }

    /// Swap in `credentials` only while the store is still in `epoch`.
    ///
    /// Returns `false`, writing nothing, when a sign-in or clear happened
    /// since `epoch` was read.
    pub fn replace_if_epoch(
        &self,
        epoch: u64,
        credentials: Credentials,
    ) -> Result<bool, AuthError> {
        let mut state = self.write();
        if state.epoch != epoch {
            return Ok(false);
        }
        self.persistence.save(&credentials)?;
        state.credentials = Some(credentials);
        Ok(true)
    }

    /// Drop credentials from memory and from the persistence backend.
    ///
    /// Memory is always cleared, even when the backend fails.
    pub fn clear(&self) -> Result<(), AuthError> {
        let mut state = self.write();
        state.credentials = None;
        state.epoch += 1;
        self.persistence.clear()
    }

    /// [`clear`](Self::clear), but only while the store is still in `epoch`.
    pub fn clear_if_epoch(&self, epoch: u64) -> Result<bool, AuthError> {
        let mut state = self.write();
        if state.epoch != epoch {
            return Ok(false);
        }
        state.credentials = None;
        state.epoch += 1;
        self.persistence.clear()?;
        Ok(true)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// File-backed persistence using a TOML file.
///
/// # Example
/// ```no_run
/// use waprov::auth::{Credentials, CredentialPersistence, FileCredentialPersistence};
///
/// let persistence = FileCredentialPersistence::new_default();
/// persistence.save(&Credentials::new("access", Some("refresh".to_string())))?;
/// # Ok::<(), waprov::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialPersistence {
    path: PathBuf,
}

impl FileCredentialPersistence {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: base_dir.into().join("session.toml"),
        }
    }

    pub fn new_default() -> Self {
        Self::new(default_waprov_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl CredentialPersistence for FileCredentialPersistence {
    fn load(&self) -> Result<Option<Credentials>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: SessionFile = toml::from_str(&raw)?;
        Ok(Some(file.credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        Self::ensure_parent(&self.path)?;
        let file = SessionFile {
            version: 1,
            credentials: credentials.clone(),
            saved_at: Utc::now(),
        };
        let serialized = toml::to_string(&file)?;
        fs::write(&self.path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    credentials: Credentials,
    saved_at: DateTime<Utc>,
}

pub(crate) fn default_waprov_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".waprov"))
        .unwrap_or_else(|| PathBuf::from(".waprov"))
}
