use crate::{error::Result, models::Credential};
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Key under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "authToken";

// 1. SessionStore Contract
/// SessionStore
///
/// Durable home of the bearer credential. This is the single source of truth for
/// "is somebody logged in" across restarts. The store never inspects the token: shape
/// and expiry are the backend's business.
///
/// Synchronous, so that `logout` can clear the credential without awaiting anything.
/// `AuthGateway` calls `save` and `clear` while holding the session lock, which keeps the
/// store and the published session in step. Implementations must therefore finish
/// quickly and never block on anything but their own small write.
pub trait SessionStore: Send + Sync {
    /// Returns the stored credential, or `None` when nobody is logged in.
    fn load(&self) -> Result<Option<Credential>>;

    /// Persists the credential, replacing any previous one.
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Removes the credential. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

// 2. The Real Implementation (local JSON file)
/// FileSessionStore
///
/// Keeps the token in a small JSON document (`{"authToken": "..."}`) on local disk.
/// Writes go to a sibling temp file which is then renamed over the target, so a crash
/// mid-write leaves either the old token or the new one, never a torn file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Credential>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // A corrupt document is treated as "no session"; the next save overwrites it.
        let doc: Map<String, Value> = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                return Ok(None);
            }
        };

        Ok(doc
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .map(Credential::new))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut doc = Map::new();
        doc.insert(
            TOKEN_KEY.to_string(),
            Value::String(credential.as_str().to_string()),
        );
        let body = serde_json::to_vec(&doc).map_err(io::Error::other)?;

        let tmp = self.temp_path();
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// 3. The In-Memory Implementation (tests, ephemeral runs)
/// MemorySessionStore
///
/// Holds the credential in process memory only. Used by the test suites.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Credential>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded store, as if a previous run had logged in.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        // A poisoned slot still holds a valid Option; recover it.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.slot().clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        *self.slot() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

/// SessionStoreState
///
/// The concrete type used to share the session store across the application.
pub type SessionStoreState = Arc<dyn SessionStore>;
