//! Session store: the bearer token and who is watching it.
//!
//! The store is an explicitly injected handle. Clones share state, and every
//! change is published on a `watch` channel so views can react (the route
//! guard in the terminal UI listens there). Operations are total: failing to
//! persist the token is logged, never returned.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

/// Durable slot for the bearer token
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn remove(&self) -> io::Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFileContent {
    token: String,
}

/// Token kept in a small JSON file with owner-only permissions
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> io::Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let file: TokenFileContent = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if file.token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(file.token))
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&TokenFileContent {
            token: token.to_string(),
        })
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        std::fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }

    fn remove(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Process-local storage, for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.slot.lock() = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> io::Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

struct SessionInner {
    storage: Box<dyn TokenStorage>,
    state: watch::Sender<Option<String>>,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

impl SessionStore {
    /// Open a store, reading any token persisted by a previous run
    pub fn open(storage: impl TokenStorage + 'static) -> Self {
        let token = match storage.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("Ignoring unreadable session token: {}", e);
                None
            }
        };
        let (state, _) = watch::channel(token);

        Self {
            inner: Arc::new(SessionInner {
                storage: Box::new(storage),
                state,
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(MemoryTokenStorage::new())
    }

    pub fn get(&self) -> Option<String> {
        self.inner.state.borrow().clone()
    }

    pub fn snapshot(&self) -> Session {
        Session { token: self.get() }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_some()
    }

    /// Persist and publish a new token
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        if let Err(e) = self.inner.storage.save(&token) {
            warn!("Failed to persist session token: {}", e);
        }
        self.inner.state.send_replace(Some(token));
        info!("Session established");
    }

    /// Forget the token. Subscribers are only notified if one was present.
    pub fn clear(&self) {
        if let Err(e) = self.inner.storage.remove() {
            warn!("Failed to remove persisted session token: {}", e);
        }
        let cleared = self.inner.state.send_if_modified(|current| {
            if current.is_some() {
                *current = None;
                true
            } else {
                false
            }
        });
        if cleared {
            info!("Session cleared");
        }
    }

    /// Clear only while the session still holds `token`. Returns false and
    /// leaves the store alone if a different token has been set since.
    pub fn clear_if_current(&self, token: &str) -> bool {
        let cleared = self.inner.state.send_if_modified(|current| {
            if current.as_deref() == Some(token) {
                *current = None;
                true
            } else {
                false
            }
        });
        if cleared {
            if let Err(e) = self.inner.storage.remove() {
                warn!("Failed to remove persisted session token: {}", e);
            }
            info!("Session cleared");
        }
        cleared
    }

    /// Receiver that wakes on every session change
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.state.subscribe()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
