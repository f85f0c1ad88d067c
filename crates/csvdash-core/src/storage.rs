//! Storage layer: durable persistence of the session subset of the store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{CsvdashError, Result};
use crate::models::{Session, ThemeMode};

/// The part of the store that survives restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PersistentSession {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub theme: ThemeMode,
}

impl PersistentSession {
    /// The auth flag is derived from the token; a file that disagrees is corrected.
    pub fn normalized(mut self) -> Self {
        if self.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.token = None;
        }
        self.is_authenticated = self.token.is_some();
        self
    }

    pub fn session(&self) -> Session {
        Session {
            is_authenticated: self.is_authenticated,
            token: self.token.clone(),
        }
    }
}

/// Durable backend for [`PersistentSession`].
pub trait SessionStorage: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<PersistentSession>>;
    fn save(&self, session: &PersistentSession) -> Result<()>;
}

// ─── YAML file ───────────────────────────────────────────────────────────────

/// Session persisted as a small YAML file (e.g. `~/.config/csvdash/session.yaml`).
#[derive(Debug, Clone)]
pub struct YamlSessionStorage {
    path: PathBuf,
}

impl YamlSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for YamlSessionStorage {
    fn load(&self) -> Result<Option<PersistentSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let session: PersistentSession = load_yaml(&self.path)?;
        Ok(Some(session))
    }

    fn save(&self, session: &PersistentSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        save_yaml(&self.path, session)
    }
}

// ─── In memory ───────────────────────────────────────────────────────────────

/// Non-durable storage for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    inner: Mutex<Option<PersistentSession>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: PersistentSession) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }

    pub fn snapshot(&self) -> Option<PersistentSession> {
        self.inner.lock().ok().and_then(|guard| guard.clone())
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<PersistentSession>> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| CsvdashError::Other("session storage lock poisoned".to_string()))
    }

    fn save(&self, session: &PersistentSession) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| CsvdashError::Other("session storage lock poisoned".to_string()))?;
        *guard = Some(session.clone());
        Ok(())
    }
}

// ─── YAML I/O ────────────────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.as_os_str().is_empty() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn save_yaml<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_yaml::to_string(data)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_yaml<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_yaml::from_str(&content)?)
}
