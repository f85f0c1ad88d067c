//! Session/file store: the single source of truth shared by every view.
//!
//! State lives inside a `tokio::sync::watch` channel. Each mutation is one
//! `send_modify` closure, so read-modify-write steps from upload resolutions,
//! deletes and refreshes never interleave halfway. Subscribers get a
//! `watch::Receiver` and see every committed state.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CsvdashError, Result};
use crate::models::{FileId, FileRecord, FileStatus, NewFileRecord, Session, ThemeMode};
use crate::storage::{MemorySessionStorage, PersistentSession, SessionStorage};

/// File records known to this process. Never persisted; rebuilt from the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransientFileCache {
    files: Vec<FileRecord>,
}

impl TransientFileCache {
    pub fn records(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn get(&self, id: &FileId) -> Option<&FileRecord> {
        self.files.iter().find(|f| &f.id == id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn upsert(&mut self, record: FileRecord) {
        match self.files.iter_mut().find(|f| f.id == record.id) {
            Some(existing) => *existing = record,
            None => self.files.push(record),
        }
    }

    fn update_status(&mut self, id: &FileId, status: FileStatus, row_count: Option<u64>) -> bool {
        match self.files.iter_mut().find(|f| &f.id == id) {
            Some(record) => {
                record.apply_status(status, row_count);
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, id: &FileId) -> bool {
        let before = self.files.len();
        self.files.retain(|f| &f.id != id);
        self.files.len() != before
    }

    fn replace(&mut self, files: Vec<FileRecord>) {
        self.files = files
            .into_iter()
            .map(|mut f| {
                f.normalize();
                f
            })
            .collect();
    }

    fn clear(&mut self) {
        self.files.clear();
    }
}

/// Everything the store holds, as seen by subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub session: PersistentSession,
    pub files: TransientFileCache,
}

pub struct Store {
    state: watch::Sender<StoreState>,
    storage: Arc<dyn SessionStorage>,
    /// Cancelled on logout so pending status resolutions stop touching the store.
    cancel: Mutex<CancellationToken>,
}

impl Store {
    /// Create a store, restoring the persisted session from `storage` if any.
    ///
    /// A session file that cannot be decoded is ignored and overwritten on the
    /// next save. I/O failures are returned.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let session = match storage.load() {
            Ok(session) => session.unwrap_or_default().normalized(),
            Err(CsvdashError::Yaml(e)) => {
                warn!("Ignoring unreadable session file: {}", e);
                PersistentSession::default()
            }
            Err(e) => return Err(e),
        };
        if session.is_authenticated {
            debug!("Restored persisted session");
        }
        let (state, _) = watch::channel(StoreState {
            session,
            files: TransientFileCache::default(),
        });
        Ok(Self {
            state,
            storage,
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// A store backed by memory only.
    pub fn in_memory() -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            state,
            storage: Arc::new(MemorySessionStorage::new()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    // ─── Session ─────────────────────────────────────────────────────────────

    /// Mark the session authenticated with `token`. The caller has already
    /// validated credentials with the backend.
    ///
    /// Session changes take effect in memory even when persisting them fails;
    /// the error only reports that the change will not survive a restart.
    pub fn login(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        self.mutate_session(|session| {
            session.token = Some(token);
        })?;
        info!("Session started");
        Ok(())
    }

    /// Clear the session and the session-scoped file list, and cancel pending
    /// status resolutions. Takes effect in memory even if persisting fails.
    pub fn logout(&self) -> Result<()> {
        let mut result = Ok(());
        self.state.send_modify(|state| {
            state.session.token = None;
            state.session.is_authenticated = false;
            state.files.clear();
            // Cancelled under the state lock, so a resolution committing
            // afterwards always sees the cancelled token.
            let previous = std::mem::replace(&mut *self.cancel_guard(), CancellationToken::new());
            previous.cancel();
            result = self.storage.save(&state.session);
        });
        match &result {
            Ok(()) => info!("Session cleared"),
            Err(e) => warn!("Session cleared but not persisted: {}", e),
        }
        result
    }

    pub fn set_theme(&self, theme: ThemeMode) -> Result<()> {
        self.mutate_session(|session| session.theme = theme)
    }

    pub fn toggle_theme(&self) -> Result<ThemeMode> {
        let mut theme = ThemeMode::default();
        self.mutate_session(|session| {
            session.theme = session.theme.toggled();
            theme = session.theme;
        })?;
        Ok(theme)
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session.session()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().session.token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session.is_authenticated
    }

    pub fn theme(&self) -> ThemeMode {
        self.state.borrow().session.theme
    }

    /// Token that fires when the current session ends.
    pub fn session_cancellation(&self) -> CancellationToken {
        self.cancel_guard().clone()
    }

    // ─── Files ───────────────────────────────────────────────────────────────

    /// Append a locally created record under a fresh client-side id.
    pub fn add_file(&self, file: NewFileRecord) -> FileId {
        let id = FileId::new_local();
        let record = file.into_record(id.clone());
        self.state.send_modify(|state| state.files.upsert(record));
        debug!(id = %id, "File added");
        id
    }

    /// Insert a record that already carries its id (usually the server's),
    /// replacing any record with the same id.
    pub fn insert_file(&self, mut record: FileRecord) {
        record.normalize();
        debug!(id = %record.id, status = %record.status, "File inserted");
        self.state.send_modify(|state| state.files.upsert(record));
    }

    /// Set the status (and row count, if given) of a record. Returns `false`
    /// and changes nothing when the id is unknown, e.g. because the record was
    /// deleted while its status was being resolved.
    pub fn update_file_status(
        &self,
        id: &FileId,
        status: FileStatus,
        row_count: Option<u64>,
    ) -> bool {
        let updated = self
            .state
            .send_if_modified(|state| state.files.update_status(id, status, row_count));
        if updated {
            debug!(id = %id, status = %status, "File status updated");
        } else {
            debug!(id = %id, "Status update for unknown file ignored");
        }
        updated
    }

    /// Like [`Store::update_file_status`], but only while `session` has not
    /// been cancelled. The check and the update happen in one mutation, so a
    /// result from an ended session never lands on the next session's files.
    pub fn update_file_status_in_session(
        &self,
        id: &FileId,
        status: FileStatus,
        row_count: Option<u64>,
        session: &CancellationToken,
    ) -> bool {
        let updated = self.state.send_if_modified(|state| {
            !session.is_cancelled() && state.files.update_status(id, status, row_count)
        });
        if updated {
            debug!(id = %id, status = %status, "File status updated");
        }
        updated
    }

    /// Replace the whole collection, e.g. after refreshing from the backend.
    pub fn set_files(&self, files: Vec<FileRecord>) {
        self.state.send_modify(|state| state.files.replace(files));
    }

    /// Idempotent: removing an unknown id is a no-op returning `false`.
    pub fn remove_file(&self, id: &FileId) -> bool {
        self.state.send_if_modified(|state| state.files.remove(id))
    }

    pub fn files(&self) -> Vec<FileRecord> {
        self.state.borrow().files.records().to_vec()
    }

    pub fn file(&self, id: &FileId) -> Option<FileRecord> {
        self.state.borrow().files.get(id).cloned()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    fn mutate_session<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut PersistentSession),
    {
        let mut result = Ok(());
        self.state.send_modify(|state| {
            f(&mut state.session);
            state.session = std::mem::take(&mut state.session).normalized();
            result = self.storage.save(&state.session);
        });
        if let Err(e) = &result {
            warn!("Failed to persist session: {}", e);
        }
        result
    }

    fn cancel_guard(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
