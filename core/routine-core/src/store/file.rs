//! File-backed session store.
//!
//! Keeps every session document in one JSON file (`~/.littleroutine/sessions.json`):
//!
//! ```json
//! {
//!   "version": 1,
//!   "sessions": [ { ... ActivitySession fields ... } ]
//! }
//! ```
//!
//! Several processes may share the file. Each mutation takes the
//! `sessions.json.lock` write lock, re-reads the file, applies one change and
//! writes it back, so concurrent writers never drop each other's documents.
//! Two writers finishing the same document still resolve last write wins.
//! Other processes' writes reach subscribers only through
//! [`FileStore::refresh`].
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash never leaves a half-written file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::lock::{WriteLock, LOCK_WAIT};
use super::{SessionEdits, SessionStore, SessionTable, Subscribers, Subscription};
use crate::error::{Result, RoutineError};
use crate::types::{ActivityDetails, ActivityKind, ActivitySession, BabyId, SessionId};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    sessions: Vec<ActivitySession>,
}

#[derive(Default)]
struct Inner {
    table: SessionTable,
    subscribers: Subscribers,
}

pub struct FileStore {
    path: PathBuf,
    lock_wait: Duration,
    inner: Mutex<Inner>,
}

impl FileStore {
    /// Opens the store at `path`. A missing or empty file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let table = read_table(path)?;
        tracing::debug!(path = %path.display(), sessions = table.len(), "Opened session file");
        Ok(FileStore {
            path: path.to_path_buf(),
            lock_wait: LOCK_WAIT,
            inner: Mutex::new(Inner {
                table,
                subscribers: Subscribers::default(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file and pushes a snapshot to subscribers if anything
    /// changed. Returns whether it did.
    pub fn refresh(&self) -> Result<bool> {
        let fresh = read_table(&self.path)?;
        let mut inner = self.lock();
        if fresh == inner.table {
            return Ok(false);
        }
        inner.table = fresh;
        let Inner { table, subscribers } = &mut *inner;
        subscribers.broadcast(table);
        Ok(true)
    }

    pub fn sessions(&self) -> Vec<ActivitySession> {
        self.lock().table.all().cloned().collect()
    }

    /// Under the write lock: reloads, applies `change`, persists. Publishes
    /// after the lock is released.
    fn mutate<T>(&self, change: impl FnOnce(&mut SessionTable) -> Result<T>) -> Result<T> {
        let mut inner = self.lock();
        let file_lock = WriteLock::acquire(&self.path, self.lock_wait)?;
        let mut table = read_table(&self.path)?;
        let value = change(&mut table)?;
        write_table(&self.path, &table)?;
        drop(file_lock);
        inner.table = table;
        let Inner { table, subscribers } = &mut *inner;
        subscribers.broadcast(table);
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for FileStore {
    fn subscribe(&self, baby_id: &BabyId, kind: ActivityKind) -> Result<Subscription> {
        let mut inner = self.lock();
        let Inner { table, subscribers } = &mut *inner;
        Ok(subscribers.add(table, baby_id, kind))
    }

    fn create_session(
        &self,
        baby_id: &BabyId,
        details: &ActivityDetails,
        start_time: DateTime<Utc>,
    ) -> Result<SessionId> {
        let id = self.mutate(|table| Ok(table.insert_started(baby_id, details, start_time)))?;
        tracing::info!(session_id = %id, baby_id = %baby_id, kind = %details.kind(), "Session created");
        Ok(id)
    }

    fn end_session(
        &self,
        session_id: &SessionId,
        end_time: DateTime<Utc>,
        edits: &SessionEdits,
    ) -> Result<()> {
        self.mutate(|table| table.finish(session_id, end_time, edits))?;
        tracing::info!(session_id = %session_id, end_time = %end_time.to_rfc3339(), "Session ended");
        Ok(())
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        self.mutate(|table| table.remove(session_id).map(|_| ()))?;
        tracing::info!(session_id = %session_id, "Session deleted");
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<SessionTable> {
    if !path.exists() {
        return Ok(SessionTable::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| RoutineError::Io {
        context: "Failed to read session file".to_string(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(SessionTable::default());
    }

    let file: StoreFile = serde_json::from_str(&content).map_err(|source| RoutineError::Json {
        context: format!("Failed to parse session file {}", path.display()),
        source,
    })?;
    if file.version != STORE_VERSION {
        return Err(RoutineError::ConfigMalformed {
            path: path.to_path_buf(),
            details: format!(
                "unsupported session file version {} (expected {})",
                file.version, STORE_VERSION
            ),
        });
    }
    Ok(SessionTable::from_sessions(file.sessions))
}

fn write_table(path: &Path, table: &SessionTable) -> Result<()> {
    let file = StoreFile {
        version: STORE_VERSION,
        sessions: table.all().cloned().collect(),
    };
    let content = serde_json::to_string_pretty(&file).map_err(|source| RoutineError::Json {
        context: "Failed to serialize session file".to_string(),
        source,
    })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs_err::create_dir_all(dir).map_err(|source| RoutineError::Io {
        context: "Failed to create session file directory".to_string(),
        source,
    })?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| RoutineError::Io {
        context: "Failed to create temp file".to_string(),
        source,
    })?;
    tmp.write_all(content.as_bytes())
        .map_err(|source| RoutineError::Io {
            context: "Failed to write temp file".to_string(),
            source,
        })?;
    tmp.flush().map_err(|source| RoutineError::Io {
        context: "Failed to flush temp file".to_string(),
        source,
    })?;
    tmp.persist(path).map_err(|err| RoutineError::Io {
        context: "Failed to persist session file".to_string(),
        source: err.error,
    })?;
    Ok(())
}
