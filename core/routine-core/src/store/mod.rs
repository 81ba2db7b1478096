//! The persistence collaborator the timer core talks to.
//!
//! The core never owns session documents. It subscribes to the sessions of one
//! (child, activity kind) pair and asks the store to create, finish or delete
//! them. Consistency is whatever the store offers; both reference stores here
//! are last-write-wins.
//!
//! # Module Structure
//!
//! - [`memory`]: in-process store with failure injection and a call log
//! - [`file`]: JSON document on disk, shared between processes by re-reading
//! - [`lock`]: lock file serialising writers to the JSON document
//!
//! Both share [`SessionTable`] for the document map and [`Subscribers`] for
//! push delivery.

mod file;
mod lock;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, StoreCall};

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use chrono::{DateTime, Utc};

use crate::error::{Result, RoutineError};
use crate::types::{elapsed_between, ActivityDetails, ActivityKind, ActivitySession, BabyId, SessionId};

/// Fields written alongside `end_time` when a session is finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionEdits {
    /// Replaces `start_time` (edit-before-saving).
    pub start_time: Option<DateTime<Utc>>,
    /// Replaces the activity-specific fields. Must be the same kind.
    pub details: Option<ActivityDetails>,
    pub notes: Option<String>,
}

/// Collaborator contract for one backend.
///
/// Methods take `&self`; implementations synchronise internally so one store
/// can back several views (tabs, devices) at once.
pub trait SessionStore: Send + Sync {
    /// Push subscription to the sessions of one child and activity kind.
    /// The initial snapshot is available on the returned subscription
    /// immediately.
    fn subscribe(&self, baby_id: &BabyId, kind: ActivityKind) -> Result<Subscription>;

    /// Creates an active session starting at `start_time`.
    fn create_session(
        &self,
        baby_id: &BabyId,
        details: &ActivityDetails,
        start_time: DateTime<Utc>,
    ) -> Result<SessionId>;

    /// Finishes a session. Duration is derived from `end_time - start_time`.
    fn end_session(
        &self,
        session_id: &SessionId,
        end_time: DateTime<Utc>,
        edits: &SessionEdits,
    ) -> Result<()>;

    fn delete_session(&self, session_id: &SessionId) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ═══════════════════════════════════════════════════════════════════════════════

pub type Snapshot = Vec<ActivitySession>;

/// Receiving end of a store subscription. Dropping it detaches the listener.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<Snapshot>,
    closed: bool,
}

impl Subscription {
    /// Drains pending snapshots and returns the newest, if any arrived.
    pub fn latest(&mut self) -> Option<Snapshot> {
        let mut newest = None;
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => newest = Some(snapshot),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        tracing::debug!("Session subscription closed by store");
                    }
                    self.closed = true;
                    break;
                }
            }
        }
        newest
    }

    /// True once the store side has gone away.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

struct Subscriber {
    baby_id: BabyId,
    kind: ActivityKind,
    tx: Sender<Snapshot>,
}

/// Registered listeners of a store.
#[derive(Default)]
pub struct Subscribers {
    list: Vec<Subscriber>,
}

impl Subscribers {
    /// Registers a listener and queues its initial snapshot.
    pub fn add(&mut self, table: &SessionTable, baby_id: &BabyId, kind: ActivityKind) -> Subscription {
        let (tx, rx) = mpsc::channel();
        // Receiver is alive here, send cannot fail.
        let _ = tx.send(table.snapshot_for(baby_id, kind));
        self.list.push(Subscriber {
            baby_id: baby_id.clone(),
            kind,
            tx,
        });
        Subscription { rx, closed: false }
    }

    /// Pushes a fresh snapshot to every listener and prunes detached ones.
    pub fn broadcast(&mut self, table: &SessionTable) {
        self.list.retain(|subscriber| {
            subscriber
                .tx
                .send(table.snapshot_for(&subscriber.baby_id, subscriber.kind))
                .is_ok()
        });
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Table
// ═══════════════════════════════════════════════════════════════════════════════

/// Session documents keyed by id. Pure data, no locking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTable {
    sessions: BTreeMap<SessionId, ActivitySession>,
}

impl SessionTable {
    pub fn from_sessions(sessions: impl IntoIterator<Item = ActivitySession>) -> Self {
        SessionTable {
            sessions: sessions
                .into_iter()
                .map(|session| (session.id().clone(), session))
                .collect(),
        }
    }

    pub fn get(&self, session_id: &SessionId) -> Option<&ActivitySession> {
        self.sessions.get(session_id)
    }

    pub fn all(&self) -> impl Iterator<Item = &ActivitySession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions of one child and kind, oldest start first.
    pub fn snapshot_for(&self, baby_id: &BabyId, kind: ActivityKind) -> Snapshot {
        let mut sessions: Vec<ActivitySession> = self
            .sessions
            .values()
            .filter(|session| &session.base.baby_id == baby_id && session.kind() == kind)
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.base.start_time);
        sessions
    }

    pub fn insert_started(
        &mut self,
        baby_id: &BabyId,
        details: &ActivityDetails,
        start_time: DateTime<Utc>,
    ) -> SessionId {
        let id = SessionId::generate();
        let session = ActivitySession::started(id.clone(), baby_id.clone(), details.clone(), start_time);
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Marks a session finished. Finishing an already finished session
    /// overwrites it (last write wins).
    pub fn finish(
        &mut self,
        session_id: &SessionId,
        end_time: DateTime<Utc>,
        edits: &SessionEdits,
    ) -> Result<()> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RoutineError::SessionNotFound(session_id.clone()))?;

        if let Some(details) = &edits.details {
            if details.kind() != session.kind() {
                return Err(RoutineError::invalid_override(
                    "details",
                    format!(
                        "{} details cannot be saved on a {} session",
                        details.kind(),
                        session.kind()
                    ),
                ));
            }
            session.details = details.clone();
        }
        if let Some(start_time) = edits.start_time {
            session.base.start_time = start_time;
        }
        if let Some(notes) = &edits.notes {
            session.base.notes = Some(notes.clone());
        }

        session.base.end_time = Some(end_time);
        session.base.duration = elapsed_between(session.base.start_time, end_time);
        session.base.is_active = false;
        Ok(())
    }

    /// Inserts or replaces a document wholesale.
    pub fn upsert(&mut self, session: ActivitySession) {
        self.sessions.insert(session.id().clone(), session);
    }

    pub fn remove(&mut self, session_id: &SessionId) -> Result<ActivitySession> {
        self.sessions
            .remove(session_id)
            .ok_or_else(|| RoutineError::SessionNotFound(session_id.clone()))
    }

    pub fn into_sessions(self) -> impl Iterator<Item = ActivitySession> {
        self.sessions.into_values()
    }
}

/// Picks the session to resume from a snapshot.
///
/// More than one active session for the same child and kind is possible
/// (two devices starting at once). The most recent `start_time` wins.
pub fn select_active(sessions: &[ActivitySession]) -> Option<&ActivitySession> {
    let mut active = sessions.iter().filter(|session| session.is_active());
    let first = active.next()?;
    let mut ignored = Vec::new();
    let mut best = first;
    for candidate in active {
        if candidate.base.start_time > best.base.start_time {
            ignored.push(best.id().clone());
            best = candidate;
        } else {
            ignored.push(candidate.id().clone());
        }
    }
    if !ignored.is_empty() {
        tracing::warn!(
            chosen = %best.id(),
            ignored = ?ignored,
            "Multiple active sessions; showing the most recent"
        );
    }
    Some(best)
}
