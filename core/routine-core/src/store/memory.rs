//! In-process session store.
//!
//! Backs tests and embedded hosts. Every call is logged to a history so tests
//! can assert which collaborator calls happened, and any operation can be made
//! to fail once with [`MemoryStore::fail_next`].

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{SessionEdits, SessionStore, SessionTable, Subscribers, Subscription};
use crate::error::{Result, RoutineError, StoreOp};
use crate::types::{ActivityDetails, ActivityKind, ActivitySession, BabyId, SessionId};

/// A collaborator call as seen by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Subscribe {
        baby_id: BabyId,
        kind: ActivityKind,
    },
    Create {
        baby_id: BabyId,
        kind: ActivityKind,
        start_time: DateTime<Utc>,
    },
    End {
        session_id: SessionId,
        end_time: DateTime<Utc>,
        edits: SessionEdits,
    },
    Delete {
        session_id: SessionId,
    },
}

#[derive(Default)]
struct Inner {
    table: SessionTable,
    subscribers: Subscribers,
    history: Vec<StoreCall>,
    failing: HashSet<StoreOp>,
}

impl Inner {
    fn take_failure(&mut self, op: StoreOp) -> Result<()> {
        if self.failing.remove(&op) {
            return Err(RoutineError::collaborator(op, "simulated failure"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with sessions (e.g. one left running by an earlier
    /// app instance).
    pub fn with_sessions(sessions: impl IntoIterator<Item = ActivitySession>) -> Self {
        MemoryStore {
            inner: Mutex::new(Inner {
                table: SessionTable::from_sessions(sessions),
                ..Inner::default()
            }),
        }
    }

    /// Makes the next call of `op` fail with a collaborator error.
    pub fn fail_next(&self, op: StoreOp) {
        self.lock().failing.insert(op);
    }

    /// Every call received so far, oldest first.
    pub fn history(&self) -> Vec<StoreCall> {
        self.lock().history.clone()
    }

    pub fn get(&self, session_id: &SessionId) -> Option<ActivitySession> {
        self.lock().table.get(session_id).cloned()
    }

    pub fn sessions(&self) -> Vec<ActivitySession> {
        self.lock().table.all().cloned().collect()
    }

    /// Inserts or replaces a document as another device would, and notifies
    /// subscribers.
    pub fn put(&self, session: ActivitySession) {
        let mut inner = self.lock();
        inner.table.upsert(session);
        let Inner {
            table, subscribers, ..
        } = &mut *inner;
        subscribers.broadcast(table);
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn subscribe(&self, baby_id: &BabyId, kind: ActivityKind) -> Result<Subscription> {
        let mut inner = self.lock();
        inner.history.push(StoreCall::Subscribe {
            baby_id: baby_id.clone(),
            kind,
        });
        inner.take_failure(StoreOp::Subscribe)?;
        let Inner {
            table, subscribers, ..
        } = &mut *inner;
        Ok(subscribers.add(table, baby_id, kind))
    }

    fn create_session(
        &self,
        baby_id: &BabyId,
        details: &ActivityDetails,
        start_time: DateTime<Utc>,
    ) -> Result<SessionId> {
        let mut inner = self.lock();
        inner.history.push(StoreCall::Create {
            baby_id: baby_id.clone(),
            kind: details.kind(),
            start_time,
        });
        inner.take_failure(StoreOp::Create)?;
        let Inner {
            table, subscribers, ..
        } = &mut *inner;
        let id = table.insert_started(baby_id, details, start_time);
        subscribers.broadcast(table);
        Ok(id)
    }

    fn end_session(
        &self,
        session_id: &SessionId,
        end_time: DateTime<Utc>,
        edits: &SessionEdits,
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.history.push(StoreCall::End {
            session_id: session_id.clone(),
            end_time,
            edits: edits.clone(),
        });
        inner.take_failure(StoreOp::End)?;
        let Inner {
            table, subscribers, ..
        } = &mut *inner;
        table.finish(session_id, end_time, edits)?;
        subscribers.broadcast(table);
        Ok(())
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let mut inner = self.lock();
        inner.history.push(StoreCall::Delete {
            session_id: session_id.clone(),
        });
        inner.take_failure(StoreOp::Delete)?;
        let Inner {
            table, subscribers, ..
        } = &mut *inner;
        table.remove(session_id)?;
        subscribers.broadcast(table);
        Ok(())
    }
}
