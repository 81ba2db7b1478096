//! Active-session reconciliation.
//!
//! A [`Reconciler`] owns the stopwatch of one (child, activity kind) pair and
//! keeps it consistent with the sessions the store reports. In-memory elapsed
//! time is never trusted across a suspension: every discovery recomputes
//! `now - start_time` and re-primes the stopwatch.
//!
//! # State Machine
//!
//! ```text
//!            discover active / start()
//!   Idle ───────────────────────────────▶ Running
//!    ▲                                    │   ▲
//!    │ save() ok / discard() ok   stop()  │   │ resume()
//!    │                                    ▼   │
//!    └─────────────────────────────────── Ended
//! ```
//!
//! `Running` covers both a session resumed from the store and one this view
//! just created. Failed collaborator calls leave the phase untouched.
//!
//! # Ordering
//!
//! A session created here is *unconfirmed* until a snapshot lists it. A
//! snapshot without an unconfirmed session was produced before the create and
//! is not read as "ended elsewhere". Once confirmed, disappearing from the
//! active set means another device finished or deleted it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, RoutineError};
use crate::format::{parse_duration_input, parse_start_input};
use crate::stopwatch::Stopwatch;
use crate::store::{select_active, SessionEdits, SessionStore, Snapshot, Subscription};
use crate::types::{elapsed_between, ActivityDetails, ActivityKind, ActivitySession, BabyId, SessionId};

/// Edited durations longer than this are rejected.
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// The session a view is currently timing.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSession {
    pub id: SessionId,
    pub start_time: DateTime<Utc>,
    pub details: ActivityDetails,
    /// Seen in a store snapshot at least once.
    pub confirmed: bool,
}

impl TrackedSession {
    fn from_document(session: &ActivitySession) -> Self {
        TrackedSession {
            id: session.id().clone(),
            start_time: session.base.start_time,
            details: session.details.clone(),
            confirmed: true,
        }
    }
}

/// Form contents for the edit-before-saving step, as the user typed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveDraft {
    pub duration: Option<String>,
    pub start_time: Option<String>,
    pub details: Option<ActivityDetails>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Running {
        session: TrackedSession,
    },
    Ended {
        session: TrackedSession,
        final_elapsed: u64,
        /// Last draft submitted, kept across failed saves.
        draft: SaveDraft,
        /// The store no longer lists the session as active.
        remote_missing: bool,
    },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running { .. } => "running",
            Phase::Ended { .. } => "ended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved {
        session_id: SessionId,
        end_time: DateTime<Utc>,
        duration_secs: u64,
    },
    /// Nothing left to finish remotely; local state was cleared.
    ClearedLocally,
}

/// What a snapshot means for the current phase.
enum Discovery {
    Nothing,
    Resume(ActivitySession),
    Resync {
        start_time: DateTime<Utc>,
        details: ActivityDetails,
    },
    /// A newer active session of the same kind appeared.
    Superseded(ActivitySession),
    EndedElsewhere(Option<ActivitySession>),
    EndedFormMissing(bool),
}

pub struct Reconciler {
    baby_id: BabyId,
    kind: ActivityKind,
    store: Arc<dyn SessionStore>,
    subscription: Option<Subscription>,
    latest: Option<Snapshot>,
    phase: Phase,
    stopwatch: Stopwatch,
}

impl Reconciler {
    pub fn new(
        baby_id: BabyId,
        kind: ActivityKind,
        store: Arc<dyn SessionStore>,
        stopwatch: Stopwatch,
    ) -> Self {
        Reconciler {
            baby_id,
            kind,
            store,
            subscription: None,
            latest: None,
            phase: Phase::Idle,
            stopwatch,
        }
    }

    pub fn baby_id(&self) -> &BabyId {
        &self.baby_id
    }

    pub fn kind(&self) -> ActivityKind {
        self.kind
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn elapsed(&self) -> u64 {
        self.stopwatch.elapsed()
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// The session being timed or awaiting save.
    pub fn active_session(&self) -> Option<&TrackedSession> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Running { session } | Phase::Ended { session, .. } => Some(session),
        }
    }

    pub fn on_tick(&mut self, callback: impl FnMut(u64) + Send + 'static) {
        self.stopwatch.on_tick(callback);
    }

    /// Subscribes (once) and runs discovery on the initial snapshot.
    pub fn mount(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.subscription.is_none() {
            let subscription = self.store.subscribe(&self.baby_id, self.kind).map_err(|err| {
                tracing::warn!(error = %err, baby_id = %self.baby_id, kind = %self.kind, "Subscribe failed");
                err
            })?;
            self.subscription = Some(subscription);
        }
        self.reconcile(now);
        Ok(())
    }

    /// Applies the newest pending snapshot, if any. Returns whether one arrived.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        let Some(snapshot) = self.subscription.as_mut().and_then(Subscription::latest) else {
            return false;
        };
        self.latest = Some(snapshot);
        self.apply(now);
        true
    }

    /// Re-entry after mount or a visibility restore: drain the subscription
    /// and recompute elapsed from the persisted start time either way.
    pub fn reconcile(&mut self, now: DateTime<Utc>) {
        if !self.poll(now) {
            self.apply(now);
        }
    }

    /// Feeds host time to the stopwatch. Returns ticks fired.
    pub fn advance(&mut self, delta: StdDuration) -> u64 {
        self.stopwatch.advance(delta)
    }

    fn apply(&mut self, now: DateTime<Utc>) {
        match self.discover() {
            Discovery::Nothing => {}
            Discovery::Resume(session) => self.resume_from(&session, now),
            Discovery::Resync {
                start_time,
                details,
            } => {
                if let Phase::Running { session } = &mut self.phase {
                    session.confirmed = true;
                    session.start_time = start_time;
                    session.details = details;
                }
                let elapsed = elapsed_between(start_time, now);
                self.stopwatch.initialize(Some(elapsed), true);
            }
            Discovery::Superseded(newer) => {
                tracing::warn!(newer = %newer.id(), kind = %self.kind, "Newer active session found; switching");
                self.clear();
                self.resume_from(&newer, now);
            }
            Discovery::EndedElsewhere(replacement) => {
                if let Some(session) = self.active_session() {
                    tracing::info!(session_id = %session.id, kind = %self.kind, "Session ended elsewhere");
                }
                self.clear();
                if let Some(session) = replacement {
                    self.resume_from(&session, now);
                }
            }
            Discovery::EndedFormMissing(missing) => {
                if let Phase::Ended {
                    session,
                    remote_missing,
                    ..
                } = &mut self.phase
                {
                    if !missing {
                        session.confirmed = true;
                    }
                    *remote_missing = missing;
                }
            }
        }
    }

    fn discover(&self) -> Discovery {
        let Some(snapshot) = self.latest.as_ref() else {
            return Discovery::Nothing;
        };
        let candidate = select_active(snapshot);

        match &self.phase {
            Phase::Idle => match candidate {
                Some(session) => Discovery::Resume(session.clone()),
                None => Discovery::Nothing,
            },
            Phase::Running { session } => {
                let ours = snapshot
                    .iter()
                    .find(|doc| doc.id() == &session.id && doc.is_active());
                match (ours, candidate) {
                    (Some(_), Some(newest)) if newest.id() != &session.id => {
                        Discovery::Superseded(newest.clone())
                    }
                    (Some(doc), _) => Discovery::Resync {
                        start_time: doc.base.start_time,
                        details: doc.details.clone(),
                    },
                    (None, _) if !session.confirmed => {
                        tracing::debug!(session_id = %session.id, "Snapshot predates create; keeping timer");
                        Discovery::Nothing
                    }
                    (None, replacement) => Discovery::EndedElsewhere(replacement.cloned()),
                }
            }
            Phase::Ended { session, .. } => {
                let present = snapshot
                    .iter()
                    .any(|doc| doc.id() == &session.id && doc.is_active());
                if present {
                    Discovery::EndedFormMissing(false)
                } else if session.confirmed {
                    Discovery::EndedFormMissing(true)
                } else {
                    Discovery::Nothing
                }
            }
        }
    }

    fn resume_from(&mut self, session: &ActivitySession, now: DateTime<Utc>) {
        let elapsed = session.elapsed_at(now);
        tracing::info!(
            session_id = %session.id(),
            kind = %self.kind,
            elapsed_secs = elapsed,
            "Resuming active session"
        );
        self.phase = Phase::Running {
            session: TrackedSession::from_document(session),
        };
        self.stopwatch.reset();
        self.stopwatch.initialize(Some(elapsed), true);
    }

    fn clear(&mut self) {
        self.phase = Phase::Idle;
        self.stopwatch.reset();
    }

    fn invalid(&self, action: &'static str) -> RoutineError {
        RoutineError::InvalidTransition {
            action,
            phase: self.phase.name(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // User Actions
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a new active session and starts timing it immediately, without
    /// waiting for the subscription to report it.
    pub fn start(&mut self, details: ActivityDetails, now: DateTime<Utc>) -> Result<SessionId> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(self.invalid("start"));
        }
        if details.kind() != self.kind {
            return Err(RoutineError::invalid_override(
                "details",
                format!("cannot start a {} session from the {} timer", details.kind(), self.kind),
            ));
        }

        let id = self
            .store
            .create_session(&self.baby_id, &details, now)
            .map_err(|err| {
                tracing::warn!(error = %err, kind = %self.kind, "Create session failed");
                err
            })?;

        tracing::info!(session_id = %id, kind = %self.kind, baby_id = %self.baby_id, "Session started");
        self.phase = Phase::Running {
            session: TrackedSession {
                id: id.clone(),
                start_time: now,
                details,
                confirmed: false,
            },
        };
        self.stopwatch.reset();
        self.stopwatch.initialize(Some(0), true);
        Ok(id)
    }

    /// Stops timing and moves to the save/discard form. No remote write.
    pub fn stop(&mut self) -> Result<u64> {
        let session = match &self.phase {
            Phase::Running { session } => session.clone(),
            _ => return Err(self.invalid("stop")),
        };
        let final_elapsed = self.stopwatch.stop();
        tracing::info!(session_id = %session.id, final_elapsed, "Timer stopped");
        self.phase = Phase::Ended {
            session,
            final_elapsed,
            draft: SaveDraft::default(),
            remote_missing: false,
        };
        Ok(final_elapsed)
    }

    /// Leaves the form without saving and keeps timing from the same value.
    pub fn resume(&mut self) -> Result<()> {
        let session = match &self.phase {
            Phase::Ended { session, .. } => session.clone(),
            _ => return Err(self.invalid("resume")),
        };
        self.phase = Phase::Running { session };
        self.stopwatch.start();
        Ok(())
    }

    /// Finishes the session through the store. Validation happens before any
    /// remote call; a failed call keeps the form (and `draft`) for a retry.
    pub fn save(&mut self, draft: SaveDraft, now: DateTime<Utc>) -> Result<SaveOutcome> {
        let (session, final_elapsed, remote_missing) = match &mut self.phase {
            Phase::Ended {
                session,
                final_elapsed,
                draft: kept,
                remote_missing,
            } => {
                *kept = draft.clone();
                (session.clone(), *final_elapsed, *remote_missing)
            }
            _ => return Err(self.invalid("save")),
        };

        let (end_time, edits) = build_edits(&session, final_elapsed, &draft, now)?;

        if remote_missing {
            tracing::info!(session_id = %session.id, "Session already gone; clearing timer locally");
            self.clear();
            return Ok(SaveOutcome::ClearedLocally);
        }

        match self.store.end_session(&session.id, end_time, &edits) {
            Ok(()) => {
                let start = edits.start_time.unwrap_or(session.start_time);
                self.clear();
                Ok(SaveOutcome::Saved {
                    session_id: session.id,
                    end_time,
                    duration_secs: elapsed_between(start, end_time),
                })
            }
            Err(RoutineError::SessionNotFound(_)) => {
                tracing::info!(session_id = %session.id, "Session missing on save; clearing timer locally");
                self.clear();
                Ok(SaveOutcome::ClearedLocally)
            }
            Err(err) => {
                tracing::warn!(error = %err, session_id = %session.id, "End session failed");
                Err(err)
            }
        }
    }

    /// Deletes the session (from the form, or straight from a running timer).
    pub fn discard(&mut self) -> Result<()> {
        let session_id = match &self.phase {
            Phase::Running { session } | Phase::Ended { session, .. } => session.id.clone(),
            Phase::Idle => return Err(self.invalid("discard")),
        };

        match self.store.delete_session(&session_id) {
            Ok(()) => {
                tracing::info!(session_id = %session_id, "Session discarded");
                self.clear();
                Ok(())
            }
            Err(RoutineError::SessionNotFound(_)) => {
                tracing::info!(session_id = %session_id, "Session already gone on discard");
                self.clear();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, session_id = %session_id, "Delete session failed");
                Err(err)
            }
        }
    }

    /// Detaches the subscription and tears down the stopwatch.
    pub fn dispose(&mut self) {
        self.subscription = None;
        self.stopwatch.dispose();
    }
}

fn build_edits(
    session: &TrackedSession,
    final_elapsed: u64,
    draft: &SaveDraft,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, SessionEdits)> {
    let start_override = draft
        .start_time
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(|value| parse_start_input(value, now))
        .transpose()?;
    let duration_override = draft
        .duration
        .as_deref()
        .map(parse_duration_input)
        .transpose()?;

    if let Some(details) = &draft.details {
        if details.kind() != session.details.kind() {
            return Err(RoutineError::invalid_override(
                "details",
                format!(
                    "{} details cannot be saved on a {} session",
                    details.kind(),
                    session.details.kind()
                ),
            ));
        }
    }

    if duration_override.is_some_and(|secs| secs > MAX_DURATION_SECS) {
        return Err(RoutineError::invalid_override(
            "duration",
            "is longer than a week",
        ));
    }
    let duration = duration_override.unwrap_or(final_elapsed);
    let start = start_override.unwrap_or(session.start_time);
    let end_time = start + Duration::seconds(duration as i64);
    let edited = start_override.is_some() || duration_override.is_some();
    if edited && end_time > now {
        return Err(RoutineError::invalid_override(
            "duration",
            "would end in the future",
        ));
    }

    Ok((
        end_time,
        SessionEdits {
            start_time: start_override,
            details: draft.details.clone(),
            notes: draft
                .notes
                .as_ref()
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreOp;
    use crate::store::{MemoryStore, StoreCall};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 7, 0, 0).unwrap()
    }

    fn ada() -> BabyId {
        BabyId::new("ada")
    }

    fn walk_doc(id: &str, start: DateTime<Utc>) -> ActivitySession {
        ActivitySession::started(
            SessionId::new(id),
            ada(),
            ActivityKind::Walk.default_details(),
            start,
        )
    }

    fn reconciler(store: &Arc<MemoryStore>) -> Reconciler {
        Reconciler::new(
            ada(),
            ActivityKind::Walk,
            Arc::clone(store) as Arc<dyn SessionStore>,
            Stopwatch::new(),
        )
    }

    #[test]
    fn mount_resumes_persisted_session_with_true_elapsed() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);

        reconciler.mount(t0() + Duration::seconds(125)).unwrap();

        assert_eq!(reconciler.phase().name(), "running");
        assert_eq!(reconciler.elapsed(), 125);
        assert!(reconciler.stopwatch().is_running());
        assert!(reconciler.active_session().unwrap().confirmed);
    }

    #[test]
    fn mount_without_active_session_stays_idle() {
        let mut finished = walk_doc("w1", t0());
        finished.base.is_active = false;
        finished.base.end_time = Some(t0() + Duration::seconds(30));
        let store = Arc::new(MemoryStore::with_sessions([finished]));
        let mut reconciler = reconciler(&store);

        reconciler.mount(t0() + Duration::seconds(60)).unwrap();
        assert_eq!(reconciler.phase(), &Phase::Idle);
        assert_eq!(reconciler.elapsed(), 0);
    }

    #[test]
    fn subscribe_failure_is_returned() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(StoreOp::Subscribe);
        let mut reconciler = reconciler(&store);

        assert!(reconciler.mount(t0()).is_err());
        assert!(!reconciler.is_mounted());
        reconciler.mount(t0()).unwrap();
        assert!(reconciler.is_mounted());
    }

    #[test]
    fn reconcile_recomputes_from_start_time_after_suspension() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0() + Duration::seconds(10)).unwrap();
        reconciler.advance(StdDuration::from_secs(2));
        assert_eq!(reconciler.elapsed(), 12);

        // Host was suspended for an hour; no ticks were delivered.
        reconciler.reconcile(t0() + Duration::seconds(3612));
        assert_eq!(reconciler.elapsed(), 3612);
    }

    #[test]
    fn start_primes_immediately_and_confirms_on_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0()).unwrap();

        let id = reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();
        assert_eq!(reconciler.elapsed(), 0);
        assert!(reconciler.stopwatch().is_running());
        assert!(!reconciler.active_session().unwrap().confirmed);

        reconciler.advance(StdDuration::from_secs(3));
        assert!(reconciler.poll(t0() + Duration::seconds(3)));
        let session = reconciler.active_session().unwrap();
        assert_eq!(session.id, id);
        assert!(session.confirmed);
        assert_eq!(reconciler.elapsed(), 3);
    }

    #[test]
    fn stale_snapshot_does_not_end_unconfirmed_session() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0()).unwrap();
        reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();

        // A snapshot produced before the create lands late.
        reconciler.latest = Some(Vec::new());
        reconciler.apply(t0() + Duration::seconds(1));

        assert_eq!(reconciler.phase().name(), "running");
    }

    #[test]
    fn confirmed_session_ended_elsewhere_returns_to_idle() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0() + Duration::seconds(30)).unwrap();

        store
            .end_session(
                &SessionId::new("w1"),
                t0() + Duration::seconds(40),
                &SessionEdits::default(),
            )
            .unwrap();
        reconciler.poll(t0() + Duration::seconds(41));

        assert_eq!(reconciler.phase(), &Phase::Idle);
        assert_eq!(reconciler.elapsed(), 0);
    }

    #[test]
    fn newer_active_session_from_another_device_takes_over() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0() + Duration::seconds(100)).unwrap();

        store.put(walk_doc("w2", t0() + Duration::seconds(90)));
        reconciler.poll(t0() + Duration::seconds(100));

        assert_eq!(reconciler.active_session().unwrap().id, SessionId::new("w2"));
        assert_eq!(reconciler.elapsed(), 10);
    }

    #[test]
    fn remote_start_time_edit_resyncs_beyond_tolerance() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0() + Duration::seconds(60)).unwrap();

        let mut edited = walk_doc("w1", t0() - Duration::seconds(600));
        edited.base.notes = Some("started earlier".to_string());
        store.put(edited);
        reconciler.poll(t0() + Duration::seconds(60));

        assert_eq!(reconciler.elapsed(), 660);
        assert_eq!(
            reconciler.active_session().unwrap().start_time,
            t0() - Duration::seconds(600)
        );
    }

    #[test]
    fn start_is_rejected_unless_idle() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0()).unwrap();

        let err = reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot start while the timer is running");
    }

    #[test]
    fn start_rejects_details_of_another_kind() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        let err = reconciler
            .start(ActivityKind::Pump.default_details(), t0())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.history().is_empty());
    }

    #[test]
    fn failed_create_stays_idle() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(StoreOp::Create);
        let mut reconciler = reconciler(&store);

        assert!(reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .is_err());
        assert_eq!(reconciler.phase(), &Phase::Idle);
        assert!(!reconciler.stopwatch().is_running());
    }

    #[test]
    fn resume_after_stop_keeps_elapsed_without_writing() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();
        reconciler.advance(StdDuration::from_secs(20));

        assert_eq!(reconciler.stop().unwrap(), 20);
        reconciler.advance(StdDuration::from_secs(5));
        reconciler.resume().unwrap();
        reconciler.advance(StdDuration::from_secs(1));

        assert_eq!(reconciler.elapsed(), 21);
        assert!(store
            .history()
            .iter()
            .all(|call| matches!(call, StoreCall::Create { .. })));
    }

    #[test]
    fn save_ends_session_at_start_plus_elapsed() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        let id = reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();
        reconciler.advance(StdDuration::from_secs(65));
        reconciler.stop().unwrap();

        let outcome = reconciler
            .save(SaveDraft::default(), t0() + Duration::seconds(90))
            .unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                session_id: id.clone(),
                end_time: t0() + Duration::seconds(65),
                duration_secs: 65,
            }
        );
        assert_eq!(reconciler.phase(), &Phase::Idle);
        assert_eq!(store.get(&id).unwrap().base.duration, 65);
    }

    #[test]
    fn invalid_override_is_rejected_before_remote_call() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();
        reconciler.stop().unwrap();

        let draft = SaveDraft {
            duration: Some("ten".to_string()),
            ..SaveDraft::default()
        };
        let err = reconciler.save(draft.clone(), t0()).unwrap_err();

        assert!(err.is_validation());
        assert!(!store
            .history()
            .iter()
            .any(|call| matches!(call, StoreCall::End { .. })));
        match reconciler.phase() {
            Phase::Ended { draft: kept, .. } => assert_eq!(kept, &draft),
            other => panic!("expected ended, got {}", other.name()),
        }
    }

    #[test]
    fn overrides_change_start_and_duration() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        let id = reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();
        reconciler.stop().unwrap();

        let draft = SaveDraft {
            duration: Some("30".to_string()),
            start_time: Some("2026-10-16T06:00:00Z".to_string()),
            notes: Some("  park loop ".to_string()),
            ..SaveDraft::default()
        };
        let outcome = reconciler.save(draft, t0()).unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                session_id: id.clone(),
                end_time: t0() - Duration::minutes(30),
                duration_secs: 1800,
            }
        );
        let saved = store.get(&id).unwrap();
        assert_eq!(saved.base.start_time, t0() - Duration::hours(1));
        assert_eq!(saved.base.notes.as_deref(), Some("park loop"));
    }

    #[test]
    fn override_ending_in_the_future_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();
        reconciler.stop().unwrap();

        let draft = SaveDraft {
            duration: Some("2h".to_string()),
            ..SaveDraft::default()
        };
        assert!(reconciler
            .save(draft, t0() + Duration::minutes(5))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn failed_save_stays_ended_for_retry() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();
        reconciler.advance(StdDuration::from_secs(42));
        reconciler.stop().unwrap();
        store.fail_next(StoreOp::End);

        assert!(reconciler.save(SaveDraft::default(), t0()).is_err());
        assert_eq!(reconciler.phase().name(), "ended");
        assert_eq!(reconciler.elapsed(), 42);

        let retry = reconciler
            .save(SaveDraft::default(), t0() + Duration::seconds(50))
            .unwrap();
        assert!(matches!(retry, SaveOutcome::Saved { duration_secs: 42, .. }));
    }

    #[test]
    fn save_after_remote_delete_clears_locally() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0() + Duration::seconds(20)).unwrap();
        reconciler.stop().unwrap();

        store.delete_session(&SessionId::new("w1")).unwrap();
        reconciler.poll(t0() + Duration::seconds(21));
        let calls_before = store.history().len();

        let outcome = reconciler
            .save(SaveDraft::default(), t0() + Duration::seconds(22))
            .unwrap();
        assert_eq!(outcome, SaveOutcome::ClearedLocally);
        assert_eq!(store.history().len(), calls_before);
        assert_eq!(reconciler.phase(), &Phase::Idle);
    }

    #[test]
    fn unedited_save_of_week_long_night_sleep_is_saved() {
        let night = ActivitySession::started(
            SessionId::new("n1"),
            ada(),
            ActivityDetails::Sleep {
                sleep_type: crate::types::SleepType::Night,
            },
            t0(),
        );
        let store = Arc::new(MemoryStore::with_sessions([night]));
        let mut reconciler = Reconciler::new(
            ada(),
            ActivityKind::Sleep,
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Stopwatch::new(),
        );
        let eight_days = 8 * 24 * 3600;
        let now = t0() + Duration::seconds(eight_days);
        reconciler.mount(now).unwrap();
        assert_eq!(reconciler.stop().unwrap(), eight_days as u64);

        let outcome = reconciler.save(SaveDraft::default(), now).unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                session_id: SessionId::new("n1"),
                end_time: now,
                duration_secs: eight_days as u64,
            }
        );
        assert_eq!(reconciler.phase(), &Phase::Idle);
        assert!(!store.get(&SessionId::new("n1")).unwrap().is_active());
    }

    #[test]
    fn edited_duration_longer_than_a_week_is_rejected() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        let now = t0() + Duration::days(10);
        reconciler.mount(now).unwrap();
        reconciler.stop().unwrap();
        let calls_before = store.history().len();

        let draft = SaveDraft {
            duration: Some("200h".to_string()),
            ..SaveDraft::default()
        };
        let err = reconciler.save(draft, now).unwrap_err();
        assert!(matches!(err, RoutineError::InvalidOverride { field: "duration", .. }));
        assert_eq!(store.history().len(), calls_before);
        assert_eq!(reconciler.phase().name(), "ended");
    }

    #[test]
    fn save_of_unknown_session_clears_locally() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0() + Duration::seconds(20)).unwrap();
        reconciler.stop().unwrap();
        // Deleted remotely but the snapshot has not been polled yet.
        store.delete_session(&SessionId::new("w1")).unwrap();

        let outcome = reconciler
            .save(SaveDraft::default(), t0() + Duration::seconds(22))
            .unwrap();
        assert_eq!(outcome, SaveOutcome::ClearedLocally);
    }

    #[test]
    fn discard_deletes_and_failed_discard_keeps_state() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = reconciler(&store);
        let id = reconciler
            .start(ActivityKind::Walk.default_details(), t0())
            .unwrap();
        reconciler.advance(StdDuration::from_secs(10));
        reconciler.stop().unwrap();

        store.fail_next(StoreOp::Delete);
        assert!(reconciler.discard().is_err());
        assert_eq!(reconciler.phase().name(), "ended");

        reconciler.discard().unwrap();
        assert_eq!(reconciler.phase(), &Phase::Idle);
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn dispose_detaches_subscription_and_stops_ticking() {
        let store = Arc::new(MemoryStore::with_sessions([walk_doc("w1", t0())]));
        let mut reconciler = reconciler(&store);
        reconciler.mount(t0()).unwrap();
        assert_eq!(store.subscriber_count(), 1);

        reconciler.dispose();
        assert_eq!(reconciler.advance(StdDuration::from_secs(60)), 0);
        store.put(walk_doc("w2", t0()));
        assert_eq!(store.subscriber_count(), 0);
    }
}
