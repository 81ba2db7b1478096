//! One mounted activity screen.
//!
//! [`ActivityView`] wires a [`Reconciler`] and a [`StaleGuard`] to the signals
//! a host delivers: elapsed wall-clock time (`advance`), the page becoming
//! visible again (`on_visibility_restored`) and teardown (`dispose`).
//!
//! Collaborator failures and rejected form values are returned to the caller
//! *and* queued as [`Notice`]s, the dismissible messages a UI would show.
//! A failure never changes the phase the view was in.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::Serialize;

use crate::clock::Clock;
use crate::config::RoutineConfig;
use crate::error::{Result, RoutineError};
use crate::format::format_elapsed;
use crate::guard::{StaleChoice, StaleGuard, StalePolicy, StalePrompt};
use crate::reconciler::{Phase, Reconciler, SaveDraft, SaveOutcome};
use crate::stopwatch::Stopwatch;
use crate::store::SessionStore;
use crate::types::{ActivityDetails, ActivityKind, BabyId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Serializable summary of what the screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    pub kind: ActivityKind,
    pub phase: &'static str,
    pub elapsed_seconds: u64,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<StalePrompt>,
}

pub struct ActivityView {
    reconciler: Reconciler,
    guard: StaleGuard,
    clock: Arc<dyn Clock>,
    check_interval: StdDuration,
    since_check: StdDuration,
    notices: Vec<Notice>,
    disposed: bool,
}

impl ActivityView {
    pub fn new(
        baby_id: BabyId,
        kind: ActivityKind,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        config: &RoutineConfig,
    ) -> Self {
        let stopwatch = Stopwatch::with_resync_tolerance(config.stopwatch.resync_tolerance_secs);
        ActivityView {
            reconciler: Reconciler::new(baby_id, kind, store, stopwatch),
            guard: StaleGuard::new(StalePolicy::from(&config.stale)),
            clock,
            check_interval: StdDuration::from_secs(config.stale.check_interval_secs.max(1)),
            since_check: StdDuration::ZERO,
            notices: Vec::new(),
            disposed: false,
        }
    }

    pub fn kind(&self) -> ActivityKind {
        self.reconciler.kind()
    }

    pub fn phase(&self) -> &Phase {
        self.reconciler.phase()
    }

    pub fn elapsed(&self) -> u64 {
        self.reconciler.elapsed()
    }

    /// The elapsed value as the timer face shows it.
    pub fn display(&self) -> String {
        format_elapsed(self.elapsed())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn on_tick(&mut self, callback: impl FnMut(u64) + Send + 'static) {
        self.reconciler.on_tick(callback);
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let session = self.reconciler.active_session();
        ViewSnapshot {
            kind: self.kind(),
            phase: self.phase().name(),
            elapsed_seconds: self.elapsed(),
            display: self.display(),
            session_id: session.map(|s| s.id.clone()),
            category: session.map(|s| s.details.category()),
            stale: self.guard.prompt().cloned(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Host Signals
    // ─────────────────────────────────────────────────────────────────────────

    /// Subscribes and runs discovery plus a first stale check.
    pub fn mount(&mut self) -> Result<()> {
        self.ensure_live()?;
        let now = self.clock.now();
        let result = self.reconciler.mount(now);
        self.report(result)?;
        self.check_stale();
        Ok(())
    }

    /// The host became visible again after an arbitrary suspension.
    pub fn on_visibility_restored(&mut self) {
        if self.disposed {
            return;
        }
        self.reconciler.reconcile(self.clock.now());
        self.since_check = StdDuration::ZERO;
        self.check_stale();
    }

    /// Delivers `delta` of wall-clock time (already reflected in the clock):
    /// ticks the stopwatch, applies pending snapshots as of now and runs the
    /// periodic stale check. Returns ticks fired.
    pub fn advance(&mut self, delta: StdDuration) -> u64 {
        if self.disposed {
            return 0;
        }
        let fired = self.reconciler.advance(delta);
        if self.reconciler.poll(self.clock.now()) {
            self.check_stale();
        }

        self.since_check += delta;
        if self.since_check >= self.check_interval {
            self.since_check = StdDuration::ZERO;
            self.check_stale();
        }
        fired
    }

    /// Cancels ticking and detaches from the store. Terminal.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.reconciler.dispose();
        self.guard.close_prompt();
        self.disposed = true;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // User Actions
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts a new session. `None` uses the kind's default details.
    pub fn start(&mut self, details: Option<ActivityDetails>) -> Result<SessionId> {
        self.ensure_live()?;
        let details = details.unwrap_or_else(|| self.kind().default_details());
        let result = self.reconciler.start(details, self.clock.now());
        let id = self.report(result)?;
        self.guard.on_new_session();
        Ok(id)
    }

    pub fn stop(&mut self) -> Result<u64> {
        self.ensure_live()?;
        let result = self.reconciler.stop();
        let elapsed = self.report(result)?;
        self.guard.close_prompt();
        Ok(elapsed)
    }

    pub fn resume(&mut self) -> Result<()> {
        self.ensure_live()?;
        let result = self.reconciler.resume();
        self.report(result)
    }

    pub fn save(&mut self, draft: SaveDraft) -> Result<SaveOutcome> {
        self.ensure_live()?;
        let result = self.reconciler.save(draft, self.clock.now());
        let outcome = self.report(result)?;
        if outcome == SaveOutcome::ClearedLocally {
            self.push(NoticeLevel::Info, "This session was already finished elsewhere");
        }
        Ok(outcome)
    }

    pub fn discard(&mut self) -> Result<()> {
        self.ensure_live()?;
        let result = self.reconciler.discard();
        self.report(result)?;
        self.guard.close_prompt();
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stale Guard
    // ─────────────────────────────────────────────────────────────────────────

    pub fn stale_prompt(&self) -> Option<&StalePrompt> {
        self.guard.prompt()
    }

    /// Suppresses the stale prompt for a session the user already chose to
    /// continue (e.g. in an earlier app instance).
    pub fn mark_continued(&mut self, session_id: &SessionId) {
        self.guard.dismiss_session(session_id);
    }

    /// Applies the user's answer to the open stale prompt.
    pub fn resolve_stale(&mut self, choice: StaleChoice) -> Result<()> {
        self.ensure_live()?;
        let Some(prompt) = self.guard.prompt().cloned() else {
            return Err(RoutineError::InvalidTransition {
                action: "answer the stale prompt",
                phase: "not stale",
            });
        };

        match choice {
            StaleChoice::Continue => {
                tracing::info!(session_id = %prompt.session_id, "Stale session continued");
                self.guard.dismiss_session(&prompt.session_id);
                Ok(())
            }
            StaleChoice::StopAndSave => self.stop().map(|_| ()),
            StaleChoice::Discard => {
                let result = self.discard();
                // The dialog closes either way; a failed discard leaves the
                // session running and the check may prompt again.
                self.guard.close_prompt();
                result
            }
        }
    }

    /// Drains queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn check_stale(&mut self) {
        let now = self.clock.now();
        match self.reconciler.phase() {
            Phase::Running { session } => {
                self.guard
                    .evaluate(&session.id, session.start_time, &session.details, now);
            }
            Phase::Idle | Phase::Ended { .. } => self.guard.close_prompt(),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(RoutineError::Disposed)
        } else {
            Ok(())
        }
    }

    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.push(NoticeLevel::Error, err.to_string());
        }
        result
    }

    fn push(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreOp;
    use crate::store::{MemoryStore, StoreCall};
    use crate::types::{ActivitySession, SleepType};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 7, 0, 0).unwrap()
    }

    fn ada() -> BabyId {
        BabyId::new("ada")
    }

    fn view_over(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>, kind: ActivityKind) -> ActivityView {
        ActivityView::new(
            ada(),
            kind,
            Arc::clone(store) as Arc<dyn SessionStore>,
            Arc::clone(clock) as Arc<dyn Clock>,
            &RoutineConfig::default(),
        )
    }

    fn tick(view: &mut ActivityView, clock: &ManualClock, secs: u64) {
        for _ in 0..secs {
            clock.advance_secs(1);
            view.advance(StdDuration::from_secs(1));
        }
    }

    #[test]
    fn stop_shows_final_elapsed() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Walk);
        view.mount().unwrap();

        view.start(None).unwrap();
        tick(&mut view, &clock, 65);
        view.stop().unwrap();

        assert_eq!(view.display(), "01:05");
        assert_eq!(view.phase().name(), "ended");
    }

    #[test]
    fn failures_queue_notices_and_keep_phase() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Pump);
        view.mount().unwrap();
        view.start(None).unwrap();
        tick(&mut view, &clock, 30);
        view.stop().unwrap();

        store.fail_next(StoreOp::End);
        assert!(view.save(SaveDraft::default()).is_err());

        let notices = view.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("end session"));
        assert_eq!(view.phase().name(), "ended");
        assert_eq!(view.elapsed(), 30);
        assert!(view.take_notices().is_empty());
    }

    #[test]
    fn stale_prompt_raised_on_mount_for_forgotten_session() {
        let forgotten = ActivitySession::started(
            SessionId::new("p1"),
            ada(),
            ActivityKind::Play.default_details(),
            t0() - Duration::hours(6),
        );
        let store = Arc::new(MemoryStore::with_sessions([forgotten]));
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Play);

        view.mount().unwrap();

        let prompt = view.stale_prompt().unwrap();
        assert_eq!(prompt.session_id, SessionId::new("p1"));
        assert_eq!(prompt.elapsed_secs, 6 * 3600);
    }

    #[test]
    fn periodic_check_catches_session_going_stale_while_visible() {
        let store = Arc::new(MemoryStore::with_sessions([ActivitySession::started(
            SessionId::new("w1"),
            ada(),
            ActivityKind::Walk.default_details(),
            t0() - Duration::seconds(17_990),
        )]));
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Walk);
        view.mount().unwrap();
        assert!(view.stale_prompt().is_none());

        tick(&mut view, &clock, 60);
        assert!(view.stale_prompt().is_some());
    }

    #[test]
    fn night_sleep_never_prompts() {
        let store = Arc::new(MemoryStore::with_sessions([ActivitySession::started(
            SessionId::new("s1"),
            ada(),
            ActivityDetails::Sleep {
                sleep_type: SleepType::Night,
            },
            t0() - Duration::hours(11),
        )]));
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Sleep);
        view.mount().unwrap();
        view.on_visibility_restored();

        assert!(view.stale_prompt().is_none());
        assert_eq!(view.elapsed(), 11 * 3600);
    }

    #[test]
    fn continue_is_idempotent_until_a_new_session_starts() {
        let store = Arc::new(MemoryStore::with_sessions([ActivitySession::started(
            SessionId::new("w1"),
            ada(),
            ActivityKind::Walk.default_details(),
            t0() - Duration::hours(5),
        )]));
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Walk);
        view.mount().unwrap();

        view.resolve_stale(StaleChoice::Continue).unwrap();
        clock.advance_secs(3600);
        view.on_visibility_restored();
        tick(&mut view, &clock, 120);
        assert!(view.stale_prompt().is_none());
        assert_eq!(view.phase().name(), "running");
    }

    #[test]
    fn stop_and_save_goes_through_ended() {
        let store = Arc::new(MemoryStore::with_sessions([ActivitySession::started(
            SessionId::new("w1"),
            ada(),
            ActivityKind::Walk.default_details(),
            t0() - Duration::hours(5),
        )]));
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Walk);
        view.mount().unwrap();

        view.resolve_stale(StaleChoice::StopAndSave).unwrap();
        assert_eq!(view.phase().name(), "ended");
        assert!(view.stale_prompt().is_none());

        view.save(SaveDraft::default()).unwrap();
        assert_eq!(view.phase(), &Phase::Idle);
        assert_eq!(store.get(&SessionId::new("w1")).unwrap().base.duration, 18_000);
    }

    #[test]
    fn failed_stale_discard_closes_dialog_and_keeps_session() {
        let store = Arc::new(MemoryStore::with_sessions([ActivitySession::started(
            SessionId::new("w1"),
            ada(),
            ActivityKind::Walk.default_details(),
            t0() - Duration::hours(7),
        )]));
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Walk);
        view.mount().unwrap();
        store.fail_next(StoreOp::Delete);

        assert!(view.resolve_stale(StaleChoice::Discard).is_err());
        assert!(view.stale_prompt().is_none());
        assert_eq!(view.phase().name(), "running");
        assert_eq!(view.take_notices().len(), 1);

        view.on_visibility_restored();
        assert!(view.stale_prompt().is_some());
    }

    #[test]
    fn stale_discard_deletes_and_returns_to_idle() {
        let store = Arc::new(MemoryStore::with_sessions([ActivitySession::started(
            SessionId::new("w1"),
            ada(),
            ActivityKind::Walk.default_details(),
            t0() - Duration::hours(7),
        )]));
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Walk);
        view.mount().unwrap();

        view.resolve_stale(StaleChoice::Discard).unwrap();
        assert_eq!(view.phase(), &Phase::Idle);
        assert!(store
            .history()
            .iter()
            .any(|call| matches!(call, StoreCall::Delete { .. })));
    }

    #[test]
    fn resolving_without_prompt_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Walk);
        view.mount().unwrap();
        assert!(view.resolve_stale(StaleChoice::Continue).is_err());
    }

    #[test]
    fn no_callbacks_after_dispose() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Play);
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        view.on_tick(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        view.mount().unwrap();
        view.start(None).unwrap();
        tick(&mut view, &clock, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        view.dispose();
        tick(&mut view, &clock, 10);
        view.on_visibility_restored();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(view.start(None), Err(RoutineError::Disposed)));
    }

    #[test]
    fn snapshot_serializes_for_hosts() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let mut view = view_over(&store, &clock, ActivityKind::Sleep);
        view.mount().unwrap();
        view.start(None).unwrap();
        tick(&mut view, &clock, 5);

        let json = serde_json::to_value(view.snapshot()).unwrap();
        assert_eq!(json["kind"], "sleep");
        assert_eq!(json["phase"], "running");
        assert_eq!(json["display"], "00:05");
        assert_eq!(json["category"], "sleep.nap");
        assert!(json.get("stale").is_none());
    }
}
