//! Elapsed-seconds stopwatch.
//!
//! The engine owns no timer of its own. The host calls [`Stopwatch::advance`]
//! with the wall-clock time that passed (a repeating one-second timer in a UI,
//! a sleep loop in the CLI, virtual time in tests). Each whole second while
//! running bumps `elapsed` by one and invokes the tick callback with the new
//! value.
//!
//! ```text
//!            start()                      pause()/stop()
//!   stopped ─────────▶ running ─────────────────────────▶ stopped
//!      ▲                  │ advance(≥1s) → tick(elapsed+1)
//!      └──── reset() ─────┘
//!   dispose() from any state is terminal: no tick ever fires again.
//! ```
//!
//! # Resync
//!
//! The reconciler re-primes a running engine with [`Stopwatch::initialize`].
//! A running engine only adopts the suggested value when it is a new
//! suggestion (not the one it was last primed with), differs from the current
//! value by more than the tolerance, and is non-zero. Otherwise the engine's
//! own ticking wins.

use std::time::Duration;

use crate::types::StopwatchState;

/// Interval of the host's repeating timer.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Suggested values within this many seconds of the running value are ignored.
pub const DEFAULT_RESYNC_TOLERANCE_SECS: u64 = 2;

pub type TickCallback = Box<dyn FnMut(u64) + Send>;

/// What [`Stopwatch::initialize`] did with a suggested value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// The suggested value replaced the current one.
    Adopted,
    /// The engine kept its own value (absent suggestion, re-render, or within
    /// tolerance).
    Kept,
}

pub struct Stopwatch {
    elapsed: u64,
    running: bool,
    /// Wall time accumulated toward the next tick.
    pending: Duration,
    last_suggestion: Option<u64>,
    resync_tolerance: u64,
    on_tick: Option<TickCallback>,
    disposed: bool,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stopwatch")
            .field("elapsed", &self.elapsed)
            .field("running", &self.running)
            .field("pending", &self.pending)
            .field("last_suggestion", &self.last_suggestion)
            .field("resync_tolerance", &self.resync_tolerance)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::with_resync_tolerance(DEFAULT_RESYNC_TOLERANCE_SECS)
    }

    pub fn with_resync_tolerance(resync_tolerance: u64) -> Self {
        Stopwatch {
            elapsed: 0,
            running: false,
            pending: Duration::ZERO,
            last_suggestion: None,
            resync_tolerance,
            on_tick: None,
            disposed: false,
        }
    }

    /// Registers the callback invoked with the new elapsed value on every tick.
    pub fn on_tick(&mut self, callback: impl FnMut(u64) + Send + 'static) {
        if self.disposed {
            return;
        }
        self.on_tick = Some(Box::new(callback));
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn resync_tolerance(&self) -> u64 {
        self.resync_tolerance
    }

    pub fn state(&self) -> StopwatchState {
        StopwatchState {
            elapsed_seconds: self.elapsed,
            running: self.running,
        }
    }

    /// Primes the engine with an optional suggested elapsed value and a
    /// running flag. Repeating a call with the same arguments changes nothing.
    pub fn initialize(&mut self, suggested: Option<u64>, running: bool) -> Resync {
        if self.disposed {
            return Resync::Kept;
        }

        let outcome = match suggested {
            None => Resync::Kept,
            Some(value) if !self.running => {
                self.elapsed = value;
                Resync::Adopted
            }
            Some(value) => {
                let repeated = self.last_suggestion == Some(value);
                let drift = value.abs_diff(self.elapsed);
                if !repeated && value != 0 && drift > self.resync_tolerance {
                    tracing::debug!(
                        from = self.elapsed,
                        to = value,
                        drift,
                        "Stopwatch resynced"
                    );
                    self.elapsed = value;
                    self.pending = Duration::ZERO;
                    Resync::Adopted
                } else {
                    Resync::Kept
                }
            }
        };

        if suggested.is_some() {
            self.last_suggestion = suggested;
        }

        if running {
            self.start();
        } else {
            self.pause();
        }

        outcome
    }

    /// Begins ticking. No-op if already running.
    pub fn start(&mut self) {
        if self.disposed || self.running {
            return;
        }
        self.running = true;
        self.pending = Duration::ZERO;
    }

    /// Stops ticking and keeps the elapsed value.
    pub fn pause(&mut self) {
        self.running = false;
        self.pending = Duration::ZERO;
    }

    /// Stops ticking and returns the final elapsed value. Does not reset.
    pub fn stop(&mut self) -> u64 {
        self.pause();
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.elapsed = 0;
        self.running = false;
        self.pending = Duration::ZERO;
        self.last_suggestion = None;
    }

    /// Feeds `delta` of wall-clock time to the engine and returns how many
    /// ticks fired.
    pub fn advance(&mut self, delta: Duration) -> u64 {
        if self.disposed || !self.running {
            return 0;
        }

        self.pending += delta;
        let mut fired = 0;
        while self.pending >= TICK_INTERVAL {
            self.pending -= TICK_INTERVAL;
            self.elapsed += 1;
            fired += 1;
            if let Some(callback) = self.on_tick.as_mut() {
                callback(self.elapsed);
            }
        }
        fired
    }

    /// Tears the engine down. The callback is dropped and every later call is
    /// a no-op.
    pub fn dispose(&mut self) {
        self.running = false;
        self.pending = Duration::ZERO;
        self.on_tick = None;
        self.disposed = true;
    }
}
