//! # routine-core
//!
//! Core library for LittleRoutine activity timers (sleep, play, walk, pump).
//! Hosts (the `routine` CLI, embedded UIs) drive it; it owns no threads.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Time moves only when the host calls
//!   `advance`, so tests use a [`ManualClock`] and never sleep.
//! - **Start time is the truth**: Elapsed time is recomputed from the
//!   persisted `start_time` on mount and on every visibility restore.
//! - **Failures keep state**: A failed store call leaves the timer, the form
//!   and the phase where they were.
//! - **Store-agnostic**: Persistence is a [`SessionStore`] collaborator.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use routine_core::{ActivityKind, ActivityView, BabyId, FileStore, SystemClock};
//!
//! let store = Arc::new(FileStore::open(&storage.sessions_file())?);
//! let mut view = ActivityView::new(BabyId::new("ada"), ActivityKind::Walk, store, Arc::new(SystemClock), &config);
//! view.mount()?;
//! view.start(None)?;
//! ```

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod format;
pub mod guard;
pub mod patterns;
pub mod reconciler;
pub mod stopwatch;
pub mod storage;
pub mod store;
pub mod types;
pub mod view;

// Re-export commonly used items at crate root
pub use app::{AppState, Child, Settings, Stage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use error::{Result, RoutineError, StoreOp};
pub use format::{format_elapsed, parse_duration_input, parse_start_input};
pub use guard::{check_stale, StaleChoice, StaleGuard, StalePolicy, StalePrompt, Staleness};
pub use reconciler::{Phase, Reconciler, SaveDraft, SaveOutcome, TrackedSession};
pub use stopwatch::{Resync, Stopwatch};
pub use storage::*;
pub use store::{select_active, FileStore, MemoryStore, SessionEdits, SessionStore, Snapshot, StoreCall, Subscription};
pub use types::*;
pub use view::{ActivityView, Notice, NoticeLevel, ViewSnapshot};
