//! Session types shared by the stopwatch, reconciler, guard and stores.
//!
//! Every timed activity (sleep, play, walk, pump) is an [`ActivitySession`]:
//! a common [`SessionBase`] plus a tagged [`ActivityDetails`] variant. The
//! reconciler and guard only ever look at the base, so they stay generic over
//! the activity kind.
//!
//! On disk and on the wire a session is one flat JSON object:
//!
//! ```json
//! {
//!   "id": "01J...",
//!   "baby_id": "ada",
//!   "start_time": "2026-10-16T07:00:00Z",
//!   "end_time": null,
//!   "duration": 0,
//!   "is_active": true,
//!   "activity": "sleep",
//!   "sleep_type": "nap"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Owning child reference. Not validated locally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BabyId(String);

impl BabyId {
    pub fn new(value: impl Into<String>) -> Self {
        BabyId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BabyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier assigned by the store on creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        SessionId(value.into())
    }

    /// Fresh sortable id for a newly created session.
    pub fn generate() -> Self {
        SessionId(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Activity Kinds
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Sleep,
    Play,
    Walk,
    Pump,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::Sleep,
        ActivityKind::Play,
        ActivityKind::Walk,
        ActivityKind::Pump,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Sleep => "sleep",
            ActivityKind::Play => "play",
            ActivityKind::Walk => "walk",
            ActivityKind::Pump => "pump",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sleep" => Some(ActivityKind::Sleep),
            "play" => Some(ActivityKind::Play),
            "walk" => Some(ActivityKind::Walk),
            "pump" => Some(ActivityKind::Pump),
            _ => None,
        }
    }

    /// Details a freshly started session of this kind gets when the user
    /// picks nothing.
    pub fn default_details(&self) -> ActivityDetails {
        match self {
            ActivityKind::Sleep => ActivityDetails::Sleep {
                sleep_type: SleepType::Nap,
            },
            ActivityKind::Play => ActivityDetails::Play {
                play_type: PlayType::Other,
                mood: None,
            },
            ActivityKind::Walk => ActivityDetails::Walk { mood: None },
            ActivityKind::Pump => ActivityDetails::Pump {
                side: PumpSide::Both,
                volume_ml: None,
            },
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepType {
    Nap,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayType {
    TummyTime,
    Reading,
    Music,
    Outdoor,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Calm,
    Fussy,
    Crying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpSide {
    Left,
    Right,
    Both,
}

/// Activity-specific fields. Owned by the forms layer; the timer core only
/// needs [`ActivityDetails::kind`] and [`ActivityDetails::category`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "activity", rename_all = "lowercase")]
pub enum ActivityDetails {
    Sleep {
        sleep_type: SleepType,
    },
    Play {
        play_type: PlayType,
        #[serde(default)]
        mood: Option<Mood>,
    },
    Walk {
        #[serde(default)]
        mood: Option<Mood>,
    },
    Pump {
        side: PumpSide,
        #[serde(default)]
        volume_ml: Option<u32>,
    },
}

impl ActivityDetails {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityDetails::Sleep { .. } => ActivityKind::Sleep,
            ActivityDetails::Play { .. } => ActivityKind::Play,
            ActivityDetails::Walk { .. } => ActivityKind::Walk,
            ActivityDetails::Pump { .. } => ActivityKind::Pump,
        }
    }

    /// Category key used by stale-session exemptions, e.g. `sleep.night`.
    pub fn category(&self) -> String {
        match self {
            ActivityDetails::Sleep { sleep_type } => match sleep_type {
                SleepType::Nap => "sleep.nap".to_string(),
                SleepType::Night => "sleep.night".to_string(),
            },
            other => other.kind().as_str().to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════════════

/// Fields every timed activity shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBase {
    pub id: SessionId,
    pub baby_id: BabyId,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole seconds, `end_time - start_time`. Zero while active.
    #[serde(default)]
    pub duration: u64,
    pub is_active: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySession {
    #[serde(flatten)]
    pub base: SessionBase,
    #[serde(flatten)]
    pub details: ActivityDetails,
}

impl ActivitySession {
    /// A new active session as a store creates it.
    pub fn started(
        id: SessionId,
        baby_id: BabyId,
        details: ActivityDetails,
        start_time: DateTime<Utc>,
    ) -> Self {
        ActivitySession {
            base: SessionBase {
                id,
                baby_id,
                start_time,
                end_time: None,
                duration: 0,
                is_active: true,
                notes: None,
            },
            details,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.base.id
    }

    pub fn kind(&self) -> ActivityKind {
        self.details.kind()
    }

    /// Active means `is_active` and not yet finished.
    pub fn is_active(&self) -> bool {
        self.base.is_active && self.base.end_time.is_none()
    }

    /// Whole seconds since `start_time`. A start in the future counts as zero.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        elapsed_between(self.base.start_time, now)
    }
}

/// `floor((now - start) / 1s)`, clamped at zero.
pub fn elapsed_between(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = now.signed_duration_since(start).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis / 1000) as u64
    }
}

/// In-memory stopwatch state. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StopwatchState {
    pub elapsed_seconds: u64,
    pub running: bool,
}
