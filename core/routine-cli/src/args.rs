//! Command-line spellings of the core enums.

use clap::ValueEnum;
use routine_core::{ActivityDetails, ActivityKind, Mood, PlayType, PumpSide, SleepType};

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Sleep,
    Play,
    Walk,
    Pump,
}

impl From<KindArg> for ActivityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Sleep => ActivityKind::Sleep,
            KindArg::Play => ActivityKind::Play,
            KindArg::Walk => ActivityKind::Walk,
            KindArg::Pump => ActivityKind::Pump,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SleepTypeArg {
    Nap,
    Night,
}

impl From<SleepTypeArg> for SleepType {
    fn from(value: SleepTypeArg) -> Self {
        match value {
            SleepTypeArg::Nap => SleepType::Nap,
            SleepTypeArg::Night => SleepType::Night,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlayTypeArg {
    TummyTime,
    Reading,
    Music,
    Outdoor,
    Other,
}

impl From<PlayTypeArg> for PlayType {
    fn from(value: PlayTypeArg) -> Self {
        match value {
            PlayTypeArg::TummyTime => PlayType::TummyTime,
            PlayTypeArg::Reading => PlayType::Reading,
            PlayTypeArg::Music => PlayType::Music,
            PlayTypeArg::Outdoor => PlayType::Outdoor,
            PlayTypeArg::Other => PlayType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MoodArg {
    Happy,
    Calm,
    Fussy,
    Crying,
}

impl From<MoodArg> for Mood {
    fn from(value: MoodArg) -> Self {
        match value {
            MoodArg::Happy => Mood::Happy,
            MoodArg::Calm => Mood::Calm,
            MoodArg::Fussy => Mood::Fussy,
            MoodArg::Crying => Mood::Crying,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SideArg {
    Left,
    Right,
    Both,
}

impl From<SideArg> for PumpSide {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Left => PumpSide::Left,
            SideArg::Right => PumpSide::Right,
            SideArg::Both => PumpSide::Both,
        }
    }
}

/// Activity-specific flags as given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailFlags {
    pub sleep_type: Option<SleepTypeArg>,
    pub play_type: Option<PlayTypeArg>,
    pub mood: Option<MoodArg>,
    pub side: Option<SideArg>,
}

impl DetailFlags {
    /// Builds details for `kind`, rejecting flags that belong to another kind.
    pub fn into_details(self, kind: ActivityKind) -> CliResult<ActivityDetails> {
        let reject = |flag: &str, owner: &str| {
            Err(CliError::usage(format!(
                "{} only applies to {} (got {})",
                flag, owner, kind
            )))
        };
        match kind {
            ActivityKind::Sleep => {
                if self.play_type.is_some() {
                    return reject("--play-type", "play");
                }
                if self.mood.is_some() {
                    return reject("--mood", "play and walk");
                }
                if self.side.is_some() {
                    return reject("--side", "pump");
                }
                Ok(ActivityDetails::Sleep {
                    sleep_type: self.sleep_type.map(Into::into).unwrap_or(SleepType::Nap),
                })
            }
            ActivityKind::Play => {
                if self.sleep_type.is_some() {
                    return reject("--sleep-type", "sleep");
                }
                if self.side.is_some() {
                    return reject("--side", "pump");
                }
                Ok(ActivityDetails::Play {
                    play_type: self.play_type.map(Into::into).unwrap_or(PlayType::Other),
                    mood: self.mood.map(Into::into),
                })
            }
            ActivityKind::Walk => {
                if self.sleep_type.is_some() {
                    return reject("--sleep-type", "sleep");
                }
                if self.play_type.is_some() {
                    return reject("--play-type", "play");
                }
                if self.side.is_some() {
                    return reject("--side", "pump");
                }
                Ok(ActivityDetails::Walk {
                    mood: self.mood.map(Into::into),
                })
            }
            ActivityKind::Pump => {
                if self.sleep_type.is_some() {
                    return reject("--sleep-type", "sleep");
                }
                if self.play_type.is_some() {
                    return reject("--play-type", "play");
                }
                if self.mood.is_some() {
                    return reject("--mood", "play and walk");
                }
                Ok(ActivityDetails::Pump {
                    side: self.side.map(Into::into).unwrap_or(PumpSide::Both),
                    volume_ml: None,
                })
            }
        }
    }
}
