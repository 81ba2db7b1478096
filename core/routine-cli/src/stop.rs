//! `routine stop <kind>`: stops the running timer, then saves it (with any
//! edits) or discards it.

use std::io::Write;

use chrono::{DateTime, Utc};
use routine_core::{format_elapsed, ActivityDetails, ActivityKind, SaveDraft, SaveOutcome, SessionId};
use serde::Serialize;

use crate::context::Context;
use crate::error::{CliError, CliResult};
use crate::output;

#[derive(Debug, Clone, Default)]
pub struct StopArgs {
    pub discard: bool,
    pub duration: Option<String>,
    pub start: Option<String>,
    pub notes: Option<String>,
    pub volume_ml: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum StopReport {
    Saved {
        kind: ActivityKind,
        session_id: SessionId,
        end_time: DateTime<Utc>,
        duration_secs: u64,
    },
    Discarded {
        kind: ActivityKind,
        session_id: SessionId,
    },
    AlreadyFinished {
        kind: ActivityKind,
        session_id: SessionId,
    },
}

pub fn run(ctx: &Context, kind: ActivityKind, args: StopArgs, out: &mut dyn Write) -> CliResult<()> {
    if args.volume_ml.is_some() && kind != ActivityKind::Pump {
        return Err(CliError::usage(format!("--volume-ml only applies to pump (got {kind})")));
    }

    let mut view = ctx.open_view(kind)?;
    let session = view
        .reconciler()
        .active_session()
        .cloned()
        .ok_or_else(|| CliError::usage(format!("No {kind} timer is running")))?;

    let report = if args.discard {
        let display = view.display();
        view.discard()?;
        if !ctx.json {
            writeln!(out, "Discarded {} ({})", kind, display)?;
        }
        StopReport::Discarded {
            kind,
            session_id: session.id.clone(),
        }
    } else {
        view.stop()?;
        let details = args.volume_ml.map(|volume| match &session.details {
            ActivityDetails::Pump { side, .. } => ActivityDetails::Pump {
                side: *side,
                volume_ml: Some(volume),
            },
            other => other.clone(),
        });
        let draft = SaveDraft {
            duration: args.duration,
            start_time: args.start,
            details,
            notes: args.notes,
        };

        match view.save(draft)? {
            SaveOutcome::Saved {
                session_id,
                end_time,
                duration_secs,
            } => {
                if !ctx.json {
                    writeln!(
                        out,
                        "Saved {}: {} (ended {})",
                        session.details.category(),
                        format_elapsed(duration_secs),
                        output::local_time(end_time)
                    )?;
                }
                StopReport::Saved {
                    kind,
                    session_id,
                    end_time,
                    duration_secs,
                }
            }
            SaveOutcome::ClearedLocally => {
                if !ctx.json {
                    writeln!(out, "This {} was already finished elsewhere", kind)?;
                }
                StopReport::AlreadyFinished {
                    kind,
                    session_id: session.id.clone(),
                }
            }
        }
    };

    ctx.prune_dismissals();
    view.dispose();

    if ctx.json {
        output::json(out, &report)?;
    }
    Ok(())
}
