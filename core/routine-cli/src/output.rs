//! Text and JSON rendering shared by the commands.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use routine_core::{format_elapsed, ViewSnapshot};
use serde::Serialize;

use crate::error::CliResult;

pub fn json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// `walk   running  01:05  walk`, plus a hint line when the guard fired.
pub fn status_line(out: &mut dyn Write, snapshot: &ViewSnapshot) -> CliResult<()> {
    if snapshot.session_id.is_none() {
        writeln!(out, "{:<5}  idle", snapshot.kind.as_str())?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<5}  {:<7}  {:>8}  {}",
        snapshot.kind.as_str(),
        snapshot.phase,
        snapshot.display,
        snapshot.category.as_deref().unwrap_or_default()
    )?;
    if let Some(prompt) = &snapshot.stale {
        writeln!(
            out,
            "       ! running for {}; was it forgotten? `routine stop {kind}`, `routine stop {kind} --discard` or `routine continue {kind}`",
            long_duration(prompt.elapsed_secs),
            kind = snapshot.kind
        )?;
    }
    Ok(())
}

/// `6h 05m` style, for durations too long for the timer face to read well.
pub fn long_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format_elapsed(seconds)
    }
}

pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}
