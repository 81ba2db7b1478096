//! `routine continue <kind>`: answers a stale prompt with "keep running".
//!
//! The choice is written to the dismissal ledger so later invocations do not
//! ask again for the same session. Starting a new session asks afresh.

use std::io::Write;

use routine_core::{ActivityKind, StaleChoice};

use crate::context::Context;
use crate::error::{CliError, CliResult};
use crate::output;

pub fn run(ctx: &Context, kind: ActivityKind, out: &mut dyn Write) -> CliResult<()> {
    let mut view = ctx.open_view(kind)?;
    let session_id = view
        .reconciler()
        .active_session()
        .map(|session| session.id.clone())
        .ok_or_else(|| CliError::usage(format!("No {kind} timer is running")))?;

    let mut ledger = ctx.dismissals();
    let message = if ledger.contains(&session_id) {
        format!("Already continuing this {kind} ({})", view.display())
    } else if view.stale_prompt().is_none() {
        format!("The {kind} timer is not stale ({}); nothing to do", view.display())
    } else {
        view.resolve_stale(StaleChoice::Continue)?;
        ledger.insert(session_id)?;
        format!(
            "Continuing {kind} ({}). You won't be asked again for this session",
            view.display()
        )
    };

    if ctx.json {
        output::json(out, &view.snapshot())?;
    } else {
        writeln!(out, "{}", message)?;
    }
    view.dispose();
    Ok(())
}
