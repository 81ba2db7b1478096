//! `routine start <kind>`: begins a timer for the selected child.

use std::io::Write;

use routine_core::ActivityKind;

use crate::args::DetailFlags;
use crate::context::Context;
use crate::error::{CliError, CliResult};
use crate::output;

pub fn run(ctx: &Context, kind: ActivityKind, flags: DetailFlags, out: &mut dyn Write) -> CliResult<()> {
    let details = flags.into_details(kind)?;
    let mut view = ctx.open_view(kind)?;

    if view.reconciler().active_session().is_some() {
        return Err(CliError::usage(format!(
            "A {kind} timer is already running ({}). Stop it first with `routine stop {kind}`",
            view.display(),
        )));
    }

    let category = details.category();
    let session_id = view.start(Some(details))?;
    tracing::info!(session_id = %session_id, kind = %kind, "Started from CLI");

    if ctx.json {
        output::json(out, &view.snapshot())?;
    } else {
        writeln!(
            out,
            "Started {} for {} at {}",
            category,
            ctx.child()?.label(),
            output::local_time(ctx.clock.now())
        )?;
    }
    view.dispose();
    Ok(())
}
