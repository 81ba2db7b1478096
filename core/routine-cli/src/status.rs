//! `routine status [<kind>]`: reconciles each activity against the session
//! file and prints what is running. Dismissals of sessions that ended
//! elsewhere are dropped on the way.

use std::io::Write;

use routine_core::ActivityKind;

use crate::context::Context;
use crate::error::CliResult;
use crate::output;

pub fn run(ctx: &Context, kind: Option<ActivityKind>, out: &mut dyn Write) -> CliResult<()> {
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => ActivityKind::ALL.to_vec(),
    };

    ctx.prune_dismissals();

    let mut snapshots = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let mut view = ctx.open_view(kind)?;
        snapshots.push(view.snapshot());
        view.dispose();
    }

    if ctx.json {
        return output::json(out, &snapshots);
    }
    for snapshot in &snapshots {
        output::status_line(out, snapshot)?;
    }
    Ok(())
}
