//! `routine watch <kind>`: live timer face for a running session.
//!
//! Ticks once per second. Every `--refresh` seconds it re-reads the session
//! file and runs a visibility restore, so a stop or edit made by another
//! invocation shows up. Exits when the session ends.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use routine_core::{stopwatch::TICK_INTERVAL, ActivityKind, ActivityView, FileStore, Phase};

use crate::context::Context;
use crate::error::{CliError, CliResult};
use crate::output;

pub struct Watcher {
    view: ActivityView,
    refresh_every: Duration,
    since_refresh: Duration,
    stale_reported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Running,
    Ended,
}

impl Watcher {
    pub fn new(view: ActivityView, refresh_every: Duration) -> Self {
        Watcher {
            view,
            refresh_every,
            since_refresh: Duration::ZERO,
            stale_reported: false,
        }
    }

    pub fn view(&self) -> &ActivityView {
        &self.view
    }

    /// Feeds `delta` of elapsed time and refreshes from disk when due.
    pub fn step(&mut self, store: &FileStore, delta: Duration, out: &mut dyn Write) -> CliResult<Step> {
        self.view.advance(delta);

        self.since_refresh += delta;
        if self.since_refresh >= self.refresh_every {
            self.since_refresh = Duration::ZERO;
            if let Err(err) = store.refresh() {
                tracing::warn!(error = %err, "Session file refresh failed");
            }
            self.view.on_visibility_restored();
        }

        if matches!(self.view.phase(), Phase::Idle) {
            return Ok(Step::Ended);
        }

        match self.view.stale_prompt() {
            Some(prompt) if !self.stale_reported => {
                self.stale_reported = true;
                writeln!(
                    out,
                    "\nRunning for {}. Was it forgotten? Try `routine stop {kind}` or `routine continue {kind}`",
                    output::long_duration(prompt.elapsed_secs),
                    kind = self.view.kind()
                )?;
            }
            Some(_) => {}
            None => self.stale_reported = false,
        }
        Ok(Step::Running)
    }

    pub fn finish(mut self) {
        self.view.dispose();
    }
}

pub fn run(
    ctx: &Context,
    kind: ActivityKind,
    refresh_secs: u64,
    max_secs: Option<u64>,
    out: &mut dyn Write,
) -> CliResult<()> {
    let view = ctx.open_view(kind)?;
    if view.reconciler().active_session().is_none() {
        return Err(CliError::usage(format!("No {kind} timer is running")));
    }

    let mut watcher = Watcher::new(view, Duration::from_secs(refresh_secs.max(1)));
    render(ctx, &watcher, out)?;

    let started = Instant::now();
    let mut last = started;
    loop {
        thread::sleep(TICK_INTERVAL);
        let now = Instant::now();
        let delta = now.duration_since(last);
        last = now;

        if watcher.step(&ctx.store, delta, out)? == Step::Ended {
            if !ctx.json {
                writeln!(out, "\nThe {kind} timer was stopped elsewhere")?;
            }
            break;
        }
        render(ctx, &watcher, out)?;

        if max_secs.is_some_and(|max| started.elapsed() >= Duration::from_secs(max)) {
            if !ctx.json {
                writeln!(out)?;
            }
            break;
        }
    }

    watcher.finish();
    Ok(())
}

fn render(ctx: &Context, watcher: &Watcher, out: &mut dyn Write) -> CliResult<()> {
    let view = watcher.view();
    if ctx.json {
        output::json(out, &view.snapshot())?;
    } else {
        write!(out, "\r{} {}", view.kind(), view.display())?;
        out.flush()?;
    }
    Ok(())
}
