//! routine: command-line host for LittleRoutine activity timers.
//!
//! Every invocation is a fresh app instance. Timers live in the shared
//! session file, so a timer started here keeps running after the process
//! exits and is reconciled from its start time on the next call.
//!
//! ## Subcommands
//!
//! - `start`: begin a sleep, play, walk or pump timer
//! - `status`: show what is running, with stale-session warnings
//! - `stop`: stop and save (optionally editing the record) or discard
//! - `continue`: keep a stale timer running without being asked again
//! - `watch`: live ticking display until the timer ends

mod args;
mod context;
mod dismiss;
mod dismissals;
mod error;
mod logging;
mod output;
mod start;
mod status;
mod stop;
mod watch;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use routine_core::StorageConfig;

use crate::args::{DetailFlags, KindArg, MoodArg, PlayTypeArg, SideArg, SleepTypeArg};
use crate::context::Context;
use crate::error::CliResult;
use crate::stop::StopArgs;

#[derive(Parser)]
#[command(name = "routine")]
#[command(about = "Activity timers for LittleRoutine")]
#[command(version)]
struct Cli {
    /// Data directory (default: $LITTLEROUTINE_HOME or ~/.littleroutine)
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Child to act on (default: the profile's default child)
    #[arg(long, global = true, value_name = "ID")]
    baby: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a timer
    Start {
        #[arg(value_enum)]
        kind: KindArg,

        #[arg(long, value_enum)]
        sleep_type: Option<SleepTypeArg>,

        #[arg(long, value_enum)]
        play_type: Option<PlayTypeArg>,

        #[arg(long, value_enum)]
        mood: Option<MoodArg>,

        #[arg(long, value_enum)]
        side: Option<SideArg>,
    },

    /// Show running timers
    Status {
        #[arg(value_enum)]
        kind: Option<KindArg>,
    },

    /// Stop a timer and save or discard it
    Stop {
        #[arg(value_enum)]
        kind: KindArg,

        /// Delete the session instead of saving it
        #[arg(long, conflicts_with_all = ["duration", "start", "notes", "volume_ml"])]
        discard: bool,

        /// Corrected duration: minutes ("45"), "1:05:00" or "1h 5m"
        #[arg(long)]
        duration: Option<String>,

        /// Corrected start time (RFC 3339)
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Pumped volume in millilitres (pump only)
        #[arg(long)]
        volume_ml: Option<u32>,
    },

    /// Keep a stale timer running and stop asking about it
    Continue {
        #[arg(value_enum)]
        kind: KindArg,
    },

    /// Live display of a running timer
    Watch {
        #[arg(value_enum)]
        kind: KindArg,

        /// Seconds between re-reads of the session file
        #[arg(long, default_value_t = 5)]
        refresh: u64,

        /// Stop watching after this many seconds
        #[arg(long = "for", value_name = "SECS")]
        max_secs: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let storage = match cli.data_dir.clone() {
        Some(dir) => Ok(StorageConfig::with_root(dir)),
        None => StorageConfig::from_env(),
    };
    let storage = match storage {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("routine: {}", e);
            std::process::exit(1);
        }
    };

    let _logging_guard = logging::init(&storage.logs_dir());

    if let Err(e) = run(cli, storage) {
        tracing::error!(error = %e, "routine command failed");
        eprintln!("routine: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, storage: StorageConfig) -> CliResult<()> {
    let ctx = Context::load(storage, cli.baby.as_deref(), cli.json)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Start {
            kind,
            sleep_type,
            play_type,
            mood,
            side,
        } => {
            let flags = DetailFlags {
                sleep_type,
                play_type,
                mood,
                side,
            };
            start::run(&ctx, kind.into(), flags, &mut out)
        }
        Commands::Status { kind } => status::run(&ctx, kind.map(Into::into), &mut out),
        Commands::Stop {
            kind,
            discard,
            duration,
            start,
            notes,
            volume_ml,
        } => {
            let args = StopArgs {
                discard,
                duration,
                start,
                notes,
                volume_ml,
            };
            stop::run(&ctx, kind.into(), args, &mut out)
        }
        Commands::Continue { kind } => dismiss::run(&ctx, kind.into(), &mut out),
        Commands::Watch {
            kind,
            refresh,
            max_secs,
        } => watch::run(&ctx, kind.into(), refresh, max_secs, &mut out),
    }
}
