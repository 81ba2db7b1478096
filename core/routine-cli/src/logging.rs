//! File logging for the `routine` binary.
//!
//! Stdout belongs to command output, so logs go to a daily file under
//! `<data dir>/logs/`. Filter precedence: `ROUTINE_DEBUG_LOG=1` forces
//! `debug`, then `ROUTINE_LOG`, then `info`.

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "routine.log";
const FILTER_ENV_VAR: &str = "ROUTINE_LOG";
const DEBUG_ENV_VAR: &str = "ROUTINE_DEBUG_LOG";

/// Installs the global subscriber. The returned guard flushes the writer
/// when dropped and must live until the process exits.
///
/// Logging is best-effort: if the directory cannot be created the command
/// still runs, just without a log file.
pub fn init(logs_dir: &Path) -> Option<WorkerGuard> {
    if fs_err::create_dir_all(logs_dir).is_err() {
        return None;
    }

    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .try_init()
        .ok()?;

    Some(guard)
}

fn filter() -> EnvFilter {
    if debug_enabled(env::var(DEBUG_ENV_VAR).ok().as_deref()) {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(FILTER_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_accepts_common_truthy_values() {
        assert!(debug_enabled(Some("1")));
        assert!(debug_enabled(Some("yes")));
        assert!(!debug_enabled(Some("0")));
        assert!(!debug_enabled(None));
    }
}
