//! Cross-process write lock for the session file.
//!
//! A sibling `<file>.lock` is created with `create_new`, so exactly one
//! process holds it. The holder's pid is written inside for diagnosis. The
//! lock is removed on drop. A lock file older than [`STALE_AFTER`] is left
//! over from a crashed process and is broken.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use crate::error::{Result, RoutineError};

/// How long a writer waits for another process before giving up.
pub const LOCK_WAIT: Duration = Duration::from_secs(2);

/// Age at which an unreleased lock file is considered abandoned.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

const RETRY_EVERY: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    /// Acquires the lock guarding `target`, retrying for up to `wait`.
    pub fn acquire(target: &Path, wait: Duration) -> Result<Self> {
        let path = lock_path(target);
        if let Some(dir) = path.parent() {
            fs_err::create_dir_all(dir).map_err(|source| RoutineError::Io {
                context: "Failed to create session file directory".to_string(),
                source,
            })?;
        }

        let mut waited = Duration::ZERO;
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    // Best effort; an empty lock file still locks.
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(WriteLock { path });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if is_abandoned(&path) {
                        tracing::warn!(path = %path.display(), "Breaking abandoned session file lock");
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if waited >= wait {
                        return Err(RoutineError::StoreLocked { path });
                    }
                    thread::sleep(RETRY_EVERY);
                    waited += RETRY_EVERY;
                }
                Err(source) => {
                    return Err(RoutineError::Io {
                        context: format!("Failed to create lock file {}", path.display()),
                        source,
                    })
                }
            }
        }
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(error = %err, path = %self.path.display(), "Failed to release session file lock");
        }
    }
}

pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

fn is_abandoned(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= STALE_AFTER)
}
