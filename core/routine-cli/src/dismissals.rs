//! Stale-prompt dismissals that outlive one `routine` invocation.
//!
//! Each invocation is a fresh app instance, so "Continue" on a stale session
//! is recorded in `<data dir>/dismissed.json`:
//!
//! ```json
//! { "sessions": ["01J...", "01J..."] }
//! ```
//!
//! Entries are pruned once their session is no longer active, whichever host
//! stopped it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use routine_core::{RoutineError, SessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    sessions: BTreeSet<SessionId>,
}

#[derive(Debug)]
pub struct DismissalLedger {
    path: PathBuf,
    sessions: BTreeSet<SessionId>,
}

impl DismissalLedger {
    /// Loads the ledger. A missing or unreadable file starts empty; a stale
    /// prompt shown twice is harmless.
    pub fn load(path: &Path) -> Self {
        let sessions = fs_err::read_to_string(path)
            .ok()
            .and_then(|content| match serde_json::from_str::<LedgerFile>(&content) {
                Ok(file) => Some(file.sessions),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Ignoring malformed dismissal ledger");
                    None
                }
            })
            .unwrap_or_default();
        DismissalLedger {
            path: path.to_path_buf(),
            sessions,
        }
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains(session_id)
    }

    pub fn insert(&mut self, session_id: SessionId) -> Result<(), RoutineError> {
        if self.sessions.insert(session_id) {
            self.save()?;
        }
        Ok(())
    }

    /// Drops entries whose session is no longer active. Returns how many.
    pub fn retain_active(
        &mut self,
        is_active: impl Fn(&SessionId) -> bool,
    ) -> Result<usize, RoutineError> {
        let before = self.sessions.len();
        self.sessions.retain(|id| is_active(id));
        let pruned = before - self.sessions.len();
        if pruned > 0 {
            self.save()?;
        }
        Ok(pruned)
    }

    fn save(&self) -> Result<(), RoutineError> {
        let file = LedgerFile {
            sessions: self.sessions.clone(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|source| RoutineError::Json {
            context: "Failed to serialize dismissal ledger".to_string(),
            source,
        })?;
        fs_err::write(&self.path, content).map_err(|source| RoutineError::Io {
            context: "Failed to write dismissal ledger".to_string(),
            source,
        })
    }
}
