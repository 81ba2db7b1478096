//! Stale-session guard.
//!
//! An active session that has been running implausibly long (5 hours by
//! default) was most likely forgotten. The guard flags it once and asks the
//! user to continue, stop and save, or discard. Activity categories listed as
//! exempt (night sleep by default) are never flagged.
//!
//! "Continue" suppresses the prompt for that session id until a new session
//! is started; the check itself keeps running.

use chrono::{DateTime, Utc};

use crate::config::StaleConfig;
use crate::types::{elapsed_between, ActivityDetails, SessionId};

/// Outcome of a single stale check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Stale { elapsed_secs: u64 },
    Exempt,
}

/// The user's answer to a stale prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleChoice {
    Continue,
    StopAndSave,
    Discard,
}

impl StaleChoice {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "continue" => Some(StaleChoice::Continue),
            "stop-save" | "stop_and_save" | "save" => Some(StaleChoice::StopAndSave),
            "discard" => Some(StaleChoice::Discard),
            _ => None,
        }
    }
}

/// A pending prompt shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StalePrompt {
    pub session_id: SessionId,
    pub elapsed_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalePolicy {
    pub threshold_secs: u64,
    pub exempt: Vec<String>,
}

impl Default for StalePolicy {
    fn default() -> Self {
        StalePolicy::from(&StaleConfig::default())
    }
}

impl From<&StaleConfig> for StalePolicy {
    fn from(config: &StaleConfig) -> Self {
        StalePolicy {
            threshold_secs: config.threshold_secs,
            exempt: config.exempt.clone(),
        }
    }
}

impl StalePolicy {
    /// `sleep` exempts `sleep.nap` and `sleep.night`; `sleep.night` only itself.
    pub fn is_exempt(&self, details: &ActivityDetails) -> bool {
        let category = details.category();
        let kind = details.kind();
        self.exempt
            .iter()
            .any(|rule| rule == &category || rule == kind.as_str())
    }
}

/// Checks one active session. Stale means running for at least the threshold.
pub fn check_stale(
    start_time: DateTime<Utc>,
    details: &ActivityDetails,
    now: DateTime<Utc>,
    policy: &StalePolicy,
) -> Staleness {
    if policy.is_exempt(details) {
        return Staleness::Exempt;
    }
    let elapsed_secs = elapsed_between(start_time, now);
    if elapsed_secs >= policy.threshold_secs {
        Staleness::Stale { elapsed_secs }
    } else {
        Staleness::Fresh
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaleGuard {
    policy: StalePolicy,
    dismissed_for: Option<SessionId>,
    prompt: Option<StalePrompt>,
}

impl StaleGuard {
    pub fn new(policy: StalePolicy) -> Self {
        StaleGuard {
            policy,
            dismissed_for: None,
            prompt: None,
        }
    }

    pub fn policy(&self) -> &StalePolicy {
        &self.policy
    }

    /// Runs the check and raises a prompt when the session is stale and the
    /// user has not already chosen to continue it.
    pub fn evaluate(
        &mut self,
        session_id: &SessionId,
        start_time: DateTime<Utc>,
        details: &ActivityDetails,
        now: DateTime<Utc>,
    ) -> Option<&StalePrompt> {
        if self.dismissed_for.as_ref() == Some(session_id) {
            return None;
        }
        match check_stale(start_time, details, now, &self.policy) {
            Staleness::Stale { elapsed_secs } => {
                if self.prompt.is_none() {
                    tracing::info!(session_id = %session_id, elapsed_secs, "Stale session detected");
                }
                self.prompt = Some(StalePrompt {
                    session_id: session_id.clone(),
                    elapsed_secs,
                });
                self.prompt.as_ref()
            }
            Staleness::Fresh | Staleness::Exempt => {
                self.prompt = None;
                None
            }
        }
    }

    pub fn prompt(&self) -> Option<&StalePrompt> {
        self.prompt.as_ref()
    }

    /// "Continue": never prompt again for this session.
    pub fn dismiss_session(&mut self, session_id: &SessionId) {
        self.dismissed_for = Some(session_id.clone());
        self.prompt = None;
    }

    pub fn is_dismissed(&self, session_id: &SessionId) -> bool {
        self.dismissed_for.as_ref() == Some(session_id)
    }

    /// Closes the dialog without suppressing later prompts.
    pub fn close_prompt(&mut self) {
        self.prompt = None;
    }

    /// A new timer was started; earlier dismissals no longer apply.
    pub fn on_new_session(&mut self) {
        self.dismissed_for = None;
        self.prompt = None;
    }
}
