//! Everything one invocation needs: paths, config, the signed-in profile,
//! the shared session file and a clock.

use std::collections::HashSet;
use std::sync::Arc;

use routine_core::{
    load_config_with_storage, ActivityKind, ActivityView, AppState, BabyId, Child, Clock,
    FileStore, RoutineConfig, RoutineError, SessionId, SessionStore, StorageConfig, SystemClock,
};

use crate::dismissals::DismissalLedger;
use crate::error::{CliError, CliResult};

pub struct Context {
    pub storage: StorageConfig,
    pub config: RoutineConfig,
    pub app: AppState,
    pub store: Arc<FileStore>,
    pub clock: Arc<dyn Clock>,
    pub json: bool,
}

impl Context {
    pub fn load(storage: StorageConfig, baby: Option<&str>, json: bool) -> CliResult<Self> {
        Self::with_clock(storage, baby, json, Arc::new(SystemClock))
    }

    pub fn with_clock(
        storage: StorageConfig,
        baby: Option<&str>,
        json: bool,
        clock: Arc<dyn Clock>,
    ) -> CliResult<Self> {
        storage.ensure_root()?;
        let config = load_config_with_storage(&storage)?;
        let app = init_app(&config, baby)?;
        let store = Arc::new(FileStore::open(&storage.sessions_file())?);
        Ok(Context {
            storage,
            config,
            app,
            store,
            clock,
            json,
        })
    }

    pub fn child(&self) -> CliResult<&Child> {
        self.app
            .selected_child()
            .ok_or_else(|| CliError::usage("No child selected"))
    }

    pub fn dismissals(&self) -> DismissalLedger {
        DismissalLedger::load(&self.storage.dismissed_file())
    }

    /// Forgets "continue" choices for sessions that have ended, here or in
    /// another invocation. Failures are logged; the ledger is advisory.
    pub fn prune_dismissals(&self) {
        let active: HashSet<SessionId> = self
            .store
            .sessions()
            .into_iter()
            .filter(|session| session.is_active())
            .map(|session| session.base.id)
            .collect();
        match self.dismissals().retain_active(|id| active.contains(id)) {
            Ok(0) => {}
            Ok(pruned) => tracing::debug!(pruned, "Pruned dismissals of finished sessions"),
            Err(err) => tracing::warn!(error = %err, "Failed to prune dismissal ledger"),
        }
    }

    /// Mounts a view for the selected child. A stale prompt the user already
    /// answered with "continue" in an earlier run is suppressed.
    pub fn open_view(&self, kind: ActivityKind) -> CliResult<ActivityView> {
        let child = self.child()?;
        let mut view = ActivityView::new(
            child.id.clone(),
            kind,
            Arc::clone(&self.store) as Arc<dyn SessionStore>,
            Arc::clone(&self.clock),
            &self.config,
        );
        view.mount()?;

        if let Some(prompt) = view.stale_prompt().cloned() {
            if self.dismissals().contains(&prompt.session_id) {
                view.mark_continued(&prompt.session_id);
            }
        }
        Ok(view)
    }
}

/// Context over a temp data dir with child `ada` and a caller-owned clock.
#[cfg(test)]
pub fn test_context(root: &std::path::Path, clock: Arc<dyn Clock>) -> Context {
    Context::with_clock(
        StorageConfig::with_root(root.to_path_buf()),
        Some("ada"),
        false,
        clock,
    )
    .expect("test context")
}

/// Signs in from `[profile]`, acting on `--baby` when given.
fn init_app(config: &RoutineConfig, baby: Option<&str>) -> CliResult<AppState> {
    let requested = baby.map(BabyId::new);
    AppState::from_profile(&config.profile, requested.as_ref()).map_err(|err| match err {
        RoutineError::NoChildren => CliError::usage(
            "No children configured. Pass --baby <ID> or add [[profile.children]] to config.toml",
        ),
        other => other.into(),
    })
}
