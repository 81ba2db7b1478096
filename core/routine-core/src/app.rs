//! Application-wide state: who is signed in, their settings, their children
//! and which child the activity views act on.
//!
//! Initialization is strictly ordered:
//!
//! ```text
//! sign_in → load_settings → load_children → select_default_child
//! ```
//!
//! Each step fails with [`RoutineError::InitOrder`] if the previous one has not
//! run. `logout` drops everything back to signed-out.

use serde::Serialize;

use crate::config::ProfileConfig;
use crate::error::{Result, RoutineError};
use crate::types::BabyId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub night_mode: bool,
    pub default_child: Option<BabyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Child {
    pub id: BabyId,
    pub name: Option<String>,
}

impl Child {
    /// Name for display, falling back to the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    SignedOut,
    SignedIn,
    SettingsLoaded,
    ChildrenLoaded,
    Ready,
}

impl Stage {
    fn step_name(self) -> &'static str {
        match self {
            Stage::SignedOut => "sign out",
            Stage::SignedIn => "sign in",
            Stage::SettingsLoaded => "load settings",
            Stage::ChildrenLoaded => "load children",
            Stage::Ready => "select a child",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    stage: Stage,
    user: Option<String>,
    settings: Settings,
    children: Vec<Child>,
    selected: Option<BabyId>,
}

impl Default for AppState {
    fn default() -> Self {
        AppState {
            stage: Stage::SignedOut,
            user: None,
            settings: Settings::default(),
            children: Vec::new(),
            selected: None,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the whole initialization sequence from the `[profile]` config.
    ///
    /// `requested` picks the child to act on instead of the default. With no
    /// children configured, a requested id is taken as the only child.
    pub fn from_profile(profile: &ProfileConfig, requested: Option<&BabyId>) -> Result<Self> {
        let mut children: Vec<Child> = profile
            .children
            .iter()
            .map(|child| Child {
                id: BabyId::new(child.id.clone()),
                name: child.name.clone(),
            })
            .collect();
        if children.is_empty() {
            if let Some(id) = requested {
                children.push(Child {
                    id: id.clone(),
                    name: None,
                });
            }
        }

        let mut app = AppState::new();
        app.sign_in(profile.user.clone().unwrap_or_else(|| "local".to_string()))?;
        app.load_settings(Settings {
            night_mode: profile.night_mode,
            default_child: profile.default_child.clone().map(BabyId::new),
        })?;
        app.load_children(children)?;
        match requested {
            Some(id) => app.select_child(id)?,
            None => app.select_default_child()?,
        };
        Ok(app)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn sign_in(&mut self, user: impl Into<String>) -> Result<()> {
        self.require(Stage::SignedOut, Stage::SignedIn, true)?;
        let user = user.into();
        tracing::info!(user = %user, "Signed in");
        self.user = Some(user);
        self.stage = Stage::SignedIn;
        Ok(())
    }

    pub fn load_settings(&mut self, settings: Settings) -> Result<()> {
        self.require(Stage::SignedIn, Stage::SettingsLoaded, false)?;
        self.settings = settings;
        self.stage = Stage::SettingsLoaded;
        Ok(())
    }

    pub fn load_children(&mut self, children: Vec<Child>) -> Result<()> {
        self.require(Stage::SettingsLoaded, Stage::ChildrenLoaded, false)?;
        tracing::debug!(count = children.len(), "Children loaded");
        self.children = children;
        self.selected = None;
        self.stage = Stage::ChildrenLoaded;
        Ok(())
    }

    /// Picks `settings.default_child` when it is one of the loaded children,
    /// otherwise the first child.
    pub fn select_default_child(&mut self) -> Result<&Child> {
        self.require(Stage::ChildrenLoaded, Stage::Ready, false)?;
        let preferred = self
            .settings
            .default_child
            .as_ref()
            .and_then(|id| self.children.iter().position(|child| &child.id == id));
        if preferred.is_none() {
            if let Some(id) = &self.settings.default_child {
                tracing::warn!(default_child = %id, "Default child not found; using the first child");
            }
        }
        let index = match preferred {
            Some(index) => index,
            None if self.children.is_empty() => return Err(RoutineError::NoChildren),
            None => 0,
        };

        self.selected = Some(self.children[index].id.clone());
        self.stage = Stage::Ready;
        Ok(&self.children[index])
    }

    pub fn select_child(&mut self, id: &BabyId) -> Result<&Child> {
        if self.stage < Stage::ChildrenLoaded {
            return Err(RoutineError::InitOrder {
                step: "select a child",
                required: Stage::ChildrenLoaded.step_name(),
            });
        }
        let index = self
            .children
            .iter()
            .position(|child| &child.id == id)
            .ok_or_else(|| RoutineError::UnknownChild(id.clone()))?;
        self.selected = Some(id.clone());
        self.stage = Stage::Ready;
        Ok(&self.children[index])
    }

    pub fn selected_child(&self) -> Option<&Child> {
        let id = self.selected.as_ref()?;
        self.children.iter().find(|child| &child.id == id)
    }

    pub fn logout(&mut self) {
        if let Some(user) = &self.user {
            tracing::info!(user = %user, "Signed out");
        }
        *self = AppState::default();
    }

    /// `exact` steps may only run from `from`; the rest from `from` onwards,
    /// which allows reloading settings or children later.
    fn require(&self, from: Stage, to: Stage, exact: bool) -> Result<()> {
        let allowed = if exact {
            self.stage == from
        } else {
            self.stage >= from
        };
        if allowed {
            Ok(())
        } else if exact {
            Err(RoutineError::InitOrder {
                step: to.step_name(),
                required: "sign out",
            })
        } else {
            Err(RoutineError::InitOrder {
                step: to.step_name(),
                required: from.step_name(),
            })
        }
    }
}
