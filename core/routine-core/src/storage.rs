//! Storage configuration and path management for LittleRoutine.
//!
//! All file paths the core and its hosts touch are derived here, so tests can
//! point everything at a temp directory with [`StorageConfig::with_root`].

use std::path::{Path, PathBuf};

use crate::error::{Result, RoutineError};

/// Environment variable that overrides the data directory.
pub const HOME_ENV_VAR: &str = "LITTLEROUTINE_HOME";

/// Central configuration for all LittleRoutine storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all data (default: ~/.littleroutine)
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the data directory from `LITTLEROUTINE_HOME`, falling back to
    /// `~/.littleroutine`.
    pub fn from_env() -> Result<Self> {
        if let Some(root) = std::env::var_os(HOME_ENV_VAR).filter(|value| !value.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }
        dirs::home_dir()
            .map(|home| Self::with_root(home.join(".littleroutine")))
            .ok_or(RoutineError::DataDirNotFound)
    }

    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to sessions.json (activity session documents).
    pub fn sessions_file(&self) -> PathBuf {
        self.root.join("sessions.json")
    }

    /// Path to config.toml (user configuration).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to dismissed.json (stale prompts the user chose to ignore).
    pub fn dismissed_file(&self) -> PathBuf {
        self.root.join("dismissed.json")
    }

    /// Path to logs/ directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Creates the root directory if missing.
    pub fn ensure_root(&self) -> Result<()> {
        fs_err::create_dir_all(&self.root).map_err(|source| RoutineError::Io {
            context: format!("Failed to create data directory {}", self.root.display()),
            source,
        })
    }
}
