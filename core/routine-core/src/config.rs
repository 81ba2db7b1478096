//! User configuration loaded from `config.toml`.
//!
//! ```toml
//! [stopwatch]
//! resync_tolerance_secs = 2
//!
//! [stale]
//! threshold_secs = 18000
//! check_interval_secs = 60
//! exempt = ["sleep.night"]
//!
//! [profile]
//! user = "sam"
//! default_child = "ada"
//!
//! [[profile.children]]
//! id = "ada"
//! name = "Ada"
//! ```
//!
//! A missing file yields defaults. A malformed file is an error.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, RoutineError};
use crate::stopwatch::DEFAULT_RESYNC_TOLERANCE_SECS;
use crate::storage::StorageConfig;

/// Active sessions older than this are flagged (5 hours).
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 5 * 60 * 60;

/// How often a mounted view re-runs the stale check.
pub const DEFAULT_STALE_CHECK_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutineConfig {
    #[serde(default)]
    pub stopwatch: StopwatchConfig,
    #[serde(default)]
    pub stale: StaleConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopwatchConfig {
    #[serde(default = "default_resync_tolerance")]
    pub resync_tolerance_secs: u64,
}

impl Default for StopwatchConfig {
    fn default() -> Self {
        Self {
            resync_tolerance_secs: DEFAULT_RESYNC_TOLERANCE_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleConfig {
    #[serde(default = "default_stale_threshold")]
    pub threshold_secs: u64,
    #[serde(default = "default_stale_check_interval")]
    pub check_interval_secs: u64,
    /// Activity categories never flagged (`sleep`, `sleep.night`, `play`, ...).
    #[serde(default = "default_exempt")]
    pub exempt: Vec<String>,
}

impl Default for StaleConfig {
    fn default() -> Self {
        Self {
            threshold_secs: DEFAULT_STALE_THRESHOLD_SECS,
            check_interval_secs: DEFAULT_STALE_CHECK_INTERVAL_SECS,
            exempt: default_exempt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub night_mode: bool,
    #[serde(default)]
    pub default_child: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_resync_tolerance() -> u64 {
    DEFAULT_RESYNC_TOLERANCE_SECS
}

fn default_stale_threshold() -> u64 {
    DEFAULT_STALE_THRESHOLD_SECS
}

fn default_stale_check_interval() -> u64 {
    DEFAULT_STALE_CHECK_INTERVAL_SECS
}

fn default_exempt() -> Vec<String> {
    vec!["sleep.night".to_string()]
}

/// Loads configuration from `path`, returning defaults if it doesn't exist.
pub fn load_config(path: &Path) -> Result<RoutineConfig> {
    if !path.exists() {
        return Ok(RoutineConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| RoutineError::Io {
        context: format!("Failed to read config {}", path.display()),
        source,
    })?;
    toml::from_str::<RoutineConfig>(&content).map_err(|err| RoutineError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

pub fn load_config_with_storage(storage: &StorageConfig) -> Result<RoutineConfig> {
    load_config(&storage.config_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = load_config(&temp.path().join("missing.toml")).unwrap();
        assert_eq!(config.stale.threshold_secs, 18_000);
        assert_eq!(config.stale.exempt, vec!["sleep.night".to_string()]);
        assert_eq!(config.stopwatch.resync_tolerance_secs, 2);
    }

    #[test]
    fn parses_all_sections() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs_err::write(
            &path,
            r#"
[stopwatch]
resync_tolerance_secs = 5

[stale]
threshold_secs = 7200
exempt = ["sleep", "walk"]

[profile]
user = "sam"
night_mode = true
default_child = "bo"

[[profile.children]]
id = "ada"
name = "Ada"

[[profile.children]]
id = "bo"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.stopwatch.resync_tolerance_secs, 5);
        assert_eq!(config.stale.threshold_secs, 7200);
        assert_eq!(config.stale.check_interval_secs, 60);
        assert_eq!(config.stale.exempt, vec!["sleep", "walk"]);
        assert!(config.profile.night_mode);
        assert_eq!(config.profile.children.len(), 2);
        assert_eq!(config.profile.children[1].name, None);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs_err::write(&path, "[stale]\nthreshold_secs = \"long\"\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, RoutineError::ConfigMalformed { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
