//! Configuration schema (sidetrek.config.yaml and sidetrek.toml)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Project config written by `sidetrek init` at the project root
pub const PROJECT_CONFIG_FILENAME: &str = "sidetrek.config.yaml";

/// Optional dev server settings at the project root
pub const SERVER_CONFIG_FILENAME: &str = "sidetrek.toml";

/// Project metadata block of sidetrek.config.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Project name; also the name of the dagster and dbt project directories
    pub project_name: String,
}

/// sidetrek.config.yaml (subset of fields we care about)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub metadata: ProjectMetadata,
}

impl ProjectConfig {
    /// Load project config from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ProjectConfigNotFound);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_yaml(&contents)
    }

    /// Parse project config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn project_name(&self) -> &str {
        &self.metadata.project_name
    }
}

/// How the dev server invokes dbt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbtSettings {
    /// dbt executable (looked up on PATH when not absolute)
    pub program: String,

    /// Timeout for `dbt parse` in seconds (0 = no timeout)
    pub parse_timeout_secs: u64,

    /// Timeout for `dbt run` in seconds (0 = no timeout)
    pub run_timeout_secs: u64,

    /// Run all models once when a client connects
    pub run_on_connect: bool,

    /// Pass `--fail-fast` to `dbt run`
    pub fail_fast: bool,
}

impl Default for DbtSettings {
    fn default() -> Self {
        Self {
            program: "dbt".to_string(),
            parse_timeout_secs: 300,
            run_timeout_secs: 1800,
            run_on_connect: true,
            fail_fast: true,
        }
    }
}

impl DbtSettings {
    pub fn parse_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.parse_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.run_timeout_secs)
    }
}

fn secs_to_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Models directory watcher settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Coalescing window in milliseconds (0, the default, is one rebuild per raw event)
    pub debounce_ms: u64,

    /// Also `dbt run --select` the models whose .sql files changed
    pub run_changed_models: bool,
}

impl WatcherSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Dev server settings (sidetrek.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// dbt invocation settings
    pub dbt: DbtSettings,

    /// Watcher settings
    pub watcher: WatcherSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dbt: DbtSettings::default(),
            watcher: WatcherSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load `<root>/sidetrek.toml` if it exists, defaults otherwise
    pub fn load_or_default(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(SERVER_CONFIG_FILENAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("sidetrek.config.yaml not found. Are you sure you're in the root of a Sidetrek project?")]
    ProjectConfigNotFound,
}
