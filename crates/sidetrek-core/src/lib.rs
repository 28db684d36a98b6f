//! Sidetrek Core
//!
//! Project configuration and on-disk layout shared by the dbt and server crates.

pub mod config;
pub mod layout;

pub use config::{
    ConfigError, DbtSettings, ProjectConfig, ProjectMetadata, ServerConfig, WatcherSettings,
    PROJECT_CONFIG_FILENAME, SERVER_CONFIG_FILENAME,
};
pub use layout::{resolve_root, ProjectLayout, TEST_PROJECT_NAME};
