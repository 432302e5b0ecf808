//! Subcommand implementations.

pub mod add;
pub mod ask;
pub mod doctor;
pub mod encode;
pub mod onboard;
pub mod status;

use fieldrag_config::{AppConfig, ConfigError};
use std::path::{Path, PathBuf};

/// The config file a command should read.
pub fn config_file(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_config_path)
}

/// Load the config file plus environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(&config_file(explicit))
}
