pub mod chat;
pub mod config_cmd;
pub mod serve;

use sage_config::{AppConfig, ConfigError};
use std::path::Path;

/// Load the config named by `--config`, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}
