mod config;

pub use config::{Config, PluginsConfig, PomitoConfig};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "POMITO_CONFIG";

/// Returns `$POMITO_CONFIG` if set, else `<config dir>/pomito/config.toml`.
///
/// # Errors
/// Returns an error if no configuration directory can be determined for the
/// current user.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("pomito").join("config.toml"))
}
