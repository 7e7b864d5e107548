pub mod config;
pub mod session;

use std::path::Path;

use pomito_core::Config;

/// Load from `path` when given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> pomito_core::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}
