use std::path::Path;

use clap::Subcommand;
use pomito_core::Config;

use super::load_config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
    /// Get a config value
    Get {
        /// Dot-separated key (e.g. "pomito.session_duration", "text.file")
        key: String,
    },
    /// Print the configuration file location
    Path,
}

pub fn run(path: Option<&Path>, action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = load_config(path)?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Get { key } => {
            let config = load_config(path)?;
            let value = config
                .get(&key)
                .ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Path => {
            let location = match path {
                Some(path) => path.to_path_buf(),
                None => Config::path()?,
            };
            println!("{}", location.display());
        }
    }
    Ok(())
}
