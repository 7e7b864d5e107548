//! TOML-based application configuration.
//!
//! Stores:
//! - Session and break durations, in minutes (fractions allowed)
//! - How many sessions lead to a long break
//! - Which frontend and task source plugins to use
//! - Free-form per-plugin sections, read through [`Config::get_setting`]
//!
//! Configuration is read from `$POMITO_CONFIG` when set, otherwise from
//! `~/.config/pomito/config.toml`. The file is never written by pomito.
//!
//! ```toml
//! [pomito]
//! session_duration = 25
//! short_break_duration = 5
//! long_break_duration = 15
//! long_break_frequency = 4
//!
//! [plugins]
//! ui = "console"
//! task = "nulltask"
//!
//! [text]
//! file = "~/todo.txt"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::config_path;
use crate::error::{ConfigError, Result};
use crate::service::SessionSettings;

/// Timer configuration, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomitoConfig {
    #[serde(default = "default_session_duration")]
    pub session_duration: f64,
    #[serde(default = "default_short_break")]
    pub short_break_duration: f64,
    #[serde(default = "default_long_break")]
    pub long_break_duration: f64,
    #[serde(default = "default_long_break_frequency")]
    pub long_break_frequency: u32,
}

/// Plugin selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default = "default_ui_plugin")]
    pub ui: String,
    #[serde(default = "default_task_plugin")]
    pub task: String,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pomito: PomitoConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// Any other table, keyed by plugin name.
    #[serde(flatten)]
    pub settings: BTreeMap<String, toml::Table>,
}

// Default functions
fn default_session_duration() -> f64 {
    25.0
}
fn default_short_break() -> f64 {
    5.0
}
fn default_long_break() -> f64 {
    15.0
}
fn default_long_break_frequency() -> u32 {
    4
}
fn default_ui_plugin() -> String {
    "console".into()
}
fn default_task_plugin() -> String {
    "nulltask".into()
}

impl Default for PomitoConfig {
    fn default() -> Self {
        Self {
            session_duration: default_session_duration(),
            short_break_duration: default_short_break(),
            long_break_duration: default_long_break(),
            long_break_frequency: default_long_break_frequency(),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            ui: default_ui_plugin(),
            task: default_task_plugin(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pomito: PomitoConfig::default(),
            plugins: PluginsConfig::default(),
            settings: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(content).map_err(ConfigError::from)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be determined,
    /// or the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        Self::load_from(&path)
    }

    /// Load from `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            tracing::info!(path = %path.display(), "Config file not found. Using defaults.");
            return Ok(Self::default());
        }
        tracing::info!(path = %path.display(), "Using configuration file");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Location [`Config::load`] reads from.
    pub fn path() -> Result<PathBuf> {
        config_path()
    }

    fn validate(&self) -> Result<()> {
        let durations = [
            ("pomito.session_duration", self.pomito.session_duration),
            ("pomito.short_break_duration", self.pomito.short_break_duration),
            ("pomito.long_break_duration", self.pomito.long_break_duration),
        ];
        // Durations are floored to whole seconds and a zero-second timer
        // never completes.
        for (key, minutes) in durations {
            if !minutes.is_finite() || minutes_to_seconds(minutes) < 1 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected at least one second in minutes, got {minutes}"),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Session length in whole seconds.
    pub fn session_duration(&self) -> u64 {
        minutes_to_seconds(self.pomito.session_duration)
    }

    /// Short break length in whole seconds.
    pub fn short_break_duration(&self) -> u64 {
        minutes_to_seconds(self.pomito.short_break_duration)
    }

    /// Long break length in whole seconds.
    pub fn long_break_duration(&self) -> u64 {
        minutes_to_seconds(self.pomito.long_break_duration)
    }

    pub fn long_break_frequency(&self) -> u32 {
        self.pomito.long_break_frequency
    }

    /// Durations in seconds, as consumed by the pomodoro service.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            session_duration: self.session_duration(),
            short_break_duration: self.short_break_duration(),
            long_break_duration: self.long_break_duration(),
            long_break_frequency: self.long_break_frequency(),
        }
    }

    /// All `(key, value)` pairs of the section called `name`; empty if there
    /// is no such section.
    pub fn get_setting(&self, name: &str) -> Vec<(String, String)> {
        let Ok(toml::Value::Table(root)) = toml::Value::try_from(self) else {
            return Vec::new();
        };
        match root.get(name) {
            Some(toml::Value::Table(section)) => section
                .iter()
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let (section, field) = key.split_once('.')?;
        self.get_setting(section)
            .into_iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v)
    }
}

fn minutes_to_seconds(minutes: f64) -> u64 {
    (minutes * 60.0).floor() as u64
}

fn value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
