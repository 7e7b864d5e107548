//! Core error types for pomito-core.
//!
//! Errors fall into three groups: usage errors (programming mistakes such as
//! stopping a timer from its own thread), domain errors (starting a session
//! without a task) and collaborator errors (configuration, plugin lookup).
//! None of them are transient, so nothing in this crate retries.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomito-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A component was driven in a way its contract forbids.
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    /// A session was requested without a task to work on.
    #[error("cannot start a session without a valid task")]
    MissingTask,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No plugin registered under the requested name
    #[error("no plugin registered as '{0}'")]
    UnknownPlugin(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contract violations on the timer and dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// `start`/`stop`/`join` called from the worker's own thread.
    #[error("cannot call {operation} on the {component} thread itself")]
    SelfCall {
        component: &'static str,
        operation: &'static str,
    },

    /// `start` called on a worker that was already started.
    #[error("{component} has already been started")]
    AlreadyStarted { component: &'static str },

    /// A message payload was queued on a signal it does not belong to.
    #[error("message for '{payload}' cannot be queued on signal '{signal}'")]
    SignalMismatch { signal: String, payload: &'static str },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(#[from] toml::de::Error),

    /// No configuration directory could be determined
    #[error("Could not determine the configuration directory")]
    NoConfigDir,
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A task id prefix matched more than one task
    #[error("Found {count} tasks matching id {prefix}")]
    AmbiguousTaskId { prefix: String, count: usize },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
