//! # Pomito Core Library
//!
//! Core logic of the Pomito pomodoro timer. Frontends (the CLI binary, or
//! anything implementing [`Frontend`]) drive a [`PomodoroService`] and observe
//! it through named signals.
//!
//! ## Architecture
//!
//! - **Timer**: a background thread counting elapsed units and reporting
//!   increments, completion or interruption through a callback
//! - **Message bus**: named [`Signal`]s with ordered listeners
//! - **Dispatcher**: a worker thread delivering queued events, so listeners
//!   never run on the timer thread
//! - **Service**: the session / break / interruption state machine
//! - **Plugins and hooks**: task sources looked up by name, and
//!   notification-only observers such as the activity log
//!
//! ## Key Components
//!
//! - [`PomodoroService`]: session state machine
//! - [`Timer`]: threaded countdown
//! - [`MessageDispatcher`]: asynchronous event delivery
//! - [`Config`]: application configuration
//! - [`Pomito`]: application runtime

pub mod app;
pub mod bus;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod hooks;
pub mod registry;
pub mod service;
pub mod storage;
pub mod task;
pub mod timer;

pub use app::{Frontend, Pomito};
pub use bus::{ListenerId, MessageBus, Signal, Signals};
pub use dispatcher::{ImmediateDispatcher, Message, MessageDispatcher, MessageQueue};
pub use error::{ConfigError, CoreError, Result, UsageError, ValidationError};
pub use events::Event;
pub use hooks::{ActivityHook, ActivityLog, ActivityRecord, Hook};
pub use registry::PluginRegistry;
pub use service::{PomodoroService, SessionSettings};
pub use storage::Config;
pub use task::{NullTaskSource, Task, TaskSource};
pub use timer::{NotifyReason, ThreadTimerFactory, Ticker, Timer, TimerFactory, TimerKind};
