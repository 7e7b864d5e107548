use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::task::Task;
use crate::timer::{NotifyReason, TimerKind};

/// Names of the signals the pomodoro service publishes on.
///
/// These and the payload field names of [`Event`] are the contract with
/// frontends and hooks.
pub mod names {
    pub const TIMER_TICK: &str = "timer_tick";
    pub const SESSION_STARTED: &str = "session_started";
    pub const SESSION_STOPPED: &str = "session_stopped";
    pub const BREAK_STARTED: &str = "break_started";
    pub const BREAK_STOPPED: &str = "break_stopped";
    pub const INTERRUPTION_STARTED: &str = "interruption_started";
    pub const INTERRUPTION_STOPPED: &str = "interruption_stopped";

    pub const ALL: [&str; 7] = [
        TIMER_TICK,
        SESSION_STARTED,
        SESSION_STOPPED,
        BREAK_STARTED,
        BREAK_STOPPED,
        INTERRUPTION_STARTED,
        INTERRUPTION_STOPPED,
    ];
}

/// Every state change of the pomodoro service produces an Event.
/// Frontends and hooks subscribe to the signal named by [`Event::signal_name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Event {
    TimerTick {
        elapsed: u64,
    },
    SessionStarted {
        session_count: u32,
        session_duration: u64,
        task: Arc<Task>,
    },
    SessionStopped {
        session_count: u32,
        task: Option<Arc<Task>>,
        reason: NotifyReason,
    },
    BreakStarted {
        break_type: TimerKind,
        break_duration: u64,
    },
    BreakStopped {
        break_type: TimerKind,
        reason: NotifyReason,
    },
    InterruptionStarted {
        reason: String,
        external: bool,
        /// Forwarded from the caller; no unplanned task is created.
        #[serde(default)]
        add_unplanned_task: bool,
    },
    InterruptionStopped {
        duration: u64,
    },
}

impl Event {
    /// The signal this event is published on.
    pub fn signal_name(&self) -> &'static str {
        match self {
            Event::TimerTick { .. } => names::TIMER_TICK,
            Event::SessionStarted { .. } => names::SESSION_STARTED,
            Event::SessionStopped { .. } => names::SESSION_STOPPED,
            Event::BreakStarted { .. } => names::BREAK_STARTED,
            Event::BreakStopped { .. } => names::BREAK_STOPPED,
            Event::InterruptionStarted { .. } => names::INTERRUPTION_STARTED,
            Event::InterruptionStopped { .. } => names::INTERRUPTION_STOPPED,
        }
    }

    /// Payload as `(key, value)` pairs sorted by key, without the signal tag.
    pub fn payload(&self) -> Vec<(String, String)> {
        let Ok(serde_json::Value::Object(map)) = serde_json::to_value(self) else {
            return Vec::new();
        };
        map.into_iter()
            .filter(|(key, _)| key != "signal")
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect()
    }
}
