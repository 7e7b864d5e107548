use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic role of the running timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Session,
    ShortBreak,
    LongBreak,
    Interruption,
}

impl TimerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerKind::Session => "session",
            TimerKind::ShortBreak => "short_break",
            TimerKind::LongBreak => "long_break",
            TimerKind::Interruption => "interruption",
        }
    }

    pub fn is_break(self) -> bool {
        matches!(self, TimerKind::ShortBreak | TimerKind::LongBreak)
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a timer callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyReason {
    /// One more tick elapsed.
    Increment,
    /// The configured duration was reached. Terminal.
    Complete,
    /// `stop()` was requested. Terminal.
    Interrupt,
}

impl NotifyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            NotifyReason::Increment => "increment",
            NotifyReason::Complete => "complete",
            NotifyReason::Interrupt => "interrupt",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, NotifyReason::Increment)
    }
}

impl fmt::Display for NotifyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
