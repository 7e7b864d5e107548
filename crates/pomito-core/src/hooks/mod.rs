//! Notification-only observers of the pomodoro lifecycle.
//!
//! A hook connects to the service signals in [`Hook::initialize`] and must
//! disconnect everything it connected in [`Hook::close`]. Hooks never drive
//! the service.

mod activity;

pub use activity::{ActivityHook, ActivityLog, ActivityRecord};

use crate::bus::Signals;
use crate::error::Result;

pub trait Hook: Send {
    /// Unique identifier used in logs.
    fn name(&self) -> &str;

    /// Connect to `signals`. Called once at application start up.
    fn initialize(&mut self, signals: &Signals) -> Result<()>;

    /// Disconnect from `signals`. Called when the application exits.
    fn close(&mut self, signals: &Signals) -> Result<()>;
}
