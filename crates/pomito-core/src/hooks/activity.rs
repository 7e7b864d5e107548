//! Activity log of finished sessions, breaks and interruptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

use super::Hook;
use crate::bus::{ListenerId, Signal, Signals};
use crate::error::Result;
use crate::events::Event;

/// One logged activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    /// `session`, `break` or `interruption`.
    pub category: String,
    /// Event payload as `key=value` pairs joined by `;`.
    pub data: String,
}

impl ActivityRecord {
    /// Build a record for a stop event. Other events are not logged.
    pub fn from_event(event: &Event, timestamp: DateTime<Utc>) -> Option<Self> {
        let category = match event {
            Event::SessionStopped { .. } => "session",
            Event::BreakStopped { .. } => "break",
            Event::InterruptionStopped { .. } => "interruption",
            _ => return None,
        };
        Some(Self {
            timestamp,
            category: category.to_string(),
            data: activity_data(event),
        })
    }
}

/// Shared, append-only list of records.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    records: Arc<Mutex<Vec<ActivityRecord>>>,
}

impl ActivityLog {
    pub fn push(&self, record: ActivityRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot of all records, oldest first.
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn by_category(&self, category: &str) -> Vec<ActivityRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.category == category)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Records every `session_stopped`, `break_stopped` and
/// `interruption_stopped` event.
#[derive(Debug, Default)]
pub struct ActivityHook {
    log: ActivityLog,
    connections: Vec<(Signal, ListenerId)>,
}

impl ActivityHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the records; stays valid after the hook is closed.
    pub fn log(&self) -> ActivityLog {
        self.log.clone()
    }
}

impl Hook for ActivityHook {
    fn name(&self) -> &str {
        "activity"
    }

    fn initialize(&mut self, signals: &Signals) -> Result<()> {
        for signal in [
            &signals.session_stopped,
            &signals.break_stopped,
            &signals.interruption_stopped,
        ] {
            let log = self.log.clone();
            let id = signal.connect(move |event| {
                if let Some(record) = ActivityRecord::from_event(event, Utc::now()) {
                    tracing::debug!(category = %record.category, data = %record.data, "activity");
                    log.push(record);
                }
            });
            self.connections.push((signal.clone(), id));
        }
        Ok(())
    }

    fn close(&mut self, _signals: &Signals) -> Result<()> {
        for (signal, id) in self.connections.drain(..) {
            signal.disconnect(id);
        }
        Ok(())
    }
}

// Tasks are logged by their display string rather than as JSON.
fn activity_data(event: &Event) -> String {
    let task = match event {
        Event::SessionStopped { task, .. } => Some(
            task.as_ref()
                .map_or_else(|| "None".to_string(), |t| t.to_string()),
        ),
        _ => None,
    };
    event
        .payload()
        .into_iter()
        .map(|(key, value)| match (&task, key.as_str()) {
            (Some(task), "task") => format!("{key}={task}"),
            _ => format!("{key}={value}"),
        })
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageBus;
    use crate::task::Task;
    use crate::timer::{NotifyReason, TimerKind};

    fn session_stopped() -> Event {
        Event::SessionStopped {
            session_count: 2,
            task: Some(Arc::new(Task::new(Some("7".into()), "read", 3, 1, Vec::new()))),
            reason: NotifyReason::Complete,
        }
    }

    #[test]
    fn initialize_connects_and_close_disconnects() {
        let bus = MessageBus::new();
        let signals = Signals::new(&bus);
        let mut hook = ActivityHook::new();

        hook.initialize(&signals).unwrap();
        assert_eq!(signals.session_stopped.receiver_count(), 1);
        assert_eq!(signals.break_stopped.receiver_count(), 1);
        assert_eq!(signals.interruption_stopped.receiver_count(), 1);
        assert_eq!(signals.session_started.receiver_count(), 0);

        hook.close(&signals).unwrap();
        for signal in signals.all() {
            assert_eq!(signal.receiver_count(), 0, "{}", signal.name());
        }
    }

    #[test]
    fn stop_events_are_logged_by_category() {
        let bus = MessageBus::new();
        let signals = Signals::new(&bus);
        let mut hook = ActivityHook::new();
        hook.initialize(&signals).unwrap();
        let log = hook.log();

        bus.send(&session_stopped());
        bus.send(&Event::BreakStopped {
            break_type: TimerKind::LongBreak,
            reason: NotifyReason::Interrupt,
        });
        bus.send(&Event::InterruptionStopped { duration: 42 });
        bus.send(&Event::TimerTick { elapsed: 1 });

        let categories: Vec<_> = log.records().into_iter().map(|r| r.category).collect();
        assert_eq!(categories, vec!["session", "break", "interruption"]);
        assert_eq!(
            log.by_category("break")[0].data,
            "break_type=long_break;reason=interrupt"
        );
        assert_eq!(log.by_category("interruption")[0].data, "duration=42");
    }

    #[test]
    fn session_data_uses_task_display() {
        let record = ActivityRecord::from_event(&session_stopped(), Utc::now()).unwrap();
        assert_eq!(
            record.data,
            "reason=complete;session_count=2;task=I:7 | E:3 | A:1 | T: | D:read"
        );
    }

    #[test]
    fn nothing_is_logged_after_close() {
        let bus = MessageBus::new();
        let signals = Signals::new(&bus);
        let mut hook = ActivityHook::new();
        hook.initialize(&signals).unwrap();
        hook.close(&signals).unwrap();

        bus.send(&Event::InterruptionStopped { duration: 1 });
        assert!(hook.log().is_empty());
    }
}
