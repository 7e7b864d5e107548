//! Tasks worked on during a session.
//!
//! Tasks are owned by a [`TaskSource`]; the pomodoro service only holds a
//! shared reference to the current one and passes it through in events.

mod source;

pub use source::{NullTaskSource, TaskSource};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// An activity the user works on during a pomodoro session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub uid: String,
    pub description: String,
    /// Estimated pomodoros to complete the task.
    pub estimate: u32,
    /// Pomodoros spent so far.
    pub actual: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Create a task. Without an explicit `uid` the task is identified by a
    /// hash of its description, so the same description always maps to the
    /// same id.
    pub fn new(
        uid: Option<String>,
        description: impl Into<String>,
        estimate: u32,
        actual: u32,
        tags: Vec<String>,
    ) -> Self {
        let description = description.into();
        let uid = uid.unwrap_or_else(|| description_uid(&description));
        Self {
            uid,
            description,
            estimate,
            actual,
            tags,
            completed: false,
        }
    }

    /// Placeholder shown by frontends when nothing is selected.
    pub fn null() -> Self {
        Self::new(Some("0".into()), "No task selected.", 0, 0, Vec::new())
    }

    pub fn update_actual(&mut self) {
        self.actual += 1;
    }

    pub fn update_estimate(&mut self, estimate: u32) {
        self.estimate = estimate;
    }

    pub fn mark_complete(&mut self) {
        self.completed = true;
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "I:{} | E:{} | A:{} | T:{} | D:{}",
            self.uid,
            self.estimate,
            self.actual,
            self.tags.join(","),
            self.description
        )
    }
}

fn description_uid(description: &str) -> String {
    let digest = Sha256::digest(description.as_bytes());
    // 16 bytes keeps ids short enough to type as a prefix.
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_defaults_to_description_hash() {
        let a = Task::new(None, "write report", 2, 0, Vec::new());
        let b = Task::new(None, "write report", 5, 1, Vec::new());
        let c = Task::new(None, "review report", 2, 0, Vec::new());
        assert_eq!(a.uid, b.uid);
        assert_ne!(a.uid, c.uid);
        assert_eq!(a.uid.len(), 32);
    }

    #[test]
    fn explicit_uid_is_kept() {
        let task = Task::new(Some("42".into()), "x", 1, 0, Vec::new());
        assert_eq!(task.uid, "42");
    }

    #[test]
    fn display_lists_all_attributes() {
        let task = Task::new(
            Some("7".into()),
            "Plan sprint",
            3,
            1,
            vec!["work".into(), "planning".into()],
        );
        assert_eq!(
            task.to_string(),
            "I:7 | E:3 | A:1 | T:work,planning | D:Plan sprint"
        );
    }

    #[test]
    fn counters_and_completion() {
        let mut task = Task::new(None, "x", 1, 0, Vec::new());
        task.update_actual();
        task.update_actual();
        task.update_estimate(4);
        task.mark_complete();
        assert_eq!(task.actual, 2);
        assert_eq!(task.estimate, 4);
        assert!(task.completed);
    }

    #[test]
    fn null_task_is_not_completed() {
        let task = Task::null();
        assert_eq!(task.uid, "0");
        assert!(!task.completed);
    }
}
