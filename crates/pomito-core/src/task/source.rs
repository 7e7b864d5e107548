use std::sync::Arc;

use super::Task;
use crate::error::{Result, ValidationError};

/// Every task provider implements this trait.
///
/// Implementations own their tasks and hand out shared references; the
/// service never mutates them.
pub trait TaskSource: Send + Sync {
    /// Unique identifier used in configuration (e.g. "nulltask").
    fn name(&self) -> &str;

    /// Called once at application start up.
    fn initialize(&self) -> Result<()> {
        Ok(()) // default no-op
    }

    /// All tasks currently known to the source.
    fn get_tasks(&self) -> Vec<Arc<Task>>;

    /// Tasks whose display string contains `filter`. `None` or `"*"` match
    /// everything.
    fn get_tasks_by_filter(&self, filter: Option<&str>) -> Vec<Arc<Task>> {
        match filter {
            None | Some("*") => self.get_tasks(),
            Some(filter) => self
                .get_tasks()
                .into_iter()
                .filter(|task| task.to_string().contains(filter))
                .collect(),
        }
    }

    /// The task whose uid starts with `prefix`, like a git commit-ish.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AmbiguousTaskId`] when more than one task
    /// matches.
    fn get_task_by_id(&self, prefix: &str) -> Result<Option<Arc<Task>>> {
        let mut matches: Vec<_> = self
            .get_tasks()
            .into_iter()
            .filter(|task| task.uid.starts_with(prefix))
            .collect();
        if matches.len() > 1 {
            return Err(ValidationError::AmbiguousTaskId {
                prefix: prefix.to_string(),
                count: matches.len(),
            }
            .into());
        }
        Ok(matches.pop())
    }
}

/// A task source that has no tasks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTaskSource;

impl TaskSource for NullTaskSource {
    fn name(&self) -> &str {
        "nulltask"
    }

    fn get_tasks(&self) -> Vec<Arc<Task>> {
        Vec::new()
    }
}
