//! Named plugin lookup.
//!
//! Task sources are registered under the name used in `[plugins] task = ...`.
//! A registry is an ordinary value owned by the application; there is no
//! process-wide plugin table.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::task::{NullTaskSource, TaskSource};

#[derive(Clone, Default)]
pub struct PluginRegistry {
    task_sources: BTreeMap<String, Arc<dyn TaskSource>>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `nulltask` source.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_task_source(Arc::new(NullTaskSource));
        registry
    }

    /// Register `source` under its own name, replacing any previous source
    /// with that name.
    pub fn register_task_source(&mut self, source: Arc<dyn TaskSource>) {
        let name = source.name().to_string();
        if self.task_sources.insert(name.clone(), source).is_some() {
            tracing::warn!(plugin = %name, "replacing registered task source");
        }
    }

    pub fn task_source(&self, name: &str) -> Result<Arc<dyn TaskSource>> {
        self.task_sources
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownPlugin(name.to_string()))
    }

    /// Registered task source names, sorted.
    pub fn task_sources(&self) -> Vec<String> {
        self.task_sources.keys().cloned().collect()
    }

    pub fn contains_task_source(&self, name: &str) -> bool {
        self.task_sources.contains_key(name)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("task_sources", &self.task_sources())
            .finish()
    }
}
