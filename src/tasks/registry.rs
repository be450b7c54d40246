//! Task registry: name → immutable [`TaskSpec`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::CueError;
use crate::tasks::TaskSpec;

/// Registry of task types. Specs are immutable once registered.
pub(crate) struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<TaskSpec>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a task type. Duplicate names are a configuration error.
    pub fn register(&self, spec: TaskSpec) -> Result<(), CueError> {
        let mut tasks = self.tasks.write().expect("task registry poisoned");
        if tasks.contains_key(spec.name()) {
            return Err(CueError::config(format!(
                "task '{}' already registered",
                spec.name()
            )));
        }
        tasks.insert(spec.name().to_string(), Arc::new(spec));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<TaskSpec>> {
        self.tasks
            .read()
            .expect("task registry poisoned")
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks
            .read()
            .expect("task registry poisoned")
            .contains_key(name)
    }
}
