//! Task persistence seam used by the batch scheduler.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::PersistenceError;
use crate::task::SchedulableTask;

/// Persistence operations the scheduler needs.
///
/// Each `update_task` call must be atomic for that task.
pub trait TaskStore: Send + Sync {
    /// Overwrite the stored task with the same id and owner.
    fn update_task(&self, task: &SchedulableTask) -> Result<(), PersistenceError>;

    /// Tasks of `user_id` with the given ids, in `ids` order. Unknown ids and
    /// tasks owned by someone else are left out.
    fn fetch_tasks(&self, user_id: &str, ids: &[String]) -> Result<Vec<SchedulableTask>, PersistenceError>;
}

/// Task store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<String, SchedulableTask>>,
    failing: Mutex<HashSet<String>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: SchedulableTask) {
        self.lock_tasks().insert(task.id.clone(), task);
    }

    pub fn get(&self, id: &str) -> Option<SchedulableTask> {
        self.lock_tasks().get(id).cloned()
    }

    /// Make every update of `task_id` fail as if the database were locked.
    pub fn fail_updates_for(&self, task_id: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(task_id.into());
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<String, SchedulableTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskStore for InMemoryTaskStore {
    fn update_task(&self, task: &SchedulableTask) -> Result<(), PersistenceError> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&task.id);
        if failing {
            return Err(PersistenceError::Locked);
        }

        let mut tasks = self.lock_tasks();
        match tasks.get_mut(&task.id) {
            Some(stored) if stored.user_id == task.user_id => {
                *stored = task.clone();
                Ok(())
            }
            _ => Err(PersistenceError::NotFound {
                task_id: task.id.clone(),
                user_id: task.user_id.clone(),
            }),
        }
    }

    fn fetch_tasks(&self, user_id: &str, ids: &[String]) -> Result<Vec<SchedulableTask>, PersistenceError> {
        let tasks = self.lock_tasks();
        Ok(ids
            .iter()
            .filter_map(|id| tasks.get(id))
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}
