//! Run-scoped synthetic busy time.
//!
//! A [`ConflictAccumulator`] is created at the start of a run, seeded with the
//! locked tasks, and grows by one entry per committed task. It is passed
//! explicitly to every slot search and dropped with the run.

use chrono::{DateTime, Duration, Utc};

use crate::calendar::BusyInterval;
use crate::task::SchedulableTask;

/// Slot held by a task placed (or locked) in the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub task_id: String,
    pub project_id: Option<String>,
    pub interval: BusyInterval,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictAccumulator {
    entries: Vec<Conflict>,
}

impl ConflictAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the slot of a just-committed task.
    ///
    /// Returns `false` when the task carries no slot. A task registered twice
    /// keeps only its latest slot. The buffer is not baked in here; slot
    /// searches apply it once when checking candidates.
    pub fn add_scheduled_task_conflict(&mut self, task: &SchedulableTask) -> bool {
        let Some((start, end)) = task.scheduled_interval() else {
            return false;
        };
        self.entries.retain(|c| c.task_id != task.id);
        self.entries.push(Conflict {
            task_id: task.id.clone(),
            project_id: task.project_id.clone(),
            interval: BusyInterval::new(start, end),
        });
        true
    }

    /// Register every locked task that holds a slot; returns how many did.
    pub fn seed_locked<'a>(&mut self, tasks: impl IntoIterator<Item = &'a SchedulableTask>) -> usize {
        tasks
            .into_iter()
            .filter(|t| t.schedule_locked)
            .filter(|t| self.add_scheduled_task_conflict(t))
            .count()
    }

    /// Whether `[start, end)` padded by `buffer` hits a slot held by another task.
    pub fn conflicts_with(
        &self,
        task_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        buffer: Duration,
    ) -> bool {
        self.entries
            .iter()
            .filter(|c| c.task_id != task_id)
            .any(|c| c.interval.overlaps(start - buffer, end + buffer))
    }

    /// Slots held by tasks of `project_id`, excluding `task_id` itself.
    pub fn project_neighbors(&self, project_id: &str, task_id: &str) -> Vec<BusyInterval> {
        self.entries
            .iter()
            .filter(|c| c.task_id != task_id && c.project_id.as_deref() == Some(project_id))
            .map(|c| c.interval)
            .collect()
    }

    pub fn entries(&self) -> &[Conflict] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
