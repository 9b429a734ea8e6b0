//! Two-phase batch scheduling.
//!
//! Phase 1 probes every movable task against the same conflict set and records
//! the best score it could get. Phase 2 walks the tasks in descending score
//! order and commits them one by one, feeding each committed slot back into
//! the conflict set before the next search.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::conflicts::ConflictAccumulator;
use super::slot_finder::{SlotFinder, WindowMatch};
use super::{ProbeStrategy, SchedulerConfig};
use crate::calendar::{AvailabilitySnapshot, CalendarAvailabilityProvider};
use crate::error::Result;
use crate::settings::AutoScheduleSettings;
use crate::storage::TaskStore;
use crate::task::SchedulableTask;

/// Why a task was left without a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnscheduledReason {
    /// Every configured window was searched without a fit
    NoSlotFound { windows_tried: Vec<u32> },
    /// The task data can never be placed
    Invalid { message: String },
    /// Searching or persisting failed for this task only
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscheduledTask {
    pub task_id: String,
    pub reason: UnscheduledReason,
}

/// Outcome of one scheduling run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// All requested tasks as re-read from the store, in request order
    pub tasks: Vec<SchedulableTask>,
    /// Set when the final re-read failed; `tasks` then holds the run's own copies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reread_error: Option<String>,
    /// Ids committed in this run, in commit order
    pub scheduled: Vec<String>,
    pub unscheduled: Vec<UnscheduledTask>,
    /// Locked tasks left untouched
    pub skipped_locked: Vec<String>,
}

impl RunReport {
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn pending_count(&self) -> usize {
        self.unscheduled.len()
    }

    /// One-line summary for the caller, e.g. `"3 scheduled, 1 pending"`.
    pub fn summary(&self) -> String {
        format!(
            "{} scheduled, {} pending",
            self.scheduled_count(),
            self.pending_count()
        )
    }
}

/// Places a list of tasks for one user in a single run.
pub struct BatchScheduler<'a, P: ?Sized, S: ?Sized> {
    provider: &'a P,
    store: &'a S,
    settings: &'a AutoScheduleSettings,
    config: &'a SchedulerConfig,
    now: Option<DateTime<Utc>>,
}

impl<'a, P, S> BatchScheduler<'a, P, S>
where
    P: CalendarAvailabilityProvider + ?Sized,
    S: TaskStore + ?Sized,
{
    pub fn new(
        provider: &'a P,
        store: &'a S,
        settings: &'a AutoScheduleSettings,
        config: &'a SchedulerConfig,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
            config,
            now: None,
        }
    }

    /// Pin the run clock instead of reading the system time.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Schedule `tasks` for `user_id`.
    ///
    /// Invalid settings and calendar failures abort the run before any task
    /// is written. Everything that goes wrong for a single task only marks
    /// that task as unscheduled in the returned report.
    pub async fn schedule_multiple_tasks(
        &self,
        tasks: &[SchedulableTask],
        user_id: &str,
    ) -> Result<RunReport> {
        self.settings.validate()?;
        self.config.validate()?;

        let now = self.now.unwrap_or_else(Utc::now);
        let buffer = Duration::minutes(i64::from(self.settings.buffer_minutes));
        let horizon = Duration::days(i64::from(self.config.max_window_days()));
        let snapshot =
            AvailabilitySnapshot::load(self.provider, user_id, now - buffer, now + horizon + buffer)
                .await?;
        let finder = SlotFinder::new(&snapshot, self.settings, self.config)?.with_now(now);

        let mut conflicts = ConflictAccumulator::new();
        let seeded = conflicts.seed_locked(tasks.iter().filter(|t| t.user_id == user_id));

        let mut report = RunReport::default();
        let mut movable = Vec::new();
        let mut seen = HashSet::new();
        for task in tasks {
            if !seen.insert(task.id.as_str()) {
                tracing::warn!(task_id = %task.id, "skipping repeated task id");
                report.unscheduled.push(UnscheduledTask {
                    task_id: task.id.clone(),
                    reason: UnscheduledReason::Invalid {
                        message: format!("task '{}' appears more than once in the run", task.id),
                    },
                });
                continue;
            }
            if task.schedule_locked {
                report.skipped_locked.push(task.id.clone());
                continue;
            }
            match self.check_task(task, user_id) {
                Ok(()) => movable.push(task),
                Err(message) => {
                    tracing::warn!(task_id = %task.id, %message, "skipping invalid task");
                    report.unscheduled.push(UnscheduledTask {
                        task_id: task.id.clone(),
                        reason: UnscheduledReason::Invalid { message },
                    });
                }
            }
        }

        tracing::info!(
            user_id,
            tasks = movable.len(),
            locked = report.skipped_locked.len(),
            seeded,
            "starting scheduling run"
        );

        let estimates = self.estimate(&finder, &movable, user_id, &conflicts).await;
        let mut order: Vec<(&SchedulableTask, Option<f64>)> =
            movable.into_iter().zip(estimates).collect();
        order.sort_by(|a, b| by_score_desc(a.1, b.1));

        let mut committed = HashMap::new();
        for (task, _) in order {
            match finder.search_windows(task, user_id, &conflicts).await {
                Ok(Some(found)) => {
                    let mut updated = task.clone();
                    updated.commit_slot(found.slot.start, found.slot.end, found.slot.score);
                    match self.store.update_task(&updated) {
                        Ok(()) => {
                            conflicts.add_scheduled_task_conflict(&updated);
                            tracing::debug!(
                                task_id = %updated.id,
                                start = %found.slot.start,
                                end = %found.slot.end,
                                score = found.slot.score,
                                window_days = found.window_days,
                                "committed slot"
                            );
                            report.scheduled.push(updated.id.clone());
                            committed.insert(updated.id.clone(), updated);
                        }
                        Err(err) => {
                            tracing::warn!(task_id = %task.id, error = %err, "failed to persist slot");
                            report.unscheduled.push(UnscheduledTask {
                                task_id: task.id.clone(),
                                reason: UnscheduledReason::Failed {
                                    message: err.to_string(),
                                },
                            });
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!(
                        task_id = %task.id,
                        windows = ?self.config.search_window_days,
                        "no slot found"
                    );
                    report.unscheduled.push(UnscheduledTask {
                        task_id: task.id.clone(),
                        reason: UnscheduledReason::NoSlotFound {
                            windows_tried: self.config.search_window_days.clone(),
                        },
                    });
                }
                Err(err) => {
                    tracing::warn!(task_id = %task.id, error = %err, "slot search failed");
                    report.unscheduled.push(UnscheduledTask {
                        task_id: task.id.clone(),
                        reason: UnscheduledReason::Failed {
                            message: err.to_string(),
                        },
                    });
                }
            }
        }

        let mut ids: Vec<String> = Vec::with_capacity(tasks.len());
        for task in tasks {
            if !ids.contains(&task.id) {
                ids.push(task.id.clone());
            }
        }
        match self.store.fetch_tasks(user_id, &ids) {
            Ok(stored) => report.tasks = stored,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "failed to re-read tasks after the run");
                report.tasks = local_copies(tasks, user_id, &mut committed);
                report.reread_error = Some(err.to_string());
            }
        }

        tracing::info!(user_id, summary = %report.summary(), "scheduling run finished");
        Ok(report)
    }

    fn check_task(&self, task: &SchedulableTask, user_id: &str) -> Result<(), String> {
        if task.user_id != user_id {
            return Err(format!(
                "task belongs to user '{}', not '{user_id}'",
                task.user_id
            ));
        }
        task.validate().map_err(|e| e.to_string())
    }

    /// Best achievable score per task, in input order. Nothing is mutated.
    async fn estimate(
        &self,
        finder: &SlotFinder<'_, AvailabilitySnapshot>,
        tasks: &[&SchedulableTask],
        user_id: &str,
        conflicts: &ConflictAccumulator,
    ) -> Vec<Option<f64>> {
        let mut scores = Vec::with_capacity(tasks.len());
        match self.config.probe_strategy {
            ProbeStrategy::Sequential => {
                for task in tasks {
                    scores.push(probe(finder, task, user_id, conflicts).await);
                }
            }
            ProbeStrategy::Concurrent { batch_size } => {
                for batch in tasks.chunks(batch_size.max(1)) {
                    let probes = batch
                        .iter()
                        .map(|task| probe(finder, task, user_id, conflicts));
                    scores.extend(join_all(probes).await);
                }
            }
        }
        scores
    }
}

/// Request-order view of the run built from memory: committed copies where a
/// slot was written, the input otherwise.
fn local_copies(
    tasks: &[SchedulableTask],
    user_id: &str,
    committed: &mut HashMap<String, SchedulableTask>,
) -> Vec<SchedulableTask> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .filter(|t| t.user_id == user_id && seen.insert(t.id.as_str()))
        .map(|t| committed.remove(&t.id).unwrap_or_else(|| t.clone()))
        .collect()
}

async fn probe(
    finder: &SlotFinder<'_, AvailabilitySnapshot>,
    task: &SchedulableTask,
    user_id: &str,
    conflicts: &ConflictAccumulator,
) -> Option<f64> {
    best_score(task, finder.search_windows(task, user_id, conflicts).await)
}

fn best_score(task: &SchedulableTask, result: Result<Option<WindowMatch>>) -> Option<f64> {
    match result {
        Ok(found) => found.map(|m| m.slot.score),
        Err(err) => {
            tracing::warn!(task_id = %task.id, error = %err, "scoring probe failed");
            None
        }
    }
}

/// Descending by score; tasks without a score go last.
fn by_score_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarEvent, InMemoryCalendarSource, SelectedCalendarsProvider};
    use crate::storage::InMemoryTaskStore;
    use crate::task::Priority;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    fn provider(events: Vec<CalendarEvent>) -> SelectedCalendarsProvider<InMemoryCalendarSource> {
        let source = InMemoryCalendarSource::new().with_events("u1", events);
        SelectedCalendarsProvider::new(source, ["work".to_string()].into())
    }

    fn settings() -> AutoScheduleSettings {
        AutoScheduleSettings {
            selected_calendars: ["work".to_string()].into(),
            buffer_minutes: 10,
            ..Default::default()
        }
    }

    fn store_with(tasks: &[SchedulableTask]) -> InMemoryTaskStore {
        let store = InMemoryTaskStore::new();
        for task in tasks {
            store.insert(task.clone());
        }
        store
    }

    #[test]
    fn score_order_puts_unscored_last() {
        let mut scores = vec![(0, None), (1, Some(0.4)), (2, Some(0.9)), (3, None), (4, Some(0.4))];
        scores.sort_by(|a, b| by_score_desc(a.1, b.1));
        let ids: Vec<_> = scores.iter().map(|s| s.0).collect();
        assert_eq!(ids, vec![2, 1, 4, 0, 3]);
    }

    #[test]
    fn summary_counts_pending() {
        let report = RunReport {
            scheduled: vec!["a".into(), "b".into()],
            unscheduled: vec![UnscheduledTask {
                task_id: "c".into(),
                reason: UnscheduledReason::NoSlotFound {
                    windows_tried: vec![7],
                },
            }],
            ..Default::default()
        };
        assert_eq!(report.summary(), "2 scheduled, 1 pending");
    }

    #[tokio::test]
    async fn higher_scoring_task_commits_first() {
        let provider = provider(Vec::new());
        let settings = settings();
        let config = SchedulerConfig {
            search_window_days: vec![1],
            ..Default::default()
        };
        let low = SchedulableTask::new("u1", "Low")
            .with_id("low")
            .with_duration(60)
            .with_priority(Priority::Low);
        let high = SchedulableTask::new("u1", "High")
            .with_id("high")
            .with_duration(60)
            .with_priority(Priority::High);
        let tasks = vec![low, high];
        let store = store_with(&tasks);

        let report = BatchScheduler::new(&provider, &store, &settings, &config)
            .with_now(at(2, 8, 0))
            .schedule_multiple_tasks(&tasks, "u1")
            .await
            .unwrap();

        assert_eq!(report.scheduled, vec!["high".to_string(), "low".to_string()]);
        let high = store.get("high").unwrap();
        let low = store.get("low").unwrap();
        assert_eq!(high.scheduled_start, Some(at(2, 9, 0)));
        assert_eq!(low.scheduled_start, Some(at(2, 10, 15)));
        assert!(high.is_auto_scheduled && low.is_auto_scheduled);
    }

    #[tokio::test]
    async fn sequential_and_concurrent_probing_agree() {
        let provider = provider(vec![CalendarEvent::new("m", "work", at(2, 11, 0), at(2, 12, 0))]);
        let settings = settings();
        let tasks: Vec<_> = (0..5)
            .map(|i| {
                SchedulableTask::new("u1", format!("Task {i}"))
                    .with_id(format!("t{i}"))
                    .with_duration(30 + 15 * i)
            })
            .collect();

        let mut outcomes = Vec::new();
        for strategy in [
            ProbeStrategy::Sequential,
            ProbeStrategy::Concurrent { batch_size: 2 },
        ] {
            let config = SchedulerConfig {
                probe_strategy: strategy,
                ..Default::default()
            };
            let store = store_with(&tasks);
            let report = BatchScheduler::new(&provider, &store, &settings, &config)
                .with_now(at(2, 8, 0))
                .schedule_multiple_tasks(&tasks, "u1")
                .await
                .unwrap();
            outcomes.push(report.tasks);
        }
        assert_eq!(outcomes[0], outcomes[1]);
    }

    #[tokio::test]
    async fn repeated_task_id_is_scheduled_once() {
        let provider = provider(Vec::new());
        let settings = settings();
        let config = SchedulerConfig {
            search_window_days: vec![1],
            ..Default::default()
        };
        let task = SchedulableTask::new("u1", "Write").with_id("w").with_duration(60);
        let tasks = vec![task.clone(), task];
        let store = store_with(&tasks);

        let report = BatchScheduler::new(&provider, &store, &settings, &config)
            .with_now(at(2, 8, 0))
            .schedule_multiple_tasks(&tasks, "u1")
            .await
            .unwrap();

        assert_eq!(report.scheduled, vec!["w".to_string()]);
        assert_eq!(report.unscheduled.len(), 1);
        assert!(matches!(
            report.unscheduled[0].reason,
            UnscheduledReason::Invalid { .. }
        ));
        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].scheduled_start, Some(at(2, 9, 0)));
    }

    #[tokio::test]
    async fn foreign_and_invalid_tasks_are_reported() {
        let provider = provider(Vec::new());
        let settings = settings();
        let config = SchedulerConfig::default();
        let foreign = SchedulableTask::new("u2", "Not mine").with_id("foreign");
        let zero = SchedulableTask::new("u1", "Zero").with_id("zero").with_duration(0);
        let ok = SchedulableTask::new("u1", "Fine").with_id("ok");
        let tasks = vec![foreign, zero, ok];
        let store = store_with(&tasks);

        let report = BatchScheduler::new(&provider, &store, &settings, &config)
            .with_now(at(2, 8, 0))
            .schedule_multiple_tasks(&tasks, "u1")
            .await
            .unwrap();

        assert_eq!(report.scheduled, vec!["ok".to_string()]);
        assert_eq!(report.pending_count(), 2);
        assert!(report
            .unscheduled
            .iter()
            .all(|u| matches!(u.reason, UnscheduledReason::Invalid { .. })));
        // Only the user's own tasks come back.
        let ids: Vec<_> = report.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["zero", "ok"]);
    }
}
