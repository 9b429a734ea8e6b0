//! Candidate slot enumeration and ranking for a single task.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::conflicts::ConflictAccumulator;
use super::SchedulerConfig;
use crate::calendar::{intersects_sorted, CalendarAvailabilityProvider};
use crate::error::{Result, ValidationError};
use crate::scoring::{ScoreBreakdown, ScoringContext, SlotScoringEngine};
use crate::settings::AutoScheduleSettings;
use crate::task::SchedulableTask;

/// A scored candidate slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Best slot found by a windowed search and the window that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMatch {
    pub slot: TimeSlot,
    pub window_days: u32,
}

/// Finds and ranks slots for one task at a time.
///
/// The finder itself is stateless between calls; synthetic busy time of the
/// current run comes in through the [`ConflictAccumulator`] argument, so
/// repeated calls with the same accumulator return the same ranking.
pub struct SlotFinder<'a, P: ?Sized> {
    provider: &'a P,
    settings: &'a AutoScheduleSettings,
    config: &'a SchedulerConfig,
    scoring: SlotScoringEngine,
    tz: Tz,
    now: DateTime<Utc>,
}

impl<'a, P> SlotFinder<'a, P>
where
    P: CalendarAvailabilityProvider + ?Sized,
{
    /// Create a finder; settings and config are validated up front.
    pub fn new(
        provider: &'a P,
        settings: &'a AutoScheduleSettings,
        config: &'a SchedulerConfig,
    ) -> Result<Self> {
        settings.validate()?;
        config.validate()?;
        Ok(Self {
            provider,
            settings,
            config,
            scoring: SlotScoringEngine::new(config.weights, config.project_proximity_minutes),
            tz: settings.tz()?,
            now: Utc::now(),
        })
    }

    /// Fix the reference time used for urgency scoring.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// All slots for `task` inside `[range_start, range_end]`, best first.
    ///
    /// Ties are broken by the earlier start. An empty list means the task does
    /// not fit anywhere in the range.
    pub async fn find_available_slots(
        &self,
        task: &SchedulableTask,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        user_id: &str,
        conflicts: &ConflictAccumulator,
    ) -> Result<Vec<TimeSlot>> {
        task.validate()?;
        if range_end <= range_start {
            return Err(ValidationError::InvalidTimeRange {
                start: range_start,
                end: range_end,
            }
            .into());
        }

        let buffer = Duration::minutes(i64::from(self.settings.buffer_minutes));
        let busy = self
            .provider
            .get_busy_intervals(user_id, range_start - buffer, range_end + buffer)
            .await?;

        let duration = task.duration();
        let neighbors = task
            .project_id
            .as_deref()
            .map(|project| conflicts.project_neighbors(project, &task.id))
            .unwrap_or_default();

        let mut slots: Vec<TimeSlot> = self
            .candidate_starts(duration, range_start, range_end)
            .into_iter()
            .filter_map(|start| {
                let end = start + duration;
                if intersects_sorted(&busy, start - buffer, end + buffer)
                    || conflicts.conflicts_with(&task.id, start, end, buffer)
                {
                    return None;
                }

                let ctx = ScoringContext {
                    task,
                    settings: self.settings,
                    start,
                    end,
                    local_start_hour: start.with_timezone(&self.tz).hour(),
                    now: self.now,
                    project_neighbors: &neighbors,
                };
                let breakdown = self.scoring.score_slot(&ctx);
                Some(TimeSlot {
                    start,
                    end,
                    score: breakdown.total_score,
                    breakdown,
                })
            })
            .collect();

        slots.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.start.cmp(&b.start)));
        tracing::debug!(
            task_id = %task.id,
            candidates = slots.len(),
            %range_start,
            %range_end,
            "ranked slots"
        );
        Ok(slots)
    }

    /// Search the configured windows in order, starting at `now`.
    ///
    /// The first window holding at least one slot wins; wider windows are not
    /// explored after that.
    pub async fn search_windows(
        &self,
        task: &SchedulableTask,
        user_id: &str,
        conflicts: &ConflictAccumulator,
    ) -> Result<Option<WindowMatch>> {
        for &window_days in &self.config.search_window_days {
            let range_end = self.now + Duration::days(i64::from(window_days));
            let slots = self
                .find_available_slots(task, self.now, range_end, user_id, conflicts)
                .await?;
            if let Some(slot) = slots.into_iter().next() {
                return Ok(Some(WindowMatch { slot, window_days }));
            }
        }
        Ok(None)
    }

    /// Start times of every slot of `duration` that lies inside working
    /// hours on a work day and wholly inside the range.
    fn candidate_starts(
        &self,
        duration: Duration,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let step = Duration::minutes(i64::from(self.config.slot_granularity_minutes));
        let first_day = range_start.with_timezone(&self.tz).date_naive();
        let last_day = range_end.with_timezone(&self.tz).date_naive();

        let mut starts = Vec::new();
        for date in first_day.iter_days().take_while(|d| *d <= last_day) {
            if !self.settings.is_work_day(date) {
                continue;
            }
            let (Some(day_start), Some(day_end)) = (
                self.local_hour(date, self.settings.work_hour_start),
                self.local_hour(date, self.settings.work_hour_end),
            ) else {
                continue;
            };

            let mut start = day_start;
            while start + duration <= day_end {
                if start >= range_start && start + duration <= range_end {
                    starts.push(start);
                }
                start += step;
            }
        }
        starts
    }

    /// `hour:00` local time on `date` (hour 24 is the following midnight).
    fn local_hour(&self, date: NaiveDate, hour: u8) -> Option<DateTime<Utc>> {
        let (date, hour) = if hour >= 24 {
            (date.succ_opt()?, 0)
        } else {
            (date, u32::from(hour))
        };
        let naive = date.and_hms_opt(hour, 0, 0)?;
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarEvent, InMemoryCalendarSource, SelectedCalendarsProvider};
    use crate::task::{EnergyLevel, PreferredTime};
    use chrono::Datelike;

    // 2026-03-02 is a Monday.
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
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn energy_window_wins_scenario() {
        let provider = provider(Vec::new());
        let mut settings = settings();
        settings.set_energy_range(EnergyLevel::High, 9, 11);
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config)
            .unwrap()
            .with_now(at(2, 7, 0));

        let task = SchedulableTask::new("u1", "Deep work")
            .with_duration(60)
            .with_energy(EnergyLevel::High);
        let slots = finder
            .find_available_slots(&task, at(2, 7, 0), at(2, 23, 0), "u1", &ConflictAccumulator::new())
            .await
            .unwrap();

        let best = &slots[0];
        assert!(best.start >= at(2, 9, 0) && best.start < at(2, 10, 0));
        let afternoon = slots.iter().find(|s| s.start == at(2, 14, 0)).unwrap();
        assert!(best.score > afternoon.score);
    }

    #[tokio::test]
    async fn slots_stay_inside_working_hours_and_work_days() {
        let provider = provider(Vec::new());
        let settings = settings();
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config)
            .unwrap()
            .with_now(at(1, 0, 0));

        let task = SchedulableTask::new("u1", "Any").with_duration(45);
        let slots = finder
            .find_available_slots(&task, at(1, 0, 0), at(8, 0, 0), "u1", &ConflictAccumulator::new())
            .await
            .unwrap();

        assert!(!slots.is_empty());
        for slot in &slots {
            assert!(slot.start.hour() >= 9);
            assert!(slot.end <= slot.start.date_naive().and_hms_opt(17, 0, 0).unwrap().and_utc());
            let weekday = slot.start.weekday().num_days_from_sunday();
            assert!((1..=5).contains(&weekday), "weekend slot {:?}", slot.start);
        }
    }

    #[tokio::test]
    async fn busy_time_and_buffer_are_hard_filters() {
        let provider = provider(vec![CalendarEvent::new("m", "work", at(2, 12, 0), at(2, 13, 0))]);
        let settings = AutoScheduleSettings {
            buffer_minutes: 15,
            ..settings()
        };
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config)
            .unwrap()
            .with_now(at(2, 7, 0));

        let task = SchedulableTask::new("u1", "Prep").with_duration(30);
        let slots = finder
            .find_available_slots(&task, at(2, 7, 0), at(2, 23, 0), "u1", &ConflictAccumulator::new())
            .await
            .unwrap();

        let pad = Duration::minutes(15);
        for slot in &slots {
            assert!(!(slot.start - pad < at(2, 13, 0) && slot.end + pad > at(2, 12, 0)));
        }
        assert!(slots.iter().any(|s| s.start == at(2, 11, 15)));
        assert!(!slots.iter().any(|s| s.start == at(2, 11, 30)));
        assert!(slots.iter().any(|s| s.start == at(2, 13, 15)));
    }

    #[tokio::test]
    async fn full_day_task_moves_past_a_blocked_day() {
        let provider = provider(vec![CalendarEvent::new("lunch", "work", at(2, 12, 0), at(2, 13, 0))]);
        let settings = AutoScheduleSettings {
            buffer_minutes: 10,
            ..settings()
        };
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config)
            .unwrap()
            .with_now(at(2, 7, 0));

        let task = SchedulableTask::new("u1", "Offsite").with_duration(480);
        let monday_only = finder
            .find_available_slots(&task, at(2, 7, 0), at(2, 23, 0), "u1", &ConflictAccumulator::new())
            .await
            .unwrap();
        assert!(monday_only.is_empty());

        let found = finder
            .search_windows(&task, "u1", &ConflictAccumulator::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.slot.start, at(3, 9, 0));
        assert_eq!(found.slot.end, at(3, 17, 0));
        assert_eq!(found.window_days, 7);
    }

    #[tokio::test]
    async fn committed_conflicts_are_honored() {
        let provider = provider(Vec::new());
        let settings = settings();
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config)
            .unwrap()
            .with_now(at(2, 7, 0));

        let mut placed = SchedulableTask::new("u1", "Placed").with_id("placed");
        placed.commit_slot(at(2, 9, 0), at(2, 16, 0), 1.0);
        let mut conflicts = ConflictAccumulator::new();
        conflicts.add_scheduled_task_conflict(&placed);

        let task = SchedulableTask::new("u1", "Next").with_duration(60);
        let slots = finder
            .find_available_slots(&task, at(2, 7, 0), at(2, 23, 0), "u1", &conflicts)
            .await
            .unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, at(2, 16, 0));
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let provider = provider(vec![CalendarEvent::new("m", "work", at(3, 10, 0), at(3, 11, 0))]);
        let settings = settings();
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config)
            .unwrap()
            .with_now(at(2, 7, 0));
        let task = SchedulableTask::new("u1", "Calls")
            .with_duration(30)
            .with_preferred_time(PreferredTime::Afternoon);
        let conflicts = ConflictAccumulator::new();

        let first = finder
            .find_available_slots(&task, at(2, 7, 0), at(6, 23, 0), "u1", &conflicts)
            .await
            .unwrap();
        let second = finder
            .find_available_slots(&task, at(2, 7, 0), at(6, 23, 0), "u1", &conflicts)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert!(first[0].start >= at(2, 12, 0) && first[0].start < at(2, 17, 0));
    }

    #[tokio::test]
    async fn ties_break_on_earliest_start() {
        let provider = provider(Vec::new());
        let settings = settings();
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config)
            .unwrap()
            .with_now(at(2, 9, 0));

        let task = SchedulableTask::new("u1", "Plain").with_duration(30);
        let slots = finder
            .find_available_slots(&task, at(2, 9, 0), at(2, 17, 0), "u1", &ConflictAccumulator::new())
            .await
            .unwrap();
        assert_eq!(slots[0].start, at(2, 9, 0));
        for pair in slots.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].start < pair[1].start)
            );
        }
    }

    #[tokio::test]
    async fn respects_user_timezone() {
        let provider = provider(Vec::new());
        let settings = AutoScheduleSettings {
            timezone: "America/New_York".into(),
            ..settings()
        };
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config)
            .unwrap()
            .with_now(at(2, 0, 0));

        let task = SchedulableTask::new("u1", "Remote").with_duration(60);
        let slots = finder
            .find_available_slots(&task, at(2, 0, 0), at(3, 0, 0), "u1", &ConflictAccumulator::new())
            .await
            .unwrap();
        // 09:00 EST on 2026-03-02 is 14:00 UTC.
        assert_eq!(slots.iter().map(|s| s.start).min().unwrap(), at(2, 14, 0));
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let provider = provider(Vec::new());
        let settings = settings();
        let config = SchedulerConfig::default();
        let finder = SlotFinder::new(&provider, &settings, &config).unwrap();
        let conflicts = ConflictAccumulator::new();

        let task = SchedulableTask::new("u1", "Task");
        assert!(finder
            .find_available_slots(&task, at(3, 0, 0), at(2, 0, 0), "u1", &conflicts)
            .await
            .is_err());

        let zero = SchedulableTask::new("u1", "Zero").with_duration(0);
        assert!(finder
            .find_available_slots(&zero, at(2, 0, 0), at(3, 0, 0), "u1", &conflicts)
            .await
            .is_err());

        let bad_settings = AutoScheduleSettings {
            work_hour_start: 18,
            ..settings.clone()
        };
        assert!(SlotFinder::new(&provider, &bad_settings, &config).is_err());
    }
}
