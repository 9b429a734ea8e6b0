//! Calendar availability providers.
//!
//! A [`CalendarSource`] is one backend that can list raw events of a calendar
//! feed (CalDAV, Google, Outlook... all live outside this crate). The
//! [`SelectedCalendarsProvider`] turns a source plus the user's calendar
//! selection into the merged busy picture the slot finder consumes.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use super::busy::{merge_busy_intervals, BusyInterval};
use crate::error::AvailabilityError;

/// Default bound for a single calendar fetch.
pub const DEFAULT_FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Busy-time source for the scheduler.
#[async_trait]
pub trait CalendarAvailabilityProvider: Send + Sync {
    /// Busy intervals for `[range_start, range_end)`, merged, disjoint and
    /// ordered by start.
    async fn get_busy_intervals(
        &self,
        user_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, AvailabilityError>;
}

/// Participation status of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
    /// Marked "show as free" / transparent
    Free,
}

/// Raw calendar event as delivered by a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub calendar_id: String,
    #[serde(default)]
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub status: EventStatus,
}

impl CalendarEvent {
    pub fn new(
        id: impl Into<String>,
        calendar_id: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            calendar_id: calendar_id.into(),
            title: String::new(),
            start,
            end,
            all_day: false,
            status: EventStatus::Confirmed,
        }
    }

    /// Whether this event occupies the user's time.
    pub fn blocks_time(&self, include_all_day: bool) -> bool {
        let status_blocks = matches!(self.status, EventStatus::Confirmed | EventStatus::Tentative);
        status_blocks && (include_all_day || !self.all_day) && self.start < self.end
    }
}

/// One backend able to list the events of a calendar feed.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_events(
        &self,
        user_id: &str,
        calendar_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, AvailabilityError>;
}

/// Availability over the calendars a user selected for conflict checking.
///
/// Calendars missing from the selection are invisible. Every selected
/// calendar is fetched concurrently, each bounded by the fetch timeout.
pub struct SelectedCalendarsProvider<S> {
    source: S,
    selected: BTreeSet<String>,
    fetch_timeout: StdDuration,
    include_all_day: bool,
}

impl<S: CalendarSource> SelectedCalendarsProvider<S> {
    pub fn new(source: S, selected: BTreeSet<String>) -> Self {
        Self {
            source,
            selected,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            include_all_day: false,
        }
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Treat all-day events as busy for their whole span.
    pub fn include_all_day_events(mut self, include: bool) -> Self {
        self.include_all_day = include;
        self
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    async fn fetch_calendar(
        &self,
        user_id: &str,
        calendar_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, AvailabilityError> {
        let fetch = self
            .source
            .list_events(user_id, calendar_id, range_start, range_end);
        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(AvailabilityError::Timeout {
                calendar_id: calendar_id.to_string(),
                timeout_secs: self.fetch_timeout.as_secs().max(1),
            }),
        }
    }
}

#[async_trait]
impl<S: CalendarSource> CalendarAvailabilityProvider for SelectedCalendarsProvider<S> {
    async fn get_busy_intervals(
        &self,
        user_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, AvailabilityError> {
        if range_end <= range_start || self.selected.is_empty() {
            return Ok(Vec::new());
        }

        let fetches = self
            .selected
            .iter()
            .map(|calendar_id| self.fetch_calendar(user_id, calendar_id, range_start, range_end));
        let per_calendar = try_join_all(fetches).await?;

        let intervals = per_calendar
            .into_iter()
            .flatten()
            .filter(|event| self.selected.contains(&event.calendar_id))
            .filter(|event| event.blocks_time(self.include_all_day))
            .filter_map(|event| BusyInterval::new(event.start, event.end).clipped(range_start, range_end))
            .collect();

        let merged = merge_busy_intervals(intervals);
        tracing::debug!(
            user_id,
            calendars = self.selected.len(),
            intervals = merged.len(),
            "loaded busy intervals"
        );
        Ok(merged)
    }
}

/// Calendar source backed by events held in memory.
///
/// Used by tests and by the CLI, which loads events from a JSON file.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCalendarSource {
    events: HashMap<(String, String), Vec<CalendarEvent>>,
    failures: HashMap<String, String>,
}

impl InMemoryCalendarSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the user's copy of `event.calendar_id`.
    pub fn add_event(&mut self, user_id: impl Into<String>, event: CalendarEvent) {
        self.events
            .entry((user_id.into(), event.calendar_id.clone()))
            .or_default()
            .push(event);
    }

    pub fn with_events(
        mut self,
        user_id: &str,
        events: impl IntoIterator<Item = CalendarEvent>,
    ) -> Self {
        for event in events {
            self.add_event(user_id, event);
        }
        self
    }

    /// Make every fetch of `calendar_id` fail with `message`.
    pub fn fail_calendar(&mut self, calendar_id: impl Into<String>, message: impl Into<String>) {
        self.failures.insert(calendar_id.into(), message.into());
    }
}

#[async_trait]
impl CalendarSource for InMemoryCalendarSource {
    async fn list_events(
        &self,
        user_id: &str,
        calendar_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, AvailabilityError> {
        if let Some(message) = self.failures.get(calendar_id) {
            return Err(AvailabilityError::FetchFailed {
                calendar_id: calendar_id.to_string(),
                message: message.clone(),
            });
        }

        let key = (user_id.to_string(), calendar_id.to_string());
        Ok(self
            .events
            .get(&key)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.start < range_end && e.end > range_start)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn selection(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn source() -> InMemoryCalendarSource {
        InMemoryCalendarSource::new().with_events(
            "u1",
            vec![
                CalendarEvent::new("standup", "work", at(9, 0), at(9, 30)),
                CalendarEvent::new("review", "work", at(10, 0), at(11, 0)),
                CalendarEvent::new("dentist", "personal", at(10, 30), at(12, 0)),
                CalendarEvent::new("holiday", "holidays", at(0, 0), at(23, 59)),
            ],
        )
    }

    #[tokio::test]
    async fn merges_across_selected_feeds() {
        let provider = SelectedCalendarsProvider::new(source(), selection(&["work", "personal"]));
        let busy = provider
            .get_busy_intervals("u1", at(8, 0), at(18, 0))
            .await
            .unwrap();

        assert_eq!(
            busy,
            vec![
                BusyInterval::new(at(9, 0), at(9, 30)),
                BusyInterval::new(at(10, 0), at(12, 0)),
            ]
        );
    }

    #[tokio::test]
    async fn unselected_calendars_are_invisible() {
        let provider = SelectedCalendarsProvider::new(source(), selection(&["personal"]));
        let busy = provider
            .get_busy_intervals("u1", at(8, 0), at(18, 0))
            .await
            .unwrap();
        assert_eq!(busy, vec![BusyInterval::new(at(10, 30), at(12, 0))]);
    }

    #[tokio::test]
    async fn other_users_events_are_not_visible() {
        let provider = SelectedCalendarsProvider::new(source(), selection(&["work"]));
        let busy = provider
            .get_busy_intervals("u2", at(8, 0), at(18, 0))
            .await
            .unwrap();
        assert!(busy.is_empty());
    }

    #[tokio::test]
    async fn intervals_are_clipped_to_range() {
        let provider = SelectedCalendarsProvider::new(source(), selection(&["work"]));
        let busy = provider
            .get_busy_intervals("u1", at(10, 30), at(18, 0))
            .await
            .unwrap();
        assert_eq!(busy, vec![BusyInterval::new(at(10, 30), at(11, 0))]);
    }

    #[tokio::test]
    async fn cancelled_free_and_all_day_events_do_not_block() {
        let mut cancelled = CalendarEvent::new("c", "work", at(13, 0), at(14, 0));
        cancelled.status = EventStatus::Cancelled;
        let mut free = CalendarEvent::new("f", "work", at(14, 0), at(15, 0));
        free.status = EventStatus::Free;
        let mut all_day = CalendarEvent::new("a", "work", at(0, 0), at(23, 0));
        all_day.all_day = true;

        let src = InMemoryCalendarSource::new().with_events("u1", vec![cancelled, free, all_day]);
        let provider = SelectedCalendarsProvider::new(src.clone(), selection(&["work"]));
        let busy = provider
            .get_busy_intervals("u1", at(8, 0), at(18, 0))
            .await
            .unwrap();
        assert!(busy.is_empty());

        let provider = SelectedCalendarsProvider::new(src, selection(&["work"])).include_all_day_events(true);
        let busy = provider
            .get_busy_intervals("u1", at(8, 0), at(18, 0))
            .await
            .unwrap();
        assert_eq!(busy, vec![BusyInterval::new(at(8, 0), at(18, 0))]);
    }

    #[tokio::test]
    async fn failing_feed_fails_the_whole_fetch() {
        let mut src = source();
        src.fail_calendar("personal", "503 Service Unavailable");
        let provider = SelectedCalendarsProvider::new(src, selection(&["work", "personal"]));

        let err = provider
            .get_busy_intervals("u1", at(8, 0), at(18, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::FetchFailed { calendar_id, .. } if calendar_id == "personal"));
    }

    struct StalledSource;

    #[async_trait]
    impl CalendarSource for StalledSource {
        async fn list_events(
            &self,
            _user_id: &str,
            _calendar_id: &str,
            _range_start: DateTime<Utc>,
            _range_end: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>, AvailabilityError> {
            tokio::time::sleep(StdDuration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn slow_feed_times_out() {
        let provider = SelectedCalendarsProvider::new(StalledSource, selection(&["slow"]))
            .with_timeout(StdDuration::from_millis(20));

        let err = provider
            .get_busy_intervals("u1", at(8, 0), at(18, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::Timeout { calendar_id, .. } if calendar_id == "slow"));
    }

    #[tokio::test]
    async fn empty_selection_means_no_busy_time() {
        let provider = SelectedCalendarsProvider::new(source(), BTreeSet::new());
        let busy = provider
            .get_busy_intervals("u1", at(8, 0), at(18, 0))
            .await
            .unwrap();
        assert!(busy.is_empty());
    }
}
