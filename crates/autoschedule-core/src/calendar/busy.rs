//! Busy intervals and interval merging.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A time range during which the user is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Half-open overlap test against `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }

    /// Clip to `[start, end)`; `None` when nothing remains.
    pub fn clipped(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        let clipped = Self::new(self.start.max(start), self.end.min(end));
        (clipped.start < clipped.end).then_some(clipped)
    }

    /// Grow both sides by `padding`.
    pub fn padded(&self, padding: Duration) -> Self {
        Self::new(self.start - padding, self.end + padding)
    }
}

/// Merge intervals into a start-ordered list of disjoint intervals.
///
/// Overlapping and touching intervals collapse into one; empty or inverted
/// intervals are dropped.
pub fn merge_busy_intervals(mut intervals: Vec<BusyInterval>) -> Vec<BusyInterval> {
    intervals.retain(|i| i.start < i.end);
    intervals.sort_by_key(|i| (i.start, i.end));

    let mut merged: Vec<BusyInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(last) = merged.last_mut() {
            if interval.start <= last.end {
                last.end = last.end.max(interval.end);
                continue;
            }
        }
        merged.push(interval);
    }
    merged
}

/// Whether `[start, end)` intersects any interval of a merged, start-ordered list.
///
/// Relies on the list being disjoint, which makes the end times sorted too.
pub fn intersects_sorted(sorted: &[BusyInterval], start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let first_candidate = sorted.partition_point(|i| i.end <= start);
    sorted
        .get(first_candidate)
        .is_some_and(|i| i.start < end)
}
