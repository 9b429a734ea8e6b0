//! Prefetched availability for one scheduling run.
//!
//! The batch scheduler loads the whole run horizon once, before touching any
//! task, and answers every later slot search from memory. A calendar failure
//! can therefore only surface before the first commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::busy::BusyInterval;
use super::provider::CalendarAvailabilityProvider;
use crate::error::AvailabilityError;

/// Busy intervals of one user over a fixed window.
#[derive(Debug, Clone)]
pub struct AvailabilitySnapshot {
    user_id: String,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    intervals: Vec<BusyInterval>,
}

impl AvailabilitySnapshot {
    /// Fetch `[window_start, window_end)` from `provider`.
    pub async fn load<P>(
        provider: &P,
        user_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Self, AvailabilityError>
    where
        P: CalendarAvailabilityProvider + ?Sized,
    {
        let intervals = provider
            .get_busy_intervals(user_id, window_start, window_end)
            .await?;
        Ok(Self {
            user_id: user_id.to_string(),
            window_start,
            window_end,
            intervals,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.window_start, self.window_end)
    }

    pub fn intervals(&self) -> &[BusyInterval] {
        &self.intervals
    }
}

#[async_trait]
impl CalendarAvailabilityProvider for AvailabilitySnapshot {
    async fn get_busy_intervals(
        &self,
        user_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, AvailabilityError> {
        if user_id != self.user_id {
            return Err(AvailabilityError::UserMismatch {
                expected: self.user_id.clone(),
                requested: user_id.to_string(),
            });
        }
        if range_start < self.window_start || range_end > self.window_end {
            return Err(AvailabilityError::OutsideSnapshot {
                start: range_start,
                end: range_end,
            });
        }

        // A filtered subsequence of a merged list stays merged.
        Ok(self
            .intervals
            .iter()
            .filter_map(|interval| interval.clipped(range_start, range_end))
            .collect())
    }
}
