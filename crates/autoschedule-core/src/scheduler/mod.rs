//! Automatic task scheduler.
//!
//! This module places unscheduled tasks into the user's calendar:
//! - [`SlotFinder`] enumerates and scores candidate slots for one task
//! - [`ConflictAccumulator`] carries the slots committed during one run
//! - [`BatchScheduler`] estimates, orders and commits a whole batch of tasks

mod batch;
mod conflicts;
mod slot_finder;

pub use batch::{BatchScheduler, RunReport, UnscheduledReason, UnscheduledTask};
pub use conflicts::{Conflict, ConflictAccumulator};
pub use slot_finder::{SlotFinder, TimeSlot, WindowMatch};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scoring::ObjectiveWeights;

/// How the scoring pass probes tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProbeStrategy {
    /// One task after another
    Sequential,
    /// Tasks are probed `batch_size` at a time; batches run one after another
    Concurrent { batch_size: usize },
}

impl Default for ProbeStrategy {
    fn default() -> Self {
        ProbeStrategy::Concurrent { batch_size: 8 }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Search windows in days, tried in order; the first one with a slot wins
    #[serde(default = "default_search_window_days")]
    pub search_window_days: Vec<u32>,
    /// Distance between candidate start times (minutes)
    #[serde(default = "default_slot_granularity")]
    pub slot_granularity_minutes: u32,
    #[serde(default)]
    pub probe_strategy: ProbeStrategy,
    #[serde(default)]
    pub weights: ObjectiveWeights,
    /// Gap beyond the buffer within which same-project tasks count as adjacent
    #[serde(default = "default_project_proximity")]
    pub project_proximity_minutes: u32,
    /// Upper bound for a single calendar fetch (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub calendar_fetch_timeout_secs: u64,
    /// Treat all-day calendar events as busy
    #[serde(default)]
    pub include_all_day_events: bool,
}

fn default_search_window_days() -> Vec<u32> {
    vec![7, 14, 30]
}
fn default_slot_granularity() -> u32 {
    15
}
fn default_project_proximity() -> u32 {
    30
}
fn default_fetch_timeout() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            search_window_days: default_search_window_days(),
            slot_granularity_minutes: default_slot_granularity(),
            probe_strategy: ProbeStrategy::default(),
            weights: ObjectiveWeights::default(),
            project_proximity_minutes: default_project_proximity(),
            calendar_fetch_timeout_secs: default_fetch_timeout(),
            include_all_day_events: false,
        }
    }
}

impl SchedulerConfig {
    /// Widest configured search window in days.
    pub fn max_window_days(&self) -> u32 {
        self.search_window_days.iter().copied().max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search_window_days.is_empty() {
            return Err(ConfigError::invalid(
                "search_window_days",
                "at least one search window is required",
            ));
        }
        if self.search_window_days.contains(&0) {
            return Err(ConfigError::invalid(
                "search_window_days",
                "search windows must be at least one day",
            ));
        }
        if !self.search_window_days.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::invalid(
                "search_window_days",
                "search windows must be strictly increasing",
            ));
        }
        if self.slot_granularity_minutes == 0 || self.slot_granularity_minutes > 24 * 60 {
            return Err(ConfigError::invalid(
                "slot_granularity_minutes",
                "granularity must be between 1 minute and one day",
            ));
        }
        if let ProbeStrategy::Concurrent { batch_size: 0 } = self.probe_strategy {
            return Err(ConfigError::invalid(
                "probe_strategy.batch_size",
                "batch size must be positive",
            ));
        }
        if self.calendar_fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "calendar_fetch_timeout_secs",
                "timeout must be positive",
            ));
        }
        self.weights.validate()
    }
}
