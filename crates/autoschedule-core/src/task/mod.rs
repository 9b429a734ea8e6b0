//! Task types consumed and updated by the auto-scheduler.
//!
//! A [`SchedulableTask`] is loaded in bulk at the start of a run, read by the
//! slot finder, and updated exactly once when its slot is committed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Duration used when a task does not carry an estimate.
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Task priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
    /// Explicitly no priority (distinct from an absent value only in storage)
    None,
}

/// Mental-energy tier a task requires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnergyLevel {
    /// Low energy (e.g., end of day)
    Low,
    /// Medium energy
    Medium,
    /// High energy (e.g., morning)
    High,
}

/// Preferred time of day for a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PreferredTime {
    Morning,
    Afternoon,
    Evening,
    Anytime,
}

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Storage representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }

            /// Parse the storage representation (case-insensitive).
            pub fn parse(value: &str) -> Option<Self> {
                match value.to_ascii_uppercase().as_str() {
                    $($text => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Priority { High => "HIGH", Medium => "MEDIUM", Low => "LOW", None => "NONE" });
str_enum!(EnergyLevel { High => "HIGH", Medium => "MEDIUM", Low => "LOW" });
str_enum!(PreferredTime {
    Morning => "MORNING",
    Afternoon => "AFTERNOON",
    Evening => "EVENING",
    Anytime => "ANYTIME",
});

/// A task eligible for automatic placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulableTask {
    /// Unique identifier
    pub id: String,
    /// Owning user; store lookups are always scoped to it
    pub user_id: String,
    /// Task title
    #[serde(default)]
    pub title: String,
    /// Required duration; [`DEFAULT_DURATION_MINUTES`] when absent
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default)]
    pub preferred_time: Option<PreferredTime>,
    /// Deadline; tasks without one are least urgent
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Locked tasks keep their slot and are never moved by a run
    #[serde(default)]
    pub schedule_locked: bool,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_auto_scheduled: bool,
    /// Score of the committed slot; only meaningful within the run that set it
    #[serde(default)]
    pub schedule_score: Option<f64>,
}

impl SchedulableTask {
    /// Create a new unscheduled task with default values.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: format!("task-{}", uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            title: title.into(),
            duration_minutes: None,
            priority: None,
            energy_level: None,
            preferred_time: None,
            due_date: None,
            project_id: None,
            schedule_locked: false,
            scheduled_start: None,
            scheduled_end: None,
            is_auto_scheduled: false,
            schedule_score: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_energy(mut self, energy: EnergyLevel) -> Self {
        self.energy_level = Some(energy);
        self
    }

    pub fn with_preferred_time(mut self, preferred: PreferredTime) -> Self {
        self.preferred_time = Some(preferred);
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Lock the task into an existing slot.
    pub fn locked_at(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.schedule_locked = true;
        self.scheduled_start = Some(start);
        self.scheduled_end = Some(end);
        self
    }

    /// Effective duration in minutes.
    pub fn effective_duration_minutes(&self) -> u32 {
        self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    /// Effective duration as a chrono duration.
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.effective_duration_minutes()))
    }

    /// The currently stored slot, if both ends are set.
    pub fn scheduled_interval(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.scheduled_start, self.scheduled_end) {
            (Some(start), Some(end)) if end > start => Some((start, end)),
            _ => None,
        }
    }

    /// Reject task data that could never produce a slot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: "task id must not be empty".into(),
            });
        }
        if self.duration_minutes == Some(0) {
            return Err(ValidationError::InvalidValue {
                field: "duration_minutes".into(),
                message: format!("task '{}' has a zero duration", self.id),
            });
        }
        if let (Some(start), Some(end)) = (self.scheduled_start, self.scheduled_end) {
            if end <= start {
                return Err(ValidationError::InvalidTimeRange { start, end });
            }
        }
        Ok(())
    }

    /// Apply a committed slot.
    pub fn commit_slot(&mut self, start: DateTime<Utc>, end: DateTime<Utc>, score: f64) {
        self.scheduled_start = Some(start);
        self.scheduled_end = Some(end);
        self.is_auto_scheduled = true;
        self.schedule_score = Some(score);
    }
}
