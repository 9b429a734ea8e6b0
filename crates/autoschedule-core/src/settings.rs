//! Per-user auto-schedule settings.
//!
//! Settings are read-only input to a scheduling run. Hours are interpreted in
//! the user's [`timezone`](AutoScheduleSettings::timezone); weekday indices run
//! from 0 (Sunday) to 6 (Saturday).

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::task::EnergyLevel;

/// Working-hour and preference settings for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoScheduleSettings {
    /// Weekday indices (0=Sunday .. 6=Saturday) on which tasks may be placed
    #[serde(default = "default_work_days")]
    pub work_days: BTreeSet<u8>,
    #[serde(default = "default_work_hour_start")]
    pub work_hour_start: u8,
    #[serde(default = "default_work_hour_end")]
    pub work_hour_end: u8,
    /// Calendar feeds whose events count as busy time
    #[serde(default)]
    pub selected_calendars: BTreeSet<String>,
    /// Minimum gap around every placed task
    #[serde(default)]
    pub buffer_minutes: u32,
    #[serde(default)]
    pub high_energy_start: Option<u8>,
    #[serde(default)]
    pub high_energy_end: Option<u8>,
    #[serde(default)]
    pub medium_energy_start: Option<u8>,
    #[serde(default)]
    pub medium_energy_end: Option<u8>,
    #[serde(default)]
    pub low_energy_start: Option<u8>,
    #[serde(default)]
    pub low_energy_end: Option<u8>,
    #[serde(default)]
    pub group_by_project: bool,
    /// IANA timezone name
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_work_days() -> BTreeSet<u8> {
    (1..=5).collect()
}
fn default_work_hour_start() -> u8 {
    9
}
fn default_work_hour_end() -> u8 {
    17
}
fn default_timezone() -> String {
    "UTC".into()
}

impl Default for AutoScheduleSettings {
    fn default() -> Self {
        Self {
            work_days: default_work_days(),
            work_hour_start: default_work_hour_start(),
            work_hour_end: default_work_hour_end(),
            selected_calendars: BTreeSet::new(),
            buffer_minutes: 0,
            high_energy_start: None,
            high_energy_end: None,
            medium_energy_start: None,
            medium_energy_end: None,
            low_energy_start: None,
            low_energy_end: None,
            group_by_project: false,
            timezone: default_timezone(),
        }
    }
}

impl AutoScheduleSettings {
    /// Configured hour range for an energy tier; both ends must be set.
    pub fn energy_range(&self, level: EnergyLevel) -> Option<(u8, u8)> {
        let (start, end) = match level {
            EnergyLevel::High => (self.high_energy_start, self.high_energy_end),
            EnergyLevel::Medium => (self.medium_energy_start, self.medium_energy_end),
            EnergyLevel::Low => (self.low_energy_start, self.low_energy_end),
        };
        Some((start?, end?))
    }

    /// Set the hour range for an energy tier.
    pub fn set_energy_range(&mut self, level: EnergyLevel, start: u8, end: u8) {
        let slots = match level {
            EnergyLevel::High => (&mut self.high_energy_start, &mut self.high_energy_end),
            EnergyLevel::Medium => (&mut self.medium_energy_start, &mut self.medium_energy_end),
            EnergyLevel::Low => (&mut self.low_energy_start, &mut self.low_energy_end),
        };
        *slots.0 = Some(start);
        *slots.1 = Some(end);
    }

    /// Parsed timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    /// Whether tasks may be placed on this date.
    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        self.work_days.contains(&weekday_index(date.weekday()))
    }

    /// Reject settings that would silently yield zero usable slots.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work_days.is_empty() {
            return Err(ConfigError::invalid("work_days", "at least one work day is required"));
        }
        if let Some(day) = self.work_days.iter().find(|d| **d > 6) {
            return Err(ConfigError::invalid(
                "work_days",
                format!("weekday index {day} is outside 0..=6"),
            ));
        }
        if self.work_hour_end > 24 {
            return Err(ConfigError::invalid(
                "work_hour_end",
                format!("hour {} is outside 0..=24", self.work_hour_end),
            ));
        }
        if self.work_hour_start >= self.work_hour_end {
            return Err(ConfigError::invalid(
                "work_hour_start",
                format!(
                    "work_hour_start ({}) must be before work_hour_end ({})",
                    self.work_hour_start, self.work_hour_end
                ),
            ));
        }
        if self.buffer_minutes >= 24 * 60 {
            return Err(ConfigError::invalid(
                "buffer_minutes",
                "buffer must be shorter than a day",
            ));
        }

        let tiers = [
            ("high_energy", self.high_energy_start, self.high_energy_end),
            ("medium_energy", self.medium_energy_start, self.medium_energy_end),
            ("low_energy", self.low_energy_start, self.low_energy_end),
        ];
        for (name, start, end) in tiers {
            if let (Some(start), Some(end)) = (start, end) {
                if end > 24 || start >= end {
                    return Err(ConfigError::invalid(
                        name,
                        format!("range {start}-{end} must satisfy start < end <= 24"),
                    ));
                }
            }
        }

        self.tz()?;
        Ok(())
    }
}

/// Weekday index with Sunday = 0.
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}
