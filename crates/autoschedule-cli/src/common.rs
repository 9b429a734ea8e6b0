//! Input loading shared by the scheduling commands.

use std::path::Path;

use autoschedule_core::{
    CalendarEvent, Config, InMemoryCalendarSource, SchedulableTask, SelectedCalendarsProvider,
};
use chrono::{DateTime, Utc};

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load and validate the configuration, from `path` or the default location.
pub fn load_config(path: Option<&Path>) -> CliResult<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(),
    };
    config.validate()?;
    Ok(config)
}

/// Read a JSON array of tasks.
pub fn load_tasks(path: &Path) -> CliResult<Vec<SchedulableTask>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read tasks file {}: {e}", path.display()))?;
    let tasks: Vec<SchedulableTask> = serde_json::from_str(&content)?;
    tracing::debug!(count = tasks.len(), path = %path.display(), "loaded tasks");
    Ok(tasks)
}

/// Build the availability provider for `user_id` from a JSON array of
/// calendar events. Without a file every selected calendar is empty.
pub fn load_provider(
    config: &Config,
    events: Option<&Path>,
    user_id: &str,
) -> CliResult<SelectedCalendarsProvider<InMemoryCalendarSource>> {
    let events: Vec<CalendarEvent> = match events {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read events file {}: {e}", path.display()))?;
            serde_json::from_str(&content)?
        }
        None => Vec::new(),
    };
    tracing::debug!(count = events.len(), "loaded calendar events");

    let source = InMemoryCalendarSource::new().with_events(user_id, events);
    Ok(
        SelectedCalendarsProvider::new(source, config.settings.selected_calendars.clone())
            .with_timeout(std::time::Duration::from_secs(
                config.scheduler.calendar_fetch_timeout_secs,
            ))
            .include_all_day_events(config.scheduler.include_all_day_events),
    )
}

/// Parse `--now` (RFC3339) or fall back to the current time.
pub fn parse_now(now: Option<&str>) -> CliResult<DateTime<Utc>> {
    match now {
        Some(value) => Ok(DateTime::parse_from_rfc3339(value)
            .map_err(|e| format!("invalid --now '{value}': {e}"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}
