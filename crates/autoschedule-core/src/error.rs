//! Core error types for autoschedule-core.
//!
//! Errors fall into two groups. Run-level errors (configuration, calendar
//! availability) abort a scheduling run before any task is mutated. Per-task
//! errors (validation, persistence) are caught by the batch scheduler and only
//! mark the affected task as unscheduled.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for autoschedule-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors (invalid settings included)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Calendar availability could not be determined
    #[error("Availability error: {0}")]
    Availability(#[from] AvailabilityError),

    /// Task persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl CoreError {
    /// Whether this error must abort a whole scheduling run.
    pub fn is_run_level(&self) -> bool {
        matches!(self, CoreError::Config(_) | CoreError::Availability(_))
    }
}

/// Calendar availability errors. Always fatal to the run that hit them.
#[derive(Error, Debug)]
pub enum AvailabilityError {
    /// A calendar feed did not answer in time
    #[error("Calendar '{calendar_id}' did not respond within {timeout_secs} seconds")]
    Timeout { calendar_id: String, timeout_secs: u64 },

    /// A calendar feed returned an error
    #[error("Failed to fetch calendar '{calendar_id}': {message}")]
    FetchFailed { calendar_id: String, message: String },

    /// Availability was requested for a user other than the one it was loaded for
    #[error("Availability loaded for user '{expected}' but requested for '{requested}'")]
    UserMismatch { expected: String, requested: String },

    /// A query reached outside a prefetched availability window
    #[error("Requested range {start} - {end} lies outside the prefetched availability window")]
    OutsideSnapshot {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },
}

/// Task persistence errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to open the task database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// No task with this id exists for the user
    #[error("Task '{task_id}' not found for user '{user_id}'")]
    NotFound { task_id: String, user_id: String },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Timezone name not found in the tz database
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end_time ({end}) must be greater than start_time ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    PersistenceError::Locked
                } else {
                    PersistenceError::QueryFailed(err.to_string())
                }
            }
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Persistence(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
