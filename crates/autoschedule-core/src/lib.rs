//! # Autoschedule Core Library
//!
//! This library places a user's unscheduled tasks into free time on their
//! calendar. The `autoschedule` CLI is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Calendar**: busy intervals from the user's selected calendar feeds,
//!   merged into one sorted, non-overlapping list
//! - **Scheduler**: slot enumeration and ranking for one task, plus a two-phase
//!   batch run that commits tasks one by one against a run-scoped conflict set
//! - **Scoring**: weighted objective terms (energy fit, time of day, deadline,
//!   project proximity, priority)
//! - **Storage**: SQLite task storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`CalendarAvailabilityProvider`]: busy-time source contract
//! - [`SlotFinder`]: ranked candidate slots for a task
//! - [`BatchScheduler`]: schedules a list of tasks in one run
//! - [`Config`]: settings and scheduler configuration

pub mod calendar;
pub mod error;
pub mod scheduler;
pub mod scoring;
pub mod settings;
pub mod storage;
pub mod task;

pub use calendar::{
    AvailabilitySnapshot, BusyInterval, CalendarAvailabilityProvider, CalendarEvent,
    CalendarSource, EventStatus, InMemoryCalendarSource, SelectedCalendarsProvider,
};
pub use error::{
    AvailabilityError, ConfigError, CoreError, PersistenceError, Result, ValidationError,
};
pub use scheduler::{
    BatchScheduler, ConflictAccumulator, ProbeStrategy, RunReport, SchedulerConfig, SlotFinder,
    TimeSlot, UnscheduledReason, UnscheduledTask, WindowMatch,
};
pub use scoring::{ObjectiveWeights, ScoreBreakdown, SlotScoringEngine};
pub use settings::AutoScheduleSettings;
pub use storage::{Config, InMemoryTaskStore, ScheduleDb, TaskStore};
pub use task::{EnergyLevel, PreferredTime, Priority, SchedulableTask};
