mod config;
pub mod schedule_db;
pub mod task_store;

pub use config::Config;
pub use schedule_db::ScheduleDb;
pub use task_store::{InMemoryTaskStore, TaskStore};

use std::path::PathBuf;

/// Returns `~/.config/autoschedule[-dev]/` based on AUTOSCHEDULE_ENV.
///
/// Set AUTOSCHEDULE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("AUTOSCHEDULE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("autoschedule-dev")
    } else {
        base_dir.join("autoschedule")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
