use std::path::PathBuf;

use autoschedule_core::{BatchScheduler, InMemoryTaskStore, ScheduleDb};
use clap::Args;

use crate::common::{load_config, load_provider, load_tasks, parse_now, CliResult};

#[derive(Args)]
pub struct RunArgs {
    /// JSON file with the tasks to schedule
    #[arg(long)]
    tasks: PathBuf,
    /// JSON file with the user's calendar events
    #[arg(long)]
    events: Option<PathBuf>,
    /// Config file (defaults to ~/.config/autoschedule/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// User the run is for
    #[arg(long, default_value = "default")]
    user: String,
    /// Run clock as RFC3339 (defaults to now)
    #[arg(long)]
    now: Option<String>,
    /// Persist tasks and results in this SQLite database
    #[arg(long)]
    db: Option<PathBuf>,
}

pub async fn run(args: RunArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let tasks = load_tasks(&args.tasks)?;
    let provider = load_provider(&config, args.events.as_deref(), &args.user)?;
    let now = parse_now(args.now.as_deref())?;

    let report = match &args.db {
        Some(path) => {
            let db = ScheduleDb::open_path(path)?;
            for task in &tasks {
                if db.get_task(&task.id)?.is_none() {
                    db.insert_task(task)?;
                }
            }
            BatchScheduler::new(&provider, &db, &config.settings, &config.scheduler)
                .with_now(now)
                .schedule_multiple_tasks(&tasks, &args.user)
                .await?
        }
        None => {
            let store = InMemoryTaskStore::new();
            for task in &tasks {
                store.insert(task.clone());
            }
            BatchScheduler::new(&provider, &store, &config.settings, &config.scheduler)
                .with_now(now)
                .schedule_multiple_tasks(&tasks, &args.user)
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("{}", report.summary());
    Ok(())
}
