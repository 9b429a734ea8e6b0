use std::path::PathBuf;

use autoschedule_core::{ConflictAccumulator, SlotFinder};
use chrono::Duration;
use clap::Args;

use crate::common::{load_config, load_provider, load_tasks, parse_now, CliResult};

#[derive(Args)]
pub struct SlotsArgs {
    /// JSON file with the user's tasks; locked ones count as busy
    #[arg(long)]
    tasks: PathBuf,
    /// Id of the task to find slots for
    #[arg(long)]
    task: String,
    /// JSON file with the user's calendar events
    #[arg(long)]
    events: Option<PathBuf>,
    /// Config file (defaults to ~/.config/autoschedule/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "default")]
    user: String,
    /// Search start as RFC3339 (defaults to now)
    #[arg(long)]
    now: Option<String>,
    /// Days to search (defaults to the first configured window)
    #[arg(long)]
    days: Option<u32>,
    /// Maximum number of slots to print
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

pub async fn run(args: SlotsArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let tasks = load_tasks(&args.tasks)?;
    let task = tasks
        .iter()
        .find(|t| t.id == args.task)
        .ok_or_else(|| format!("task '{}' not found in {}", args.task, args.tasks.display()))?;
    let provider = load_provider(&config, args.events.as_deref(), &args.user)?;
    let now = parse_now(args.now.as_deref())?;

    let days = args
        .days
        .or_else(|| config.scheduler.search_window_days.first().copied())
        .unwrap_or(7);

    let mut conflicts = ConflictAccumulator::new();
    conflicts.seed_locked(tasks.iter().filter(|t| t.user_id == args.user));

    let finder = SlotFinder::new(&provider, &config.settings, &config.scheduler)?.with_now(now);
    let slots = finder
        .find_available_slots(task, now, now + Duration::days(i64::from(days)), &args.user, &conflicts)
        .await?;

    let shown: Vec<_> = slots.into_iter().take(args.limit).collect();
    println!("{}", serde_json::to_string_pretty(&shown)?);
    eprintln!("{} slot(s) shown for '{}' over {days} day(s)", shown.len(), task.id);
    Ok(())
}
