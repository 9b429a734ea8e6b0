//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with temporary input files and verify
//! outputs.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_autoschedule"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

const CONFIG: &str = r#"
[settings]
work_days = [1, 2, 3, 4, 5]
work_hour_start = 9
work_hour_end = 17
selected_calendars = ["work"]
buffer_minutes = 15
high_energy_start = 9
high_energy_end = 11

[scheduler]
search_window_days = [7, 14]
"#;

const TASKS: &str = r#"[
  {"id": "deep", "user_id": "u1", "title": "Deep work", "duration_minutes": 60, "energy_level": "HIGH"},
  {"id": "calls", "user_id": "u1", "title": "Calls", "duration_minutes": 30, "preferred_time": "AFTERNOON"},
  {"id": "demo", "user_id": "u1", "title": "Demo", "schedule_locked": true,
   "scheduled_start": "2026-03-02T13:00:00Z", "scheduled_end": "2026-03-02T14:00:00Z"}
]"#;

const EVENTS: &str = r#"[
  {"id": "standup", "calendar_id": "work", "start": "2026-03-02T09:00:00Z", "end": "2026-03-02T09:30:00Z"},
  {"id": "private", "calendar_id": "personal", "start": "2026-03-02T10:00:00Z", "end": "2026-03-02T17:00:00Z"}
]"#;

struct Inputs {
    _dir: tempfile::TempDir,
    config: PathBuf,
    tasks: PathBuf,
    events: PathBuf,
}

fn inputs() -> Inputs {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "config.toml", CONFIG);
    let tasks = write(dir.path(), "tasks.json", TASKS);
    let events = write(dir.path(), "events.json", EVENTS);
    Inputs {
        _dir: dir,
        config,
        tasks,
        events,
    }
}

#[test]
fn test_run_prints_report_and_summary() {
    let inputs = inputs();
    let (stdout, stderr, code) = run_cli(&[
        "run",
        "--tasks",
        inputs.tasks.to_str().unwrap(),
        "--events",
        inputs.events.to_str().unwrap(),
        "--config",
        inputs.config.to_str().unwrap(),
        "--user",
        "u1",
        "--now",
        "2026-03-02T08:00:00Z",
    ]);
    assert_eq!(code, 0, "run failed: {stderr}");
    assert!(stderr.contains("2 scheduled, 0 pending"));

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["skipped_locked"], serde_json::json!(["demo"]));
    let tasks = report["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 3);
    // The standup plus 15 minutes of buffer pushes deep work to 09:45.
    assert_eq!(tasks[0]["scheduled_start"], "2026-03-02T09:45:00Z");
    assert_eq!(tasks[2]["scheduled_start"], "2026-03-02T13:00:00Z");
}

#[test]
fn test_run_persists_into_db() {
    let inputs = inputs();
    let db = inputs.config.with_file_name("tasks.db");
    let args = [
        "run",
        "--tasks",
        inputs.tasks.to_str().unwrap(),
        "--config",
        inputs.config.to_str().unwrap(),
        "--user",
        "u1",
        "--now",
        "2026-03-02T08:00:00Z",
        "--db",
        db.to_str().unwrap(),
    ];
    let (_, stderr, code) = run_cli(&args);
    assert_eq!(code, 0, "run failed: {stderr}");
    assert!(db.exists());

    // A second run over the same database still succeeds.
    let (_, stderr, code) = run_cli(&args);
    assert_eq!(code, 0, "second run failed: {stderr}");
}

#[test]
fn test_slots_lists_ranked_candidates() {
    let inputs = inputs();
    let (stdout, stderr, code) = run_cli(&[
        "slots",
        "--tasks",
        inputs.tasks.to_str().unwrap(),
        "--task",
        "calls",
        "--events",
        inputs.events.to_str().unwrap(),
        "--config",
        inputs.config.to_str().unwrap(),
        "--user",
        "u1",
        "--now",
        "2026-03-02T08:00:00Z",
        "--days",
        "1",
        "--limit",
        "3",
    ]);
    assert_eq!(code, 0, "slots failed: {stderr}");

    let slots: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(slots.len(), 3);
    // Afternoon preference wins; nothing lands inside the locked demo's buffer.
    assert_eq!(slots[0]["start"], "2026-03-02T12:00:00Z");
    assert!(slots.iter().all(|s| s["start"] != "2026-03-02T13:00:00Z"));
}

#[test]
fn test_slots_unknown_task_fails() {
    let inputs = inputs();
    let (_, stderr, code) = run_cli(&[
        "slots",
        "--tasks",
        inputs.tasks.to_str().unwrap(),
        "--task",
        "missing",
        "--config",
        inputs.config.to_str().unwrap(),
    ]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(
        dir.path(),
        "config.toml",
        "[settings]\nwork_hour_start = 18\nwork_hour_end = 9\n",
    );
    let tasks = write(dir.path(), "tasks.json", TASKS);

    let (_, stderr, code) = run_cli(&["config", "validate", "--file", config.to_str().unwrap()]);
    assert_ne!(code, 0);
    assert!(stderr.contains("work_hour_start"));

    let (_, _, code) = run_cli(&[
        "run",
        "--tasks",
        tasks.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--user",
        "u1",
    ]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_init_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    let file = file.to_str().unwrap();

    let (_, _, code) = run_cli(&["config", "init", "--file", file]);
    assert_eq!(code, 0);
    let (_, _, code) = run_cli(&["config", "init", "--file", file]);
    assert_ne!(code, 0, "init must not overwrite without --force");

    let (stdout, _, code) = run_cli(&["config", "get", "settings.work_hour_end", "--file", file]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "17");

    let (_, _, code) = run_cli(&["config", "set", "settings.buffer_minutes", "20", "--file", file]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(&["config", "show", "--file", file]);
    assert!(stdout.contains("buffer_minutes = 20"));

    let (_, _, code) = run_cli(&["config", "set", "settings.work_hour_start", "23", "--file", file]);
    assert_ne!(code, 0);
}
