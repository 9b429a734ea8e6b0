//! SQLite-based storage for schedulable tasks.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::task_store::TaskStore;
use crate::error::{PersistenceError, Result};
use crate::task::{EnergyLevel, PreferredTime, Priority, SchedulableTask};

const TASK_COLUMNS: &str = "id, user_id, title, duration_minutes, priority, energy_level,
    preferred_time, due_date, project_id, schedule_locked, scheduled_start,
    scheduled_end, is_auto_scheduled, schedule_score";

/// Parse an optional RFC3339 column.
fn parse_datetime(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

/// Parse an optional enum column stored as its uppercase name.
fn parse_enum<T>(
    idx: usize,
    value: Option<String>,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    value
        .map(|s| {
            parse(&s).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    Type::Text,
                    format!("unknown value '{s}'").into(),
                )
            })
        })
        .transpose()
}

/// Build a SchedulableTask from a row selected with `TASK_COLUMNS`.
fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<SchedulableTask> {
    Ok(SchedulableTask {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        duration_minutes: row.get(3)?,
        priority: parse_enum(4, row.get(4)?, Priority::parse)?,
        energy_level: parse_enum(5, row.get(5)?, EnergyLevel::parse)?,
        preferred_time: parse_enum(6, row.get(6)?, PreferredTime::parse)?,
        due_date: parse_datetime(7, row.get(7)?)?,
        project_id: row.get(8)?,
        schedule_locked: row.get(9)?,
        scheduled_start: parse_datetime(10, row.get(10)?)?,
        scheduled_end: parse_datetime(11, row.get(11)?)?,
        is_auto_scheduled: row.get(12)?,
        schedule_score: row.get(13)?,
    })
}

/// SQLite database holding the tasks the scheduler reads and commits.
pub struct ScheduleDb {
    conn: Mutex<Connection>,
}

impl ScheduleDb {
    /// Open the database at `~/.config/autoschedule/autoschedule.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or the database cannot be opened.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("autoschedule.db");
        Ok(Self::open_path(path)?)
    }

    /// Open (or create) the database file at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate(&self) -> Result<(), PersistenceError> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id                 TEXT PRIMARY KEY,
                user_id            TEXT NOT NULL,
                title              TEXT NOT NULL DEFAULT '',
                duration_minutes   INTEGER,
                priority           TEXT,
                energy_level       TEXT,
                preferred_time     TEXT,
                due_date           TEXT,
                project_id         TEXT,
                schedule_locked    INTEGER NOT NULL DEFAULT 0,
                scheduled_start    TEXT,
                scheduled_end      TEXT,
                is_auto_scheduled  INTEGER NOT NULL DEFAULT 0,
                schedule_score     REAL,
                updated_at         TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);",
        )?;
        Ok(())
    }

    /// Insert a new task.
    pub fn insert_task(&self, task: &SchedulableTask) -> Result<(), PersistenceError> {
        self.conn().execute(
            "INSERT INTO tasks (
                id, user_id, title, duration_minutes, priority, energy_level,
                preferred_time, due_date, project_id, schedule_locked, scheduled_start,
                scheduled_end, is_auto_scheduled, schedule_score, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                task.id,
                task.user_id,
                task.title,
                task.duration_minutes,
                task.priority.map(|p| p.as_str()),
                task.energy_level.map(|e| e.as_str()),
                task.preferred_time.map(|p| p.as_str()),
                task.due_date.map(|dt| dt.to_rfc3339()),
                task.project_id,
                task.schedule_locked,
                task.scheduled_start.map(|dt| dt.to_rfc3339()),
                task.scheduled_end.map(|dt| dt.to_rfc3339()),
                task.is_auto_scheduled,
                task.schedule_score,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a task by ID.
    pub fn get_task(&self, id: &str) -> Result<Option<SchedulableTask>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], row_to_task).optional()?)
    }

    /// All tasks of a user, ordered by id.
    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<SchedulableTask>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl TaskStore for ScheduleDb {
    /// Rewrite the scheduling fields of one task in a single statement.
    fn update_task(&self, task: &SchedulableTask) -> Result<(), PersistenceError> {
        let changed = self.conn().execute(
            "UPDATE tasks
             SET title = ?1, duration_minutes = ?2, priority = ?3, energy_level = ?4,
                 preferred_time = ?5, due_date = ?6, project_id = ?7, schedule_locked = ?8,
                 scheduled_start = ?9, scheduled_end = ?10, is_auto_scheduled = ?11,
                 schedule_score = ?12, updated_at = ?13
             WHERE id = ?14 AND user_id = ?15",
            params![
                task.title,
                task.duration_minutes,
                task.priority.map(|p| p.as_str()),
                task.energy_level.map(|e| e.as_str()),
                task.preferred_time.map(|p| p.as_str()),
                task.due_date.map(|dt| dt.to_rfc3339()),
                task.project_id,
                task.schedule_locked,
                task.scheduled_start.map(|dt| dt.to_rfc3339()),
                task.scheduled_end.map(|dt| dt.to_rfc3339()),
                task.is_auto_scheduled,
                task.schedule_score,
                Utc::now().to_rfc3339(),
                task.id,
                task.user_id,
            ],
        )?;

        if changed == 0 {
            return Err(PersistenceError::NotFound {
                task_id: task.id.clone(),
                user_id: task.user_id.clone(),
            });
        }
        Ok(())
    }

    fn fetch_tasks(&self, user_id: &str, ids: &[String]) -> Result<Vec<SchedulableTask>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"
        ))?;

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = stmt.query_row(params![id, user_id], row_to_task).optional()? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }
}
