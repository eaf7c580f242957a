//! Storage layer for Deckhand data.
//!
//! Persistence is a single SQLite database with one table partition per
//! task kind - the kinds share no storage schema beyond the column layout,
//! and are unified only at the interface level. Subtasks and milestones
//! get their own tables. Multi-step writes (subtask replace, milestone
//! promotion) run inside one transaction each.
//!
//! The database lives at `<data-dir>/tracker.db`, where the data directory
//! is `DH_DATA_DIR` when set and `~/.local/share/deckhand` otherwise. Tests
//! inject their own directory through the `*_with_data_dir` constructors.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{
    Milestone, MilestoneStatus, NewSubtask, NewTask, Subtask, TaskPatch, TaskPriority, TaskRecord,
    TaskStatus,
};
use crate::registry::{TaskKind, TaskKindRegistry};
use crate::{Error, Result};

/// Resolve the data directory: `DH_DATA_DIR` override, else the platform
/// local data dir.
fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DH_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("deckhand"))
        .ok_or_else(|| Error::Other("could not determine data directory".to_string()))
}

/// Storage manager for the organization's task database.
#[derive(Debug)]
pub struct Storage {
    /// Data directory holding tracker.db
    pub root: PathBuf,
    /// SQLite connection
    conn: Connection,
    /// Kind registry used to dispatch to table partitions
    registry: TaskKindRegistry,
}

impl Storage {
    /// Open existing storage, resolving the data directory from the
    /// environment.
    pub fn open() -> Result<Self> {
        let root = resolve_data_dir()?;
        Self::open_with_data_dir(&root)
    }

    /// Initialize storage, resolving the data directory from the
    /// environment.
    pub fn init() -> Result<Self> {
        let root = resolve_data_dir()?;
        Self::init_with_data_dir(&root)
    }

    /// Check whether storage exists at the environment-resolved location.
    pub fn exists() -> Result<bool> {
        let root = resolve_data_dir()?;
        Ok(root.join("tracker.db").exists())
    }

    /// Open existing storage rooted at an explicit data directory.
    pub fn open_with_data_dir(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("tracker.db");
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }

        let conn = Connection::open(&db_path)?;
        let registry = TaskKindRegistry::new();
        Self::init_schema(&conn, &registry)?;

        Ok(Self {
            root: data_dir.to_path_buf(),
            conn,
            registry,
        })
    }

    /// Initialize storage rooted at an explicit data directory.
    pub fn init_with_data_dir(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("tracker.db");
        let conn = Connection::open(&db_path)?;
        let registry = TaskKindRegistry::new();
        Self::init_schema(&conn, &registry)?;

        Ok(Self {
            root: data_dir.to_path_buf(),
            conn,
            registry,
        })
    }

    /// The kind registry backing this storage.
    pub fn registry(&self) -> &TaskKindRegistry {
        &self.registry
    }

    /// Initialize the SQLite schema: one partition per registered kind,
    /// plus subtask and milestone tables.
    fn init_schema(conn: &Connection, registry: &TaskKindRegistry) -> Result<()> {
        let mut sql = String::new();

        for kind in registry.kinds() {
            let table = registry.spec(kind).table;
            sql.push_str(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL DEFAULT 'to_do',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    assigned_to TEXT,
                    created_by TEXT NOT NULL DEFAULT '',
                    due_date TEXT,
                    estimated_hours REAL NOT NULL DEFAULT 0,
                    actual_hours REAL NOT NULL DEFAULT 0,
                    tags TEXT NOT NULL DEFAULT '',
                    has_subtasks INTEGER NOT NULL DEFAULT 0,
                    extension TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_{table}_status ON {table}(status);
                CREATE INDEX IF NOT EXISTS idx_{table}_priority ON {table}(priority);
                "#
            ));
        }

        sql.push_str(
            r#"
            CREATE TABLE IF NOT EXISTS subtasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                parent_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_subtasks_parent ON subtasks(kind, parent_id);

            CREATE TABLE IF NOT EXISTS milestones (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                due_date TEXT,
                status TEXT NOT NULL DEFAULT 'not_started',
                completion_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_milestones_status ON milestones(status);
            "#,
        );

        conn.execute_batch(&sql)?;
        Ok(())
    }

    fn table(&self, kind: TaskKind) -> &'static str {
        self.registry.spec(kind).table
    }

    // === Task Operations ===

    /// Create a new task in the kind's partition.
    pub fn create_task(&mut self, kind: TaskKind, fields: &NewTask) -> Result<TaskRecord> {
        let now = Utc::now();
        let extension = extension_to_sql(&fields.extension)?;

        self.conn.execute(
            &format!(
                "INSERT INTO {} (title, description, status, priority, assigned_to, created_by,
                 due_date, estimated_hours, actual_hours, tags, has_subtasks, extension,
                 created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                self.table(kind)
            ),
            params![
                fields.title,
                fields.description,
                fields.status.as_str(),
                fields.priority.as_str(),
                fields.assigned_to,
                fields.created_by,
                fields.due_date.map(|d| d.to_string()),
                fields.estimated_hours,
                0.0_f64,
                fields.tags,
                fields.has_subtasks,
                extension,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_task(kind, id)
    }

    /// Get a task by id within its kind.
    pub fn get_task(&self, kind: TaskKind, id: i64) -> Result<TaskRecord> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, title, description, status, priority, assigned_to, created_by,
             due_date, estimated_hours, actual_hours, tags, has_subtasks, extension,
             created_at, updated_at
             FROM {} WHERE id = ?1",
            self.table(kind)
        ))?;

        let mut rows = stmt.query_map(params![id], |row| row_to_task(kind, row))?;
        match rows.next() {
            Some(task) => Ok(task?),
            None => Err(Error::RecordNotFound(format!(
                "Task not found: {} #{}",
                kind, id
            ))),
        }
    }

    /// List all tasks in a kind's partition, in insertion order.
    pub fn list_tasks(&self, kind: TaskKind) -> Result<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, title, description, status, priority, assigned_to, created_by,
             due_date, estimated_hours, actual_hours, tags, has_subtasks, extension,
             created_at, updated_at
             FROM {} ORDER BY id",
            self.table(kind)
        ))?;

        let tasks = stmt
            .query_map([], |row| row_to_task(kind, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Apply a partial update to a task and return the new record.
    pub fn update_task(&mut self, kind: TaskKind, id: i64, patch: &TaskPatch) -> Result<TaskRecord> {
        let mut task = self.get_task(kind, id)?;

        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(assigned_to) = &patch.assigned_to {
            task.assigned_to = assigned_to.clone();
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(hours) = patch.estimated_hours {
            task.estimated_hours = hours;
        }
        if let Some(hours) = patch.actual_hours {
            task.actual_hours = hours;
        }
        if let Some(tags) = &patch.tags {
            task.tags = tags.clone();
        }
        if let Some(has_subtasks) = patch.has_subtasks {
            task.has_subtasks = has_subtasks;
        }
        if let Some(extension) = &patch.extension {
            task.extension = extension.clone();
        }
        task.updated_at = Utc::now();

        let extension = extension_to_sql(&task.extension)?;
        self.conn.execute(
            &format!(
                "UPDATE {} SET title = ?1, description = ?2, status = ?3, priority = ?4,
                 assigned_to = ?5, due_date = ?6, estimated_hours = ?7, actual_hours = ?8,
                 tags = ?9, has_subtasks = ?10, extension = ?11, updated_at = ?12
                 WHERE id = ?13",
                self.table(kind)
            ),
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.assigned_to,
                task.due_date.map(|d| d.to_string()),
                task.estimated_hours,
                task.actual_hours,
                task.tags,
                task.has_subtasks,
                extension,
                task.updated_at.to_rfc3339(),
                id,
            ],
        )?;

        Ok(task)
    }

    /// Delete a task and its subtasks.
    pub fn delete_task(&mut self, kind: TaskKind, id: i64) -> Result<()> {
        self.get_task(kind, id)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", self.registry.spec(kind).table),
            params![id],
        )?;
        tx.execute(
            "DELETE FROM subtasks WHERE kind = ?1 AND parent_id = ?2",
            params![kind.as_str(), id],
        )?;
        tx.commit()?;

        Ok(())
    }

    // === Subtask Operations ===

    /// List subtasks for a parent, ordered by creation time then id.
    pub fn list_subtasks(&self, kind: TaskKind, parent_id: i64) -> Result<Vec<Subtask>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, parent_id, title, is_completed, created_at
             FROM subtasks WHERE kind = ?1 AND parent_id = ?2
             ORDER BY created_at, id",
        )?;

        let subtasks = stmt
            .query_map(params![kind.as_str(), parent_id], |row| {
                row_to_subtask(&self.registry, row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subtasks)
    }

    /// Replace all subtasks of a parent with a new list.
    ///
    /// Delete-all plus insert runs in one transaction; items whose trimmed
    /// title is empty are silently dropped. Passing an empty list deletes
    /// everything and creates nothing - callers do exactly that when the
    /// parent's `has_subtasks` flag is cleared. Subtask identity is not
    /// preserved across edits.
    pub fn replace_subtasks(
        &mut self,
        kind: TaskKind,
        parent_id: i64,
        items: &[NewSubtask],
    ) -> Result<Vec<Subtask>> {
        let now = Utc::now();

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM subtasks WHERE kind = ?1 AND parent_id = ?2",
            params![kind.as_str(), parent_id],
        )?;
        for item in items {
            let title = item.title.trim();
            if title.is_empty() {
                continue;
            }
            tx.execute(
                "INSERT INTO subtasks (kind, parent_id, title, is_completed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    kind.as_str(),
                    parent_id,
                    title,
                    item.is_completed,
                    now.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;

        self.list_subtasks(kind, parent_id)
    }

    /// Flip a single subtask's completion flag in place.
    pub fn toggle_subtask(&mut self, subtask_id: i64, completed: bool) -> Result<Subtask> {
        let changed = self.conn.execute(
            "UPDATE subtasks SET is_completed = ?1 WHERE id = ?2",
            params![completed, subtask_id],
        )?;
        if changed == 0 {
            return Err(Error::RecordNotFound(format!(
                "Subtask not found: {}",
                subtask_id
            )));
        }
        self.get_subtask(subtask_id)
    }

    /// Get a subtask by its global id.
    pub fn get_subtask(&self, subtask_id: i64) -> Result<Subtask> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, parent_id, title, is_completed, created_at
             FROM subtasks WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map(params![subtask_id], |row| {
            row_to_subtask(&self.registry, row)
        })?;
        match rows.next() {
            Some(subtask) => Ok(subtask?),
            None => Err(Error::RecordNotFound(format!(
                "Subtask not found: {}",
                subtask_id
            ))),
        }
    }

    // === Milestone Operations ===

    /// Create a new milestone in the `not_started` state.
    pub fn create_milestone(&mut self, title: &str, due_date: Option<NaiveDate>) -> Result<Milestone> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO milestones (title, due_date, status, completion_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5)",
            params![
                title,
                due_date.map(|d| d.to_string()),
                MilestoneStatus::NotStarted.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        self.get_milestone(self.conn.last_insert_rowid())
    }

    /// Get a milestone by id.
    pub fn get_milestone(&self, id: i64) -> Result<Milestone> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, due_date, status, completion_date, created_at, updated_at
             FROM milestones WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map(params![id], row_to_milestone)?;
        match rows.next() {
            Some(milestone) => Ok(milestone?),
            None => Err(Error::RecordNotFound(format!("Milestone not found: {}", id))),
        }
    }

    /// Find a milestone by exact title.
    pub fn find_milestone_by_title(&self, title: &str) -> Result<Milestone> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, due_date, status, completion_date, created_at, updated_at
             FROM milestones WHERE title = ?1 ORDER BY id LIMIT 1",
        )?;

        let mut rows = stmt.query_map(params![title], row_to_milestone)?;
        match rows.next() {
            Some(milestone) => Ok(milestone?),
            None => Err(Error::RecordNotFound(format!(
                "Milestone not found: {}",
                title
            ))),
        }
    }

    /// List all milestones in creation order.
    pub fn list_milestones(&self) -> Result<Vec<Milestone>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, due_date, status, completion_date, created_at, updated_at
             FROM milestones ORDER BY id",
        )?;

        let milestones = stmt
            .query_map([], row_to_milestone)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(milestones)
    }

    /// All milestones currently `in_progress` (zero or one when the
    /// invariant holds).
    pub fn milestones_in_progress(&self) -> Result<Vec<Milestone>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, due_date, status, completion_date, created_at, updated_at
             FROM milestones WHERE status = 'in_progress' ORDER BY id",
        )?;

        let milestones = stmt
            .query_map([], row_to_milestone)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(milestones)
    }

    /// Promote a milestone to `in_progress`, demoting every other
    /// in-progress milestone to `completed` with a completion stamp.
    ///
    /// Demotion and promotion run in a single transaction so two
    /// concurrent promotions cannot leave the system with more than one
    /// active milestone.
    pub fn set_milestone_in_progress(&mut self, id: i64) -> Result<Milestone> {
        self.get_milestone(id)?;
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE milestones SET status = 'completed', completion_date = ?1, updated_at = ?1
             WHERE status = 'in_progress' AND id != ?2",
            params![now, id],
        )?;
        tx.execute(
            "UPDATE milestones SET status = 'in_progress', completion_date = NULL, updated_at = ?1
             WHERE id = ?2",
            params![now, id],
        )?;
        tx.commit()?;

        self.get_milestone(id)
    }

    /// Set a milestone directly to `not_started` or `completed`.
    ///
    /// Completion stamps `completion_date`; any other target clears it.
    /// Transitions to `in_progress` must go through
    /// [`Storage::set_milestone_in_progress`] to keep the single-active
    /// invariant.
    pub fn set_milestone_status(&mut self, id: i64, status: MilestoneStatus) -> Result<Milestone> {
        self.get_milestone(id)?;
        let now = Utc::now().to_rfc3339();

        let completion: Option<String> = match status {
            MilestoneStatus::Completed => Some(now.clone()),
            _ => None,
        };

        self.conn.execute(
            "UPDATE milestones SET status = ?1, completion_date = ?2, updated_at = ?3
             WHERE id = ?4",
            params![status.as_str(), completion, now, id],
        )?;

        self.get_milestone(id)
    }
}

// === Row Mapping ===

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_due_date(idx: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    match value {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

fn row_to_task(kind: TaskKind, row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let status: String = row.get(3)?;
    let priority: String = row.get(4)?;
    let due_date: Option<String> = row.get(7)?;
    let extension: Option<String> = row.get(12)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(TaskRecord {
        id: row.get(0)?,
        kind,
        title: row.get(1)?,
        description: row.get(2)?,
        // Unknown stored values fall back to defaults rather than failing
        // the whole fetch; validation happens on the write path.
        status: TaskStatus::from_str(&status).unwrap_or_default(),
        priority: TaskPriority::from_str(&priority).unwrap_or_default(),
        assigned_to: row.get(5)?,
        created_by: row.get(6)?,
        due_date: parse_due_date(7, due_date)?,
        estimated_hours: row.get(8)?,
        actual_hours: row.get(9)?,
        tags: row.get(10)?,
        has_subtasks: row.get(11)?,
        extension: match extension {
            Some(json) => serde_json::from_str(&json).unwrap_or(serde_json::Value::Null),
            None => serde_json::Value::Null,
        },
        created_at: parse_timestamp(13, &created_at)?,
        updated_at: parse_timestamp(14, &updated_at)?,
    })
}

fn row_to_subtask(registry: &TaskKindRegistry, row: &Row<'_>) -> rusqlite::Result<Subtask> {
    let kind: String = row.get(1)?;
    let created_at: String = row.get(5)?;

    Ok(Subtask {
        id: row.get(0)?,
        // Subtask rows are only written through resolved kinds; an
        // unreadable kind tag means a corrupt row.
        kind: registry.resolve(&kind).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        parent_id: row.get(2)?,
        title: row.get(3)?,
        is_completed: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

fn row_to_milestone(row: &Row<'_>) -> rusqlite::Result<Milestone> {
    let due_date: Option<String> = row.get(2)?;
    let status: String = row.get(3)?;
    let completion_date: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(Milestone {
        id: row.get(0)?,
        title: row.get(1)?,
        due_date: parse_due_date(2, due_date)?,
        status: MilestoneStatus::from_str(&status).unwrap_or_default(),
        completion_date: match completion_date {
            Some(s) => Some(parse_timestamp(4, &s)?),
            None => None,
        },
        created_at: parse_timestamp(5, &created_at)?,
        updated_at: parse_timestamp(6, &updated_at)?,
    })
}

fn extension_to_sql(extension: &serde_json::Value) -> Result<Option<String>> {
    if extension.is_null() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(extension)?))
    }
}
