//! SQLite-backed storage
//!
//! The connection is wrapped in a Mutex so the storage is `Send + Sync` and
//! can be shared across the blocking thread pool. Every multi-row change runs
//! in an immediate transaction, so a failed batch leaves no partial writes.
//!
//! # Schema
//!
//! - `boards`: one row per project (`project_id` is unique)
//! - `columns`: ordered columns of a board (`(board_id, position)` is unique)
//! - `tasks`: task rows keyed by id, ranked by `position` within `column_id`
//!
//! Task positions carry no unique constraint; renumbering rewrites rows one
//! at a time inside a transaction. Several connections, in this process or
//! others, may share one file: each batch re-checks its column guards after
//! taking the write lock.

use super::{BoardStorage, ColumnGuard, TaskWrite};
use crate::error::{BoardError, Result};
use crate::types::{Board, BoardId, Column, ColumnId, ProjectId, Task, TaskId};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

const TASK_COLUMNS: &str =
    "id, column_id, title, description, position, created_by, created_at, updated_at";

/// SQLite storage for boards, columns and tasks
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file
    ///
    /// Enables WAL mode so other processes can read while one writes.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        debug!(path = %path.as_ref().display(), "opened board database");
        Self::from_connection(conn, busy_timeout)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, Duration::from_secs(5))
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.create_schema()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BoardError::storage("board database mutex poisoned"))
    }

    /// Create the database schema if it doesn't exist
    fn create_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS boards (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS columns (
                id TEXT PRIMARY KEY,
                board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                position INTEGER NOT NULL,
                UNIQUE (board_id, position)
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                column_id TEXT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT,
                position INTEGER NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks(column_id, position);
            "#,
        )?;
        Ok(())
    }
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn position(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let raw: i64 = row.get(idx)?;
    usize::try_from(raw).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, raw))
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: BoardId::from_string(row.get::<_, String>(0)?),
        project_id: ProjectId::from_string(row.get::<_, String>(1)?),
        created_at: timestamp(row, 2)?,
        updated_at: timestamp(row, 3)?,
    })
}

fn column_from_row(row: &Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        id: ColumnId::from_string(row.get::<_, String>(0)?),
        board_id: BoardId::from_string(row.get::<_, String>(1)?),
        name: row.get(2)?,
        position: position(row, 3)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: TaskId::from_string(row.get::<_, String>(0)?),
        column_id: ColumnId::from_string(row.get::<_, String>(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        position: position(row, 4)?,
        created_by: row.get::<_, String>(5)?.into(),
        created_at: timestamp(row, 6)?,
        updated_at: timestamp(row, 7)?,
    })
}

/// Fail with a conflict unless the column still matches what the batch was
/// computed from. Runs under the write lock taken by the open transaction.
fn check_guard(tx: &Transaction<'_>, guard: &ColumnGuard) -> Result<()> {
    let holds = match guard {
        ColumnGuard::Len { column_id, len } => {
            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM tasks WHERE column_id = ?",
                [column_id.as_str()],
                |row| row.get(0),
            )?;
            count == *len as i64
        }
        ColumnGuard::Order { column_id, tasks } => {
            let mut stmt = tx.prepare_cached(
                "SELECT id, position FROM tasks WHERE column_id = ? ORDER BY position",
            )?;
            let stored = stmt
                .query_map([column_id.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            stored.len() == tasks.len()
                && stored
                    .iter()
                    .zip(tasks)
                    .enumerate()
                    .all(|(index, ((id, position), expected))| {
                        id == expected.as_str() && *position == index as i64
                    })
        }
    };
    if holds {
        Ok(())
    } else {
        Err(guard.violated())
    }
}

/// Apply one write inside an open transaction
fn write_task(tx: &Transaction<'_>, write: &TaskWrite) -> Result<()> {
    let changed = match write {
        TaskWrite::Insert(task) => tx.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                task.id.as_str(),
                task.column_id.as_str(),
                task.title,
                task.description,
                task.position as i64,
                task.created_by.as_str(),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?,
        TaskWrite::Update {
            id,
            title,
            description,
            updated_at,
        } => tx.execute(
            "UPDATE tasks SET title = ?, description = ?, updated_at = ? WHERE id = ?",
            params![title, description, updated_at.to_rfc3339(), id.as_str()],
        )?,
        TaskWrite::Place {
            id,
            column_id,
            position,
            updated_at,
        } => tx.execute(
            "UPDATE tasks SET column_id = ?, position = ?, updated_at = ? WHERE id = ?",
            params![
                column_id.as_str(),
                *position as i64,
                updated_at.to_rfc3339(),
                id.as_str()
            ],
        )?,
        TaskWrite::Delete(id) => tx.execute("DELETE FROM tasks WHERE id = ?", [id.as_str()])?,
    };

    if changed == 1 {
        Ok(())
    } else {
        Err(BoardError::TaskNotFound {
            id: write.task_id().to_string(),
        })
    }
}

impl BoardStorage for SqliteStorage {
    fn find_board_by_project(&self, project_id: &ProjectId) -> Result<Option<Board>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, project_id, created_at, updated_at FROM boards WHERE project_id = ?",
        )?;
        Ok(stmt
            .query_row([project_id.as_str()], board_from_row)
            .optional()?)
    }

    fn get_board(&self, id: &BoardId) -> Result<Option<Board>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, project_id, created_at, updated_at FROM boards WHERE id = ?",
        )?;
        Ok(stmt.query_row([id.as_str()], board_from_row).optional()?)
    }

    fn create_board(&self, board: &Board, columns: &[Column]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO boards (id, project_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
            params![
                board.id.as_str(),
                board.project_id.as_str(),
                board.created_at.to_rfc3339(),
                board.updated_at.to_rfc3339(),
            ],
        )?;
        for column in columns {
            tx.execute(
                "INSERT INTO columns (id, board_id, name, position) VALUES (?, ?, ?, ?)",
                params![
                    column.id.as_str(),
                    column.board_id.as_str(),
                    column.name,
                    column.position as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_columns(&self, board_id: &BoardId) -> Result<Vec<Column>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, board_id, name, position FROM columns WHERE board_id = ? ORDER BY position",
        )?;
        let rows = stmt.query_map([board_id.as_str()], column_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_column(&self, id: &ColumnId) -> Result<Option<Column>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT id, board_id, name, position FROM columns WHERE id = ?")?;
        Ok(stmt.query_row([id.as_str()], column_from_row).optional()?)
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))?;
        Ok(stmt.query_row([id.as_str()], task_from_row).optional()?)
    }

    fn list_tasks(&self, column_id: &ColumnId) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE column_id = ? ORDER BY position"
        ))?;
        let rows = stmt.query_map([column_id.as_str()], task_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count_tasks(&self, column_id: &ColumnId) -> Result<usize> {
        Ok(self.conn()?.query_row(
            "SELECT COUNT(*) FROM tasks WHERE column_id = ?",
            [column_id.as_str()],
            |row| position(row, 0),
        )?)
    }

    fn apply(
        &self,
        board_id: &BoardId,
        guards: &[ColumnGuard],
        writes: &[TaskWrite],
    ) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        // Dropping the transaction without commit rolls it back
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for guard in guards {
            check_guard(&tx, guard)?;
        }
        for write in writes {
            write_task(&tx, write)?;
        }
        let touched = tx.execute(
            "UPDATE boards SET updated_at = ? WHERE id = ?",
            params![Utc::now().to_rfc3339(), board_id.as_str()],
        )?;
        if touched != 1 {
            return Err(BoardError::BoardNotFound {
                id: board_id.to_string(),
            });
        }
        tx.commit()?;

        debug!(%board_id, writes = writes.len(), "committed task writes");
        Ok(())
    }
}
