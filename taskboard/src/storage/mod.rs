//! Durable storage primitives for boards, columns and tasks
//!
//! A storage backend provides access, not logic: it reads and writes rows and
//! commits batches atomically. Ordering decisions are made by the callers in
//! [`crate::column_store`] and [`crate::task_store`].

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::error::{BoardError, Result};
use crate::types::{Board, BoardId, Column, ColumnId, ProjectId, Task, TaskId};
use chrono::{DateTime, Utc};

/// One row-level change inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum TaskWrite {
    /// Insert a new task row
    Insert(Task),
    /// Rewrite a task's metadata
    Update {
        id: TaskId,
        title: String,
        description: Option<String>,
        updated_at: DateTime<Utc>,
    },
    /// Set a task's column and position
    Place {
        id: TaskId,
        column_id: ColumnId,
        position: usize,
        updated_at: DateTime<Utc>,
    },
    /// Remove a task row
    Delete(TaskId),
}

impl TaskWrite {
    /// The task this write touches
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Insert(task) => &task.id,
            Self::Update { id, .. } | Self::Place { id, .. } | Self::Delete(id) => id,
        }
    }
}

/// What a batch assumes about a column it was computed from.
///
/// The backend re-checks every guard inside the commit and fails with a
/// conflict when one no longer holds, so a writer that slipped in between
/// the read and the commit is never silently overwritten.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnGuard {
    /// The column holds exactly `len` tasks
    Len { column_id: ColumnId, len: usize },
    /// The column holds exactly these tasks at positions `0..n`
    Order { column_id: ColumnId, tasks: Vec<TaskId> },
}

impl ColumnGuard {
    pub fn column_id(&self) -> &ColumnId {
        match self {
            Self::Len { column_id, .. } | Self::Order { column_id, .. } => column_id,
        }
    }

    pub(crate) fn violated(&self) -> BoardError {
        BoardError::conflict(format!(
            "column '{}' changed since it was read",
            self.column_id()
        ))
    }
}

/// Storage backend for the board engine.
///
/// Calls block; async callers run them on the blocking thread pool.
pub trait BoardStorage: Send + Sync {
    /// Find the board of a project
    fn find_board_by_project(&self, project_id: &ProjectId) -> Result<Option<Board>>;

    /// Read a board
    fn get_board(&self, id: &BoardId) -> Result<Option<Board>>;

    /// Insert a board together with its columns as one unit.
    ///
    /// Fails with a conflict when the project already has a board.
    fn create_board(&self, board: &Board, columns: &[Column]) -> Result<()>;

    /// Columns of a board, ordered by position
    fn list_columns(&self, board_id: &BoardId) -> Result<Vec<Column>>;

    /// Read a column
    fn get_column(&self, id: &ColumnId) -> Result<Option<Column>>;

    /// Read a task
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Tasks of a column, ordered by position
    fn list_tasks(&self, column_id: &ColumnId) -> Result<Vec<Task>>;

    /// Number of tasks in a column
    fn count_tasks(&self, column_id: &ColumnId) -> Result<usize>;

    /// Commit a batch of writes against one board, all or nothing.
    ///
    /// Every guard is checked inside the same unit before any write lands.
    /// Also bumps the board's `updated_at`. An empty batch is a no-op.
    fn apply(
        &self,
        board_id: &BoardId,
        guards: &[ColumnGuard],
        writes: &[TaskWrite],
    ) -> Result<()>;
}
