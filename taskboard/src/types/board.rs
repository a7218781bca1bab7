//! Board-level types: Board, Column and the read-side board view

use super::ids::{BoardId, ColumnId, ProjectId};
use super::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the columns every new board is seeded with, in position order
pub const DEFAULT_COLUMNS: [&str; 3] = ["To-Do", "In Progress", "Completed"];

/// The task board of a single project.
///
/// Columns are separate records that point back at the board; the board
/// itself only carries identity and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub project_id: ProjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    /// Create a new board for the given project
    pub fn new(project_id: impl Into<ProjectId>) -> Self {
        let now = Utc::now();
        Self {
            id: BoardId::new(),
            project_id: project_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the default columns for this board
    pub fn default_columns(&self) -> Vec<Column> {
        DEFAULT_COLUMNS
            .iter()
            .enumerate()
            .map(|(position, name)| Column::new(self.id.clone(), *name, position))
            .collect()
    }
}

/// A column defines a workflow stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub board_id: BoardId,
    pub name: String,
    pub position: usize,
}

impl Column {
    /// Create a new column at the given position
    pub fn new(board_id: BoardId, name: impl Into<String>, position: usize) -> Self {
        Self {
            id: ColumnId::new(),
            board_id,
            name: name.into(),
            position,
        }
    }
}

/// A board with its columns and each column's ordered tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    pub columns: Vec<ColumnView>,
}

impl BoardView {
    /// Total number of tasks across all columns
    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }
}

/// A column together with its tasks, ordered by position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnView {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<Task>,
}
