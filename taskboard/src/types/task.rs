//! Task types: Task and TaskPatch

use super::ids::{ColumnId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task/card on the board.
///
/// `column_id` and `position` are only meaningful together: a task's
/// position ranks it within its current column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub column_id: ColumnId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: usize,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task at the given position of a column
    pub fn new(
        column_id: ColumnId,
        title: impl Into<String>,
        created_by: UserId,
        position: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            column_id,
            title: title.into(),
            description: None,
            position,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Metadata changes for a task. Never touches column or position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title
    pub title: Option<String>,
    /// New description (None = don't change, Some(None) = clear, Some(Some(x)) = set)
    pub description: Option<Option<String>>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    /// Clear the description
    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    /// True when applying the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }

    /// Apply the patch to a task, returning whether anything changed
    pub fn apply(&self, task: &mut Task) -> bool {
        let mut changed = false;
        if let Some(title) = &self.title {
            if &task.title != title {
                task.title = title.clone();
                changed = true;
            }
        }
        if let Some(description) = &self.description {
            if &task.description != description {
                task.description = description.clone();
                changed = true;
            }
        }
        changed
    }
}
