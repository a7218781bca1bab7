//! MoveTask command

use super::target_index;
use crate::error::{BoardError, Result};
use crate::manager::BoardManager;
use crate::operation::{logged, Execute, ExecutionResult, Operation};
use crate::types::{ColumnId, TaskId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Move a task within its column or to another column of the same board
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoveTask {
    /// The task ID to move
    pub id: TaskId,
    /// Destination column (may be the task's current column)
    pub column: ColumnId,
    /// Zero-based target index; omitted means the end of the column.
    /// Indexes past the end land at the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    /// Who moves the task
    pub actor: UserId,
}

impl MoveTask {
    /// Move a task to the end of a column
    pub fn to_column(
        id: impl Into<TaskId>,
        column: impl Into<ColumnId>,
        actor: impl Into<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            column: column.into(),
            index: None,
            actor: actor.into(),
        }
    }

    /// Set the target index
    pub fn at(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }
}

impl Operation for MoveTask {
    fn verb(&self) -> &'static str {
        "move"
    }

    fn noun(&self) -> &'static str {
        "task"
    }

    fn description(&self) -> &'static str {
        "Move a task to a different column or position"
    }

    fn actor(&self) -> Option<&UserId> {
        Some(&self.actor)
    }
}

#[async_trait]
impl Execute<BoardManager, BoardError> for MoveTask {
    async fn execute(&self, ctx: &BoardManager) -> ExecutionResult<Value, BoardError> {
        let start = Instant::now();
        let result: Result<Value> = async {
            let task = ctx
                .move_task(&self.id, &self.column, target_index(self.index)?, &self.actor)
                .await?;
            Ok(serde_json::to_value(&task)?)
        }
        .await;
        logged(self, start, result)
    }
}
