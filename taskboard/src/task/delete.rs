//! DeleteTask command

use crate::error::{BoardError, Result};
use crate::manager::BoardManager;
use crate::operation::{logged, Execute, ExecutionResult, Operation};
use crate::types::{TaskId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Delete a task; the rest of its column closes the gap
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteTask {
    /// The task ID to delete
    pub id: TaskId,
    /// Who deletes the task
    pub actor: UserId,
}

impl DeleteTask {
    pub fn new(id: impl Into<TaskId>, actor: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            actor: actor.into(),
        }
    }
}

impl Operation for DeleteTask {
    fn verb(&self) -> &'static str {
        "delete"
    }

    fn noun(&self) -> &'static str {
        "task"
    }

    fn description(&self) -> &'static str {
        "Delete a task"
    }

    fn actor(&self) -> Option<&UserId> {
        Some(&self.actor)
    }
}

#[async_trait]
impl Execute<BoardManager, BoardError> for DeleteTask {
    async fn execute(&self, ctx: &BoardManager) -> ExecutionResult<Value, BoardError> {
        let start = Instant::now();
        let result: Result<Value> = async {
            ctx.delete_task(&self.id, &self.actor).await?;
            Ok(serde_json::json!({
                "deleted": true,
                "id": self.id,
            }))
        }
        .await;
        logged(self, start, result)
    }
}
