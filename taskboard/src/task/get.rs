//! GetTask command

use crate::error::BoardError;
use crate::manager::BoardManager;
use crate::operation::{unlogged, Execute, ExecutionResult, Operation};
use crate::types::TaskId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Get a task by ID
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetTask {
    /// The task ID to retrieve
    pub id: TaskId,
}

impl GetTask {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self { id: id.into() }
    }
}

impl Operation for GetTask {
    fn verb(&self) -> &'static str {
        "get"
    }

    fn noun(&self) -> &'static str {
        "task"
    }

    fn description(&self) -> &'static str {
        "Retrieve a task by ID"
    }
}

#[async_trait]
impl Execute<BoardManager, BoardError> for GetTask {
    async fn execute(&self, ctx: &BoardManager) -> ExecutionResult<Value, BoardError> {
        unlogged(
            async {
                let task = ctx.get_task(&self.id).await?;
                Ok(serde_json::to_value(&task)?)
            }
            .await,
        )
    }
}
