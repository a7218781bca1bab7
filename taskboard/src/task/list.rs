//! ListTasks command

use crate::error::BoardError;
use crate::manager::BoardManager;
use crate::operation::{unlogged, Execute, ExecutionResult, Operation};
use crate::types::ColumnId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// List the tasks of a column in position order
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListTasks {
    pub column: ColumnId,
}

impl ListTasks {
    pub fn new(column: impl Into<ColumnId>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Operation for ListTasks {
    fn verb(&self) -> &'static str {
        "list"
    }

    fn noun(&self) -> &'static str {
        "tasks"
    }

    fn description(&self) -> &'static str {
        "List the tasks of a column in order"
    }
}

#[async_trait]
impl Execute<BoardManager, BoardError> for ListTasks {
    async fn execute(&self, ctx: &BoardManager) -> ExecutionResult<Value, BoardError> {
        unlogged(
            async {
                let tasks = ctx.list_tasks(&self.column).await?;
                Ok(serde_json::json!({
                    "count": tasks.len(),
                    "tasks": tasks,
                }))
            }
            .await,
        )
    }
}
