//! AddTask command

use crate::error::{BoardError, Result};
use crate::manager::BoardManager;
use crate::operation::{logged, Execute, ExecutionResult, Operation};
use crate::types::{ColumnId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Add a new task to the tail of a column
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddTask {
    /// The column to add the task to
    pub column: ColumnId,
    /// The task title (required, non-empty)
    pub title: String,
    /// Detailed task description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Who creates the task
    pub creator: UserId,
}

impl AddTask {
    /// Create a new AddTask command
    pub fn new(
        column: impl Into<ColumnId>,
        title: impl Into<String>,
        creator: impl Into<UserId>,
    ) -> Self {
        Self {
            column: column.into(),
            title: title.into(),
            description: None,
            creator: creator.into(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Operation for AddTask {
    fn verb(&self) -> &'static str {
        "add"
    }

    fn noun(&self) -> &'static str {
        "task"
    }

    fn description(&self) -> &'static str {
        "Create a new task at the end of a column"
    }

    fn actor(&self) -> Option<&UserId> {
        Some(&self.creator)
    }
}

#[async_trait]
impl Execute<BoardManager, BoardError> for AddTask {
    async fn execute(&self, ctx: &BoardManager) -> ExecutionResult<Value, BoardError> {
        let start = Instant::now();
        let result: Result<Value> = async {
            let task = ctx
                .create_task(
                    &self.column,
                    &self.title,
                    self.description.as_deref(),
                    &self.creator,
                )
                .await?;
            Ok(serde_json::to_value(&task)?)
        }
        .await;
        logged(self, start, result)
    }
}
