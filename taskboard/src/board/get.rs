//! GetBoard command

use crate::error::BoardError;
use crate::manager::BoardManager;
use crate::operation::{unlogged, Execute, ExecutionResult, Operation};
use crate::types::ProjectId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Get a project's board with every column and its ordered tasks.
///
/// The board and its default columns are created on first access.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetBoard {
    /// The owning project
    pub project: ProjectId,
}

impl GetBoard {
    pub fn new(project: impl Into<ProjectId>) -> Self {
        Self {
            project: project.into(),
        }
    }
}

impl Operation for GetBoard {
    fn verb(&self) -> &'static str {
        "get"
    }

    fn noun(&self) -> &'static str {
        "board"
    }

    fn description(&self) -> &'static str {
        "Retrieve a project's board, creating it on first access"
    }
}

#[async_trait]
impl Execute<BoardManager, BoardError> for GetBoard {
    async fn execute(&self, ctx: &BoardManager) -> ExecutionResult<Value, BoardError> {
        unlogged(
            async {
                let view = ctx.get_or_create_board_view(&self.project).await?;
                Ok(serde_json::to_value(&view)?)
            }
            .await,
        )
    }
}
