//! UpdateTask command

use super::target_index;
use crate::error::{BoardError, Result};
use crate::manager::BoardManager;
use crate::operation::{logged, Execute, ExecutionResult, Operation};
use crate::types::{ColumnId, TaskId, TaskPatch, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Distinguish an absent field from an explicit `null`
fn explicit_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Update a task's title and/or description, optionally repositioning it
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateTask {
    /// The task ID to update
    pub id: TaskId,
    /// Who updates the task
    pub actor: UserId,
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description; `null` clears it
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    /// Move the task to this column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnId>,
    /// Move the task to this index; past the end lands at the end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
}

impl UpdateTask {
    /// Create a new UpdateTask command
    pub fn new(id: impl Into<TaskId>, actor: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            actor: actor.into(),
            ..Self::default()
        }
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

    /// Remove the description
    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    /// Move the task to a column
    pub fn with_column(mut self, column: impl Into<ColumnId>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Move the task to an index
    pub fn with_index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    fn patch(&self) -> TaskPatch {
        TaskPatch {
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }

    async fn run(&self, ctx: &BoardManager) -> Result<Value> {
        let index = target_index(self.index)?;
        let task = if self.column.is_some() || index.is_some() {
            ctx.update_and_move_task(
                &self.id,
                &self.patch(),
                self.column.as_ref(),
                index,
                &self.actor,
            )
            .await?
        } else {
            ctx.update_task(&self.id, &self.patch(), &self.actor).await?
        };
        Ok(serde_json::to_value(&task)?)
    }
}

impl Operation for UpdateTask {
    fn verb(&self) -> &'static str {
        "update"
    }

    fn noun(&self) -> &'static str {
        "task"
    }

    fn description(&self) -> &'static str {
        "Update a task's title or description, or reposition it"
    }

    fn actor(&self) -> Option<&UserId> {
        Some(&self.actor)
    }
}

#[async_trait]
impl Execute<BoardManager, BoardError> for UpdateTask {
    async fn execute(&self, ctx: &BoardManager) -> ExecutionResult<Value, BoardError> {
        let start = Instant::now();
        let result = self.run(ctx).await;
        logged(self, start, result)
    }
}
