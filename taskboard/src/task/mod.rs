//! Task commands

mod add;
mod delete;
mod get;
mod list;
mod mv;
mod update;

pub use add::AddTask;
pub use delete::DeleteTask;
pub use get::GetTask;
pub use list::ListTasks;
pub use mv::MoveTask;
pub use update::UpdateTask;

use crate::error::{BoardError, Result};

/// Convert a requested index, rejecting negative values
fn target_index(index: Option<i64>) -> Result<Option<usize>> {
    index
        .map(|index| {
            usize::try_from(index)
                .map_err(|_| BoardError::invalid_value("index", "must not be negative"))
        })
        .transpose()
}
