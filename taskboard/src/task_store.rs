//! Task lifecycle over ordered columns
//!
//! Every operation that changes membership or order reads the affected
//! columns, asks [`crate::sequence`] for the new ordering, and commits only
//! the rows whose column or position actually changed as one batch. The batch
//! carries the orderings it was computed from, so a commit against a column
//! another writer changed in the meantime fails with a conflict.
//!
//! These methods assume the caller holds the board's lock; [`crate::BoardManager`]
//! is the only caller that mutates.

use crate::error::{BoardError, Result};
use crate::sequence::{append_position, compute_delete_positions, compute_move_positions};
use crate::storage::{BoardStorage, ColumnGuard, TaskWrite};
use crate::types::{Column, ColumnId, Task, TaskId, TaskPatch, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Owns the tasks of every column
#[derive(Clone)]
pub struct TaskStore {
    storage: Arc<dyn BoardStorage>,
}

/// Stored (column, position) of each task in the columns being rewritten
type Placements = HashMap<TaskId, (ColumnId, usize)>;

fn placements_of(tasks: &[Task]) -> Placements {
    tasks
        .iter()
        .map(|t| (t.id.clone(), (t.column_id.clone(), t.position)))
        .collect()
}

fn ids_of(tasks: &[Task]) -> Vec<TaskId> {
    tasks.iter().map(|t| t.id.clone()).collect()
}

/// Writes needed to make `column_id` hold `ordering` at positions `0..n`
fn renumber(
    ordering: &[TaskId],
    column_id: &ColumnId,
    stored: &Placements,
    now: DateTime<Utc>,
) -> Vec<TaskWrite> {
    ordering
        .iter()
        .enumerate()
        .filter(|(position, id)| {
            stored
                .get(*id)
                .is_none_or(|(column, stored_position)| {
                    column != column_id || stored_position != position
                })
        })
        .map(|(position, id)| TaskWrite::Place {
            id: id.clone(),
            column_id: column_id.clone(),
            position,
            updated_at: now,
        })
        .collect()
}

/// Writes and guards that carry out one move
struct StagedMove {
    writes: Vec<TaskWrite>,
    guards: Vec<ColumnGuard>,
    column_id: ColumnId,
    position: usize,
}

fn missing_from_ordering(id: &TaskId) -> BoardError {
    BoardError::storage(format!("task '{id}' missing from its column ordering"))
}

impl TaskStore {
    pub fn new(storage: Arc<dyn BoardStorage>) -> Self {
        Self { storage }
    }

    fn column(&self, id: &ColumnId) -> Result<Column> {
        self.storage
            .get_column(id)?
            .ok_or_else(|| BoardError::ColumnNotFound { id: id.to_string() })
    }

    /// Read a task
    pub fn get_task(&self, id: &TaskId) -> Result<Task> {
        self.storage
            .get_task(id)?
            .ok_or_else(|| BoardError::TaskNotFound { id: id.to_string() })
    }

    /// Tasks of a column ordered by position
    pub fn list_tasks_by_column(&self, column_id: &ColumnId) -> Result<Vec<Task>> {
        self.column(column_id)?;
        self.storage.list_tasks(column_id)
    }

    /// Append a new task to the tail of a column
    pub fn create_task(
        &self,
        column_id: &ColumnId,
        title: &str,
        description: Option<&str>,
        creator: &UserId,
    ) -> Result<Task> {
        let column = self.column(column_id)?;
        let len = self.storage.count_tasks(column_id)?;
        let position = append_position(len);

        let mut task = Task::new(column.id.clone(), title, creator.clone(), position);
        task.description = description.map(str::to_string);

        self.storage.apply(
            &column.board_id,
            &[ColumnGuard::Len {
                column_id: column.id.clone(),
                len,
            }],
            &[TaskWrite::Insert(task.clone())],
        )?;
        debug!(task_id = %task.id, %column_id, position, "created task");
        Ok(task)
    }

    /// Change a task's title and/or description. Column and position are untouched.
    pub fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task> {
        let mut task = self.get_task(id)?;
        if !patch.apply(&mut task) {
            return Ok(task);
        }
        task.updated_at = Utc::now();

        let column = self.column(&task.column_id)?;
        self.storage
            .apply(&column.board_id, &[], &[update_write(&task)])?;
        debug!(task_id = %task.id, "updated task");
        Ok(task)
    }

    /// Remove a task and close the gap it leaves in its column
    pub fn delete_task(&self, id: &TaskId) -> Result<Task> {
        let task = self.get_task(id)?;
        let column = self.column(&task.column_id)?;
        let siblings = self.storage.list_tasks(&column.id)?;
        let ordering = ids_of(&siblings);

        let remaining = compute_delete_positions(&ordering, &task.id)
            .ok_or_else(|| missing_from_ordering(&task.id))?;

        let mut writes = vec![TaskWrite::Delete(task.id.clone())];
        writes.extend(renumber(
            &remaining,
            &column.id,
            &placements_of(&siblings),
            Utc::now(),
        ));
        let guard = ColumnGuard::Order {
            column_id: column.id.clone(),
            tasks: ordering,
        };
        self.storage.apply(&column.board_id, &[guard], &writes)?;
        debug!(task_id = %task.id, column_id = %column.id, renumbered = writes.len() - 1, "deleted task");
        Ok(task)
    }

    /// Plan moving `task` to `target_index` of `destination`
    fn stage_move(
        &self,
        task: &Task,
        destination: &Column,
        target_index: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<StagedMove> {
        let source = self.column(&task.column_id)?;
        if source.board_id != destination.board_id {
            return Err(BoardError::CrossBoardMove {
                task: task.id.to_string(),
                column: destination.id.to_string(),
            });
        }

        let source_tasks = self.storage.list_tasks(&source.id)?;
        let source_order = ids_of(&source_tasks);
        let mut stored = placements_of(&source_tasks);
        let mut guards = vec![ColumnGuard::Order {
            column_id: source.id.clone(),
            tasks: source_order.clone(),
        }];

        let plan = if source.id != destination.id {
            let destination_tasks = self.storage.list_tasks(&destination.id)?;
            let destination_order = ids_of(&destination_tasks);
            stored.extend(placements_of(&destination_tasks));
            let plan = compute_move_positions(
                &source_order,
                Some(&destination_order),
                &task.id,
                target_index,
            );
            guards.push(ColumnGuard::Order {
                column_id: destination.id.clone(),
                tasks: destination_order,
            });
            plan
        } else {
            compute_move_positions(&source_order, None, &task.id, target_index)
        }
        .ok_or_else(|| missing_from_ordering(&task.id))?;

        let mut writes = renumber(&plan.source, &source.id, &stored, now);
        if let Some(destination_order) = &plan.destination {
            writes.extend(renumber(destination_order, &destination.id, &stored, now));
        }

        Ok(StagedMove {
            writes,
            guards,
            column_id: destination.id.clone(),
            position: plan.index,
        })
    }

    /// Move a task to `target_index` of `destination`, which may be its own column.
    ///
    /// Fails when the destination belongs to another board. A move that would
    /// not change any position writes nothing.
    pub fn move_task(
        &self,
        id: &TaskId,
        destination: &Column,
        target_index: Option<usize>,
    ) -> Result<Task> {
        let task = self.get_task(id)?;
        let now = Utc::now();
        let staged = self.stage_move(&task, destination, target_index, now)?;

        if staged.writes.is_empty() {
            debug!(task_id = %task.id, "move leaves ordering unchanged");
            return Ok(task);
        }

        self.storage
            .apply(&destination.board_id, &staged.guards, &staged.writes)?;
        debug!(
            task_id = %task.id,
            from = %task.column_id,
            to = %destination.id,
            index = staged.position,
            writes = staged.writes.len(),
            "moved task"
        );
        Ok(Task {
            column_id: staged.column_id,
            position: staged.position,
            updated_at: now,
            ..task
        })
    }

    /// Apply a patch and move the task as one batch.
    ///
    /// Without a destination the task is repositioned within its current
    /// column. Either half failing leaves the task untouched.
    pub fn update_and_move_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        destination: Option<&Column>,
        target_index: Option<usize>,
    ) -> Result<Task> {
        let mut task = self.get_task(id)?;
        let destination = match destination {
            Some(column) => column.clone(),
            None => self.column(&task.column_id)?,
        };
        let now = Utc::now();
        let staged = self.stage_move(&task, &destination, target_index, now)?;

        let mut writes = Vec::with_capacity(staged.writes.len() + 1);
        if patch.apply(&mut task) {
            task.updated_at = now;
            writes.push(update_write(&task));
        }
        if !staged.writes.is_empty() {
            task.column_id = staged.column_id;
            task.position = staged.position;
            task.updated_at = now;
            writes.extend(staged.writes);
        }
        if writes.is_empty() {
            return Ok(task);
        }

        self.storage
            .apply(&destination.board_id, &staged.guards, &writes)?;
        debug!(
            task_id = %task.id,
            column_id = %task.column_id,
            position = task.position,
            writes = writes.len(),
            "updated and moved task"
        );
        Ok(task)
    }
}

fn update_write(task: &Task) -> TaskWrite {
    TaskWrite::Update {
        id: task.id.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        updated_at: task.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_store::ColumnStore;
    use crate::sequence::is_contiguous;
    use crate::storage::{MemoryStorage, SqliteStorage};

    struct Fixture {
        tasks: TaskStore,
        columns: Vec<Column>,
    }

    fn fixtures() -> Vec<Fixture> {
        let backends: Vec<Arc<dyn BoardStorage>> = vec![
            Arc::new(MemoryStorage::new()),
            Arc::new(SqliteStorage::open_in_memory().unwrap()),
        ];
        backends
            .into_iter()
            .map(|storage| {
                let column_store = ColumnStore::new(storage.clone());
                let board = column_store
                    .get_or_create_board(&"project-1".into())
                    .unwrap();
                Fixture {
                    tasks: TaskStore::new(storage),
                    columns: column_store.list_columns(&board.id).unwrap(),
                }
            })
            .collect()
    }

    impl Fixture {
        fn add(&self, column: usize, title: &str) -> Task {
            self.tasks
                .create_task(&self.columns[column].id, title, None, &"alice".into())
                .unwrap()
        }

        fn titles(&self, column: usize) -> Vec<String> {
            let tasks = self
                .tasks
                .list_tasks_by_column(&self.columns[column].id)
                .unwrap();
            assert!(is_contiguous(tasks.iter().map(|t| t.position)));
            tasks.into_iter().map(|t| t.title).collect()
        }
    }

    #[test]
    fn test_create_appends_to_tail() {
        for fx in fixtures() {
            assert_eq!(fx.add(0, "A").position, 0);
            assert_eq!(fx.add(0, "B").position, 1);
            assert_eq!(fx.add(1, "X").position, 0);
            assert_eq!(fx.titles(0), vec!["A", "B"]);
        }
    }

    #[test]
    fn test_create_in_missing_column() {
        for fx in fixtures() {
            let err = fx
                .tasks
                .create_task(&"nope".into(), "A", None, &"alice".into())
                .unwrap_err();
            assert!(matches!(err, BoardError::ColumnNotFound { .. }));
        }
    }

    #[test]
    fn test_update_keeps_position() {
        for fx in fixtures() {
            fx.add(0, "A");
            let b = fx.add(0, "B");
            let updated = fx
                .tasks
                .update_task(&b.id, &TaskPatch::new().with_title("B2").with_description("d"))
                .unwrap();
            assert_eq!(updated.position, 1);
            assert_eq!(updated.column_id, fx.columns[0].id);

            let stored = fx.tasks.get_task(&b.id).unwrap();
            assert_eq!(stored.title, "B2");
            assert_eq!(stored.description.as_deref(), Some("d"));
            assert_eq!(fx.titles(0), vec!["A", "B2"]);
        }
    }

    #[test]
    fn test_update_missing_task() {
        for fx in fixtures() {
            let err = fx
                .tasks
                .update_task(&"nope".into(), &TaskPatch::new().with_title("x"))
                .unwrap_err();
            assert!(matches!(err, BoardError::TaskNotFound { .. }));
        }
    }

    #[test]
    fn test_reorder_within_column() {
        for fx in fixtures() {
            fx.add(0, "A");
            let b = fx.add(0, "B");
            fx.add(0, "C");

            let moved = fx.tasks.move_task(&b.id, &fx.columns[0], Some(0)).unwrap();
            assert_eq!(moved.position, 0);
            assert_eq!(fx.titles(0), vec!["B", "A", "C"]);
        }
    }

    #[test]
    fn test_transfer_between_columns() {
        for fx in fixtures() {
            let a = fx.add(0, "A");
            fx.add(0, "B");
            fx.add(1, "X");
            fx.add(1, "Y");

            let moved = fx.tasks.move_task(&a.id, &fx.columns[1], Some(1)).unwrap();
            assert_eq!(moved.column_id, fx.columns[1].id);
            assert_eq!(moved.position, 1);
            assert_eq!(fx.titles(0), vec!["B"]);
            assert_eq!(fx.titles(1), vec!["X", "A", "Y"]);
        }
    }

    #[test]
    fn test_move_without_index_appends() {
        for fx in fixtures() {
            let a = fx.add(0, "A");
            fx.add(2, "Done");
            let moved = fx.tasks.move_task(&a.id, &fx.columns[2], None).unwrap();
            assert_eq!(moved.position, 1);
            assert_eq!(fx.titles(2), vec!["Done", "A"]);
        }
    }

    #[test]
    fn test_noop_move_writes_nothing() {
        for fx in fixtures() {
            fx.add(0, "A");
            let b = fx.add(0, "B");
            let before = fx.tasks.get_task(&b.id).unwrap();

            let moved = fx.tasks.move_task(&b.id, &fx.columns[0], Some(1)).unwrap();
            assert_eq!(moved, before);
            assert_eq!(fx.tasks.get_task(&b.id).unwrap().updated_at, before.updated_at);
        }
    }

    #[test]
    fn test_delete_compacts_column() {
        for fx in fixtures() {
            let a = fx.add(0, "A");
            fx.add(0, "B");
            fx.add(0, "C");

            let deleted = fx.tasks.delete_task(&a.id).unwrap();
            assert_eq!(deleted.title, "A");
            assert_eq!(fx.titles(0), vec!["B", "C"]);
            assert!(matches!(
                fx.tasks.get_task(&a.id),
                Err(BoardError::TaskNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_update_and_move_in_one_batch() {
        for fx in fixtures() {
            let a = fx.add(0, "A");
            fx.add(0, "B");
            fx.add(1, "X");

            let moved = fx
                .tasks
                .update_and_move_task(
                    &a.id,
                    &TaskPatch::new().with_title("A2"),
                    Some(&fx.columns[1]),
                    Some(0),
                )
                .unwrap();
            assert_eq!(moved.title, "A2");
            assert_eq!(moved.column_id, fx.columns[1].id);
            assert_eq!(moved.position, 0);
            let stored = fx.tasks.get_task(&a.id).unwrap();
            assert_eq!(stored.title, "A2");
            assert_eq!(stored.position, 0);
            assert_eq!(fx.titles(0), vec!["B"]);
            assert_eq!(fx.titles(1), vec!["A2", "X"]);

            // No destination repositions within the current column
            let moved = fx
                .tasks
                .update_and_move_task(&a.id, &TaskPatch::new(), None, Some(5))
                .unwrap();
            assert_eq!(moved.position, 1);
            assert_eq!(fx.titles(1), vec!["X", "A2"]);
        }
    }

    #[test]
    fn test_rejected_move_discards_patch() {
        for fx in fixtures() {
            let a = fx.add(0, "A");
            let foreign = Column::new("other-board".into(), "To-Do", 0);
            let err = fx
                .tasks
                .update_and_move_task(
                    &a.id,
                    &TaskPatch::new().with_title("Renamed"),
                    Some(&foreign),
                    None,
                )
                .unwrap_err();
            assert!(matches!(err, BoardError::CrossBoardMove { .. }));
            assert_eq!(fx.titles(0), vec!["A"]);
        }
    }

    #[test]
    fn test_cross_board_move_rejected() {
        for fx in fixtures() {
            let a = fx.add(0, "A");
            let foreign = Column::new("other-board".into(), "To-Do", 0);
            let err = fx.tasks.move_task(&a.id, &foreign, Some(0)).unwrap_err();
            assert!(matches!(err, BoardError::CrossBoardMove { .. }));
            assert_eq!(fx.titles(0), vec!["A"]);
        }
    }
}
