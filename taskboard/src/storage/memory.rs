//! In-memory storage
//!
//! Tasks live in an arena keyed by id; each column owns an ordered list of
//! task ids. That list is the only record of order: a task's position is its
//! index there. A task-to-column index is kept in step with the lists so
//! lookups never scan other columns.

use super::{BoardStorage, ColumnGuard, TaskWrite};
use crate::error::{BoardError, ErrorKind, Result};
use crate::types::{Board, BoardId, Column, ColumnId, ProjectId, Task, TaskId, UserId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Task fields that are not derived from column membership
#[derive(Debug, Clone)]
struct TaskRow {
    title: String,
    description: Option<String>,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct ColumnSlot {
    column: Column,
    tasks: Vec<TaskId>,
}

/// Pre-images of everything a batch touched, restored if the batch fails
#[derive(Default)]
struct Undo {
    columns: HashMap<ColumnId, Vec<TaskId>>,
    tasks: HashMap<TaskId, (Option<TaskRow>, Option<ColumnId>)>,
}

impl Undo {
    fn save_column(&mut self, state: &State, id: &ColumnId) {
        if let Some(slot) = state.columns.get(id) {
            self.columns
                .entry(id.clone())
                .or_insert_with(|| slot.tasks.clone());
        }
    }

    fn save_task(&mut self, state: &State, id: &TaskId) {
        self.tasks.entry(id.clone()).or_insert_with(|| {
            (
                state.tasks.get(id).cloned(),
                state.task_columns.get(id).cloned(),
            )
        });
    }

    fn restore(self, state: &mut State) {
        for (id, tasks) in self.columns {
            if let Some(slot) = state.columns.get_mut(&id) {
                slot.tasks = tasks;
            }
        }
        for (id, (row, column)) in self.tasks {
            match row {
                Some(row) => state.tasks.insert(id.clone(), row),
                None => state.tasks.remove(&id),
            };
            match column {
                Some(column) => state.task_columns.insert(id, column),
                None => state.task_columns.remove(&id),
            };
        }
    }
}

#[derive(Debug, Default)]
struct State {
    boards: HashMap<BoardId, Board>,
    projects: HashMap<ProjectId, BoardId>,
    columns: HashMap<ColumnId, ColumnSlot>,
    tasks: HashMap<TaskId, TaskRow>,
    task_columns: HashMap<TaskId, ColumnId>,
}

impl State {
    fn build(&self, id: &TaskId, column_id: &ColumnId, position: usize) -> Option<Task> {
        let row = self.tasks.get(id)?;
        Some(Task {
            id: id.clone(),
            column_id: column_id.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            position,
            created_by: row.created_by.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn materialize(&self, id: &TaskId) -> Option<Task> {
        let column_id = self.task_columns.get(id)?;
        let position = self
            .columns
            .get(column_id)?
            .tasks
            .iter()
            .position(|t| t == id)?;
        self.build(id, column_id, position)
    }

    fn slot_mut(&mut self, id: &ColumnId) -> Result<&mut ColumnSlot> {
        self.columns
            .get_mut(id)
            .ok_or_else(|| BoardError::ColumnNotFound { id: id.to_string() })
    }

    fn row_mut(&mut self, id: &TaskId) -> Result<&mut TaskRow> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| BoardError::TaskNotFound { id: id.to_string() })
    }

    fn check(&self, guard: &ColumnGuard) -> Result<()> {
        let slot = self
            .columns
            .get(guard.column_id())
            .ok_or_else(|| BoardError::ColumnNotFound {
                id: guard.column_id().to_string(),
            })?;
        let holds = match guard {
            ColumnGuard::Len { len, .. } => slot.tasks.len() == *len,
            ColumnGuard::Order { tasks, .. } => &slot.tasks == tasks,
        };
        if holds {
            Ok(())
        } else {
            Err(guard.violated())
        }
    }

    /// Take a task out of its column's list
    fn detach(&mut self, id: &TaskId, undo: &mut Undo) -> Result<()> {
        let column_id = self
            .task_columns
            .get(id)
            .cloned()
            .ok_or_else(|| BoardError::TaskNotFound { id: id.to_string() })?;
        undo.save_column(self, &column_id);
        self.slot_mut(&column_id)?.tasks.retain(|t| t != id);
        self.task_columns.remove(id);
        Ok(())
    }

    /// Apply writes all or nothing
    fn apply(&mut self, writes: &[TaskWrite]) -> Result<()> {
        let mut undo = Undo::default();
        let result = self.apply_logged(writes, &mut undo);
        if result.is_err() {
            undo.restore(self);
        }
        result
    }

    /// Apply writes in order; placements are resolved last, lowest target first
    fn apply_logged(&mut self, writes: &[TaskWrite], undo: &mut Undo) -> Result<()> {
        let mut placements = Vec::new();

        for write in writes {
            undo.save_task(self, write.task_id());
            match write {
                TaskWrite::Insert(task) => {
                    undo.save_column(self, &task.column_id);
                    let slot = self.slot_mut(&task.column_id)?;
                    let index = task.position.min(slot.tasks.len());
                    slot.tasks.insert(index, task.id.clone());
                    self.task_columns
                        .insert(task.id.clone(), task.column_id.clone());
                    self.tasks.insert(
                        task.id.clone(),
                        TaskRow {
                            title: task.title.clone(),
                            description: task.description.clone(),
                            created_by: task.created_by.clone(),
                            created_at: task.created_at,
                            updated_at: task.updated_at,
                        },
                    );
                }
                TaskWrite::Update {
                    id,
                    title,
                    description,
                    updated_at,
                } => {
                    let row = self.row_mut(id)?;
                    row.title = title.clone();
                    row.description = description.clone();
                    row.updated_at = *updated_at;
                }
                TaskWrite::Place {
                    id,
                    column_id,
                    position,
                    updated_at,
                } => {
                    self.row_mut(id)?.updated_at = *updated_at;
                    self.detach(id, undo)?;
                    placements.push((column_id, *position, id));
                }
                TaskWrite::Delete(id) => {
                    if self.tasks.remove(id).is_none() {
                        return Err(BoardError::TaskNotFound { id: id.to_string() });
                    }
                    self.detach(id, undo)?;
                }
            }
        }

        // Unplaced tasks already sit at their final index, so inserting the
        // placed ones in ascending position order lands each exactly.
        placements.sort_by_key(|(_, position, _)| *position);
        for (column_id, position, id) in placements {
            undo.save_column(self, column_id);
            let slot = self.slot_mut(column_id)?;
            let index = position.min(slot.tasks.len());
            slot.tasks.insert(index, id.clone());
            self.task_columns.insert(id.clone(), column_id.clone());
        }
        Ok(())
    }
}

/// Volatile storage for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    injected_failures: Mutex<VecDeque<ErrorKind>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| BoardError::storage("memory storage mutex poisoned"))
    }

    fn take_injected_failure(&self) -> Result<()> {
        let next = self
            .injected_failures
            .lock()
            .map_err(|_| BoardError::storage("memory storage mutex poisoned"))?
            .pop_front();
        match next {
            None => Ok(()),
            Some(ErrorKind::Conflict) => Err(BoardError::conflict("injected commit conflict")),
            Some(ErrorKind::NotFound) | Some(ErrorKind::Validation) | Some(ErrorKind::Storage) => {
                Err(BoardError::storage("injected commit failure"))
            }
        }
    }

    /// Make the next `count` commits fail with an error of `kind`
    #[cfg(any(test, feature = "test-support"))]
    pub fn fail_next_commits(&self, count: usize, kind: ErrorKind) {
        if let Ok(mut failures) = self.injected_failures.lock() {
            failures.extend(std::iter::repeat(kind).take(count));
        }
    }
}

impl BoardStorage for MemoryStorage {
    fn find_board_by_project(&self, project_id: &ProjectId) -> Result<Option<Board>> {
        let state = self.state()?;
        Ok(state
            .projects
            .get(project_id)
            .and_then(|id| state.boards.get(id))
            .cloned())
    }

    fn get_board(&self, id: &BoardId) -> Result<Option<Board>> {
        Ok(self.state()?.boards.get(id).cloned())
    }

    fn create_board(&self, board: &Board, columns: &[Column]) -> Result<()> {
        self.take_injected_failure()?;
        let mut state = self.state()?;
        if state.projects.contains_key(&board.project_id) {
            return Err(BoardError::conflict(format!(
                "project '{}' already has a board",
                board.project_id
            )));
        }
        state
            .projects
            .insert(board.project_id.clone(), board.id.clone());
        state.boards.insert(board.id.clone(), board.clone());
        for column in columns {
            state.columns.insert(
                column.id.clone(),
                ColumnSlot {
                    column: column.clone(),
                    tasks: Vec::new(),
                },
            );
        }
        Ok(())
    }

    fn list_columns(&self, board_id: &BoardId) -> Result<Vec<Column>> {
        let state = self.state()?;
        let mut columns: Vec<Column> = state
            .columns
            .values()
            .filter(|slot| &slot.column.board_id == board_id)
            .map(|slot| slot.column.clone())
            .collect();
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }

    fn get_column(&self, id: &ColumnId) -> Result<Option<Column>> {
        Ok(self.state()?.columns.get(id).map(|slot| slot.column.clone()))
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.state()?.materialize(id))
    }

    fn list_tasks(&self, column_id: &ColumnId) -> Result<Vec<Task>> {
        let state = self.state()?;
        let Some(slot) = state.columns.get(column_id) else {
            return Ok(Vec::new());
        };
        Ok(slot
            .tasks
            .iter()
            .enumerate()
            .filter_map(|(position, id)| state.build(id, column_id, position))
            .collect())
    }

    fn count_tasks(&self, column_id: &ColumnId) -> Result<usize> {
        Ok(self
            .state()?
            .columns
            .get(column_id)
            .map_or(0, |slot| slot.tasks.len()))
    }

    fn apply(
        &self,
        board_id: &BoardId,
        guards: &[ColumnGuard],
        writes: &[TaskWrite],
    ) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.take_injected_failure()?;

        let mut state = self.state()?;
        if !state.boards.contains_key(board_id) {
            return Err(BoardError::BoardNotFound {
                id: board_id.to_string(),
            });
        }
        for guard in guards {
            state.check(guard)?;
        }
        state.apply(writes)?;
        if let Some(board) = state.boards.get_mut(board_id) {
            board.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryStorage, Board, Vec<Column>) {
        let storage = MemoryStorage::new();
        let board = Board::new("project-1");
        let columns = board.default_columns();
        storage.create_board(&board, &columns).unwrap();
        (storage, board, columns)
    }

    fn insert(storage: &MemoryStorage, board: &Board, column: &Column, title: &str) -> Task {
        let position = storage.count_tasks(&column.id).unwrap();
        let task = Task::new(column.id.clone(), title, "alice".into(), position);
        storage
            .apply(&board.id, &[], &[TaskWrite::Insert(task.clone())])
            .unwrap();
        task
    }

    fn titles(storage: &MemoryStorage, column: &Column) -> Vec<String> {
        storage
            .list_tasks(&column.id)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect()
    }

    #[test]
    fn test_positions_follow_list_order() {
        let (storage, board, columns) = seeded();
        insert(&storage, &board, &columns[0], "A");
        insert(&storage, &board, &columns[0], "B");

        let tasks = storage.list_tasks(&columns[0].id).unwrap();
        assert_eq!(tasks[0].position, 0);
        assert_eq!(tasks[1].position, 1);
        assert_eq!(tasks[1].column_id, columns[0].id);
    }

    #[test]
    fn test_partial_placement_reorders() {
        let (storage, board, columns) = seeded();
        let a = insert(&storage, &board, &columns[0], "A");
        let b = insert(&storage, &board, &columns[0], "B");
        insert(&storage, &board, &columns[0], "C");

        // Only the two swapped rows are written; C keeps position 2
        let now = Utc::now();
        storage
            .apply(
                &board.id,
                &[],
                &[
                    TaskWrite::Place {
                        id: b.id.clone(),
                        column_id: columns[0].id.clone(),
                        position: 0,
                        updated_at: now,
                    },
                    TaskWrite::Place {
                        id: a.id.clone(),
                        column_id: columns[0].id.clone(),
                        position: 1,
                        updated_at: now,
                    },
                ],
            )
            .unwrap();

        assert_eq!(titles(&storage, &columns[0]), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_failed_batch_leaves_state_untouched() {
        let (storage, board, columns) = seeded();
        let a = insert(&storage, &board, &columns[0], "A");

        let err = storage
            .apply(
                &board.id,
                &[],
                &[
                    TaskWrite::Place {
                        id: a.id.clone(),
                        column_id: columns[1].id.clone(),
                        position: 0,
                        updated_at: Utc::now(),
                    },
                    TaskWrite::Delete(TaskId::from_string("missing")),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound { .. }));
        assert_eq!(titles(&storage, &columns[0]), vec!["A"]);
        assert!(titles(&storage, &columns[1]).is_empty());
    }

    #[test]
    fn test_failed_insert_is_undone() {
        let (storage, board, columns) = seeded();
        insert(&storage, &board, &columns[0], "A");

        let task = Task::new(columns[0].id.clone(), "B", "alice".into(), 1);
        let err = storage
            .apply(
                &board.id,
                &[],
                &[
                    TaskWrite::Insert(task.clone()),
                    TaskWrite::Delete(TaskId::from_string("missing")),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound { .. }));
        assert_eq!(titles(&storage, &columns[0]), vec!["A"]);
        assert!(storage.get_task(&task.id).unwrap().is_none());
    }

    #[test]
    fn test_stale_guard_is_conflict() {
        let (storage, board, columns) = seeded();
        let a = insert(&storage, &board, &columns[0], "A");
        let b = Task::new(columns[0].id.clone(), "B", "alice".into(), 1);

        let err = storage
            .apply(
                &board.id,
                &[ColumnGuard::Order {
                    column_id: columns[0].id.clone(),
                    tasks: Vec::new(),
                }],
                &[TaskWrite::Insert(b.clone())],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(titles(&storage, &columns[0]), vec!["A"]);

        storage
            .apply(
                &board.id,
                &[
                    ColumnGuard::Len {
                        column_id: columns[0].id.clone(),
                        len: 1,
                    },
                    ColumnGuard::Order {
                        column_id: columns[0].id.clone(),
                        tasks: vec![a.id],
                    },
                ],
                &[TaskWrite::Insert(b)],
            )
            .unwrap();
        assert_eq!(titles(&storage, &columns[0]), vec!["A", "B"]);
    }

    #[test]
    fn test_duplicate_project_board_is_conflict() {
        let (storage, _board, _columns) = seeded();
        let second = Board::new("project-1");
        let err = storage
            .create_board(&second, &second.default_columns())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let (storage, board, columns) = seeded();
        storage.fail_next_commits(1, ErrorKind::Conflict);

        let task = Task::new(columns[0].id.clone(), "A", "alice".into(), 0);
        let err = storage
            .apply(&board.id, &[], &[TaskWrite::Insert(task.clone())])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(titles(&storage, &columns[0]).is_empty());

        storage
            .apply(&board.id, &[], &[TaskWrite::Insert(task)])
            .unwrap();
        assert_eq!(titles(&storage, &columns[0]), vec!["A"]);
    }
}
