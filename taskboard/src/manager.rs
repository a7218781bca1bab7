//! The single gate for board mutations
//!
//! [`BoardManager`] validates requests, resolves the board an operation
//! touches, and runs the read-compute-write unit under that board's lock on
//! the blocking thread pool. Operations on different boards never contend.
//!
//! The board lock guard is moved into the blocking unit together with the
//! conflict retry loop. A caller that is cancelled or times out while waiting
//! on the result therefore never releases the lock before the storage batch
//! has committed or rolled back.

use crate::column_store::ColumnStore;
use crate::config::BoardConfig;
use crate::directory::Directory;
use crate::error::{BoardError, Result};
use crate::storage::{BoardStorage, SqliteStorage};
use crate::task_store::TaskStore;
use crate::types::{
    BoardId, BoardView, Column, ColumnId, ColumnView, ProjectId, Task, TaskId, TaskPatch, UserId,
};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, field, info, instrument, warn, Span};

/// Registry of per-board locks
#[derive(Debug, Default)]
pub struct BoardLocks {
    locks: DashMap<BoardId, Arc<Mutex<()>>>,
}

impl BoardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to a board
    pub async fn acquire(
        &self,
        board_id: &BoardId,
        timeout: std::time::Duration,
    ) -> Result<OwnedMutexGuard<()>> {
        let lock = self.locks.entry(board_id.clone()).or_default().clone();
        let start = Instant::now();
        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => Err(BoardError::LockTimeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }

    /// Number of boards that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Run a storage closure on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BoardError::storage(format!("storage task failed: {e}")))?
}

fn validate_title(title: &str, config: &BoardConfig) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BoardError::invalid_value("title", "must not be empty"));
    }
    if title.chars().count() > config.max_title_length {
        return Err(BoardError::invalid_value(
            "title",
            format!("longer than {} characters", config.max_title_length),
        ));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str, config: &BoardConfig) -> Result<()> {
    if description.chars().count() > config.max_description_length {
        return Err(BoardError::invalid_value(
            "description",
            format!("longer than {} characters", config.max_description_length),
        ));
    }
    Ok(())
}

/// Board engine entry point
#[derive(Clone)]
pub struct BoardManager {
    columns: ColumnStore,
    tasks: TaskStore,
    directory: Arc<dyn Directory>,
    locks: Arc<BoardLocks>,
    config: BoardConfig,
}

impl BoardManager {
    /// Create a manager over any storage backend
    pub fn new(
        storage: Arc<dyn BoardStorage>,
        directory: Arc<dyn Directory>,
        config: BoardConfig,
    ) -> Self {
        Self {
            columns: ColumnStore::new(storage.clone()),
            tasks: TaskStore::new(storage),
            directory,
            locks: Arc::new(BoardLocks::new()),
            config,
        }
    }

    /// Open a SQLite database file and build a manager over it
    pub fn open_sqlite(
        path: impl AsRef<Path>,
        directory: Arc<dyn Directory>,
        config: BoardConfig,
    ) -> Result<Self> {
        let storage = SqliteStorage::open(path, config.busy_timeout())?;
        Ok(Self::new(Arc::new(storage), directory, config))
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    async fn require_user(&self, id: &UserId) -> Result<()> {
        if self.directory.user_exists(id).await? {
            Ok(())
        } else {
            Err(BoardError::UserNotFound { id: id.to_string() })
        }
    }

    /// Board that currently owns a task
    async fn board_of_task(&self, id: &TaskId) -> Result<BoardId> {
        let tasks = self.tasks.clone();
        let columns = self.columns.clone();
        let id = id.clone();
        blocking(move || {
            let task = tasks.get_task(&id)?;
            Ok(columns.get_column(&task.column_id)?.board_id)
        })
        .await
    }

    /// Run `unit` while holding the board's lock, retrying on conflict.
    ///
    /// `unit` must re-read everything it needs so a retry observes the
    /// state left by the conflicting writer.
    async fn serialized<T, F>(&self, board_id: &BoardId, unit: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn() -> Result<T> + Send + 'static,
    {
        let guard = self
            .locks
            .acquire(board_id, self.config.lock_timeout())
            .await?;
        let retries = self.config.conflict_retries;
        let span = Span::current();
        let board_id = board_id.clone();

        blocking(move || {
            let _guard = guard;
            let mut attempt = 0;
            loop {
                span.record("attempt", attempt);
                match unit() {
                    Err(err) if err.is_retryable() && attempt < retries => {
                        attempt += 1;
                        warn!(parent: &span, %board_id, attempt, error = %err, "conflicting write, retrying");
                    }
                    result => return result,
                }
            }
        })
        .await
    }

    /// Return the project's board with every column and its ordered tasks,
    /// creating and seeding the board on first access
    #[instrument(skip(self), fields(attempt = field::Empty))]
    pub async fn get_or_create_board_view(&self, project_id: &ProjectId) -> Result<BoardView> {
        if !self.directory.project_exists(project_id).await? {
            return Err(BoardError::ProjectNotFound {
                id: project_id.to_string(),
            });
        }

        let columns = self.columns.clone();
        let project = project_id.clone();
        let board = blocking(move || columns.get_or_create_board(&project)).await?;

        let columns = self.columns.clone();
        let tasks = self.tasks.clone();
        let project = project_id.clone();
        let board_id = board.id.clone();
        let view = self
            .serialized(&board.id, move || {
                let board = columns
                    .find_board(&project)?
                    .ok_or_else(|| BoardError::BoardNotFound {
                        id: board_id.to_string(),
                    })?;
                let column_views = columns
                    .list_columns(&board.id)?
                    .into_iter()
                    .map(|column| {
                        let tasks = tasks.list_tasks_by_column(&column.id)?;
                        Ok(ColumnView { column, tasks })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(BoardView {
                    board,
                    columns: column_views,
                })
            })
            .await?;

        debug!(board_id = %view.board.id, tasks = view.task_count(), "loaded board view");
        Ok(view)
    }

    /// Append a task to the tail of a column
    #[instrument(skip(self, description), fields(attempt = field::Empty))]
    pub async fn create_task(
        &self,
        column_id: &ColumnId,
        title: &str,
        description: Option<&str>,
        creator: &UserId,
    ) -> Result<Task> {
        let title = validate_title(title, &self.config)?;
        if let Some(description) = description {
            validate_description(description, &self.config)?;
        }
        self.require_user(creator).await?;
        let column = self.get_column(column_id).await?;

        let tasks = self.tasks.clone();
        let column_id = column.id.clone();
        let description = description.map(str::to_string);
        let creator = creator.clone();
        let task = self
            .serialized(&column.board_id, move || {
                tasks.create_task(&column_id, &title, description.as_deref(), &creator)
            })
            .await?;

        info!(task_id = %task.id, column_id = %task.column_id, position = task.position, "task created");
        Ok(task)
    }

    /// Trim and bound-check the fields a patch sets
    fn validated_patch(&self, patch: &TaskPatch) -> Result<TaskPatch> {
        let mut patch = patch.clone();
        if let Some(title) = &patch.title {
            patch.title = Some(validate_title(title, &self.config)?);
        }
        if let Some(Some(description)) = &patch.description {
            validate_description(description, &self.config)?;
        }
        Ok(patch)
    }

    /// Resolve a destination column and reject one on another board
    async fn destination_on(
        &self,
        board_id: &BoardId,
        task: &TaskId,
        column: &ColumnId,
    ) -> Result<Column> {
        let destination = self.get_column(column).await?;
        if &destination.board_id != board_id {
            return Err(BoardError::CrossBoardMove {
                task: task.to_string(),
                column: destination.id.to_string(),
            });
        }
        Ok(destination)
    }

    /// Change a task's title and/or description
    #[instrument(skip(self), fields(attempt = field::Empty))]
    pub async fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        actor: &UserId,
    ) -> Result<Task> {
        let patch = self.validated_patch(patch)?;
        self.require_user(actor).await?;

        if patch.is_empty() {
            return self.get_task(id).await;
        }

        let board_id = self.board_of_task(id).await?;
        let tasks = self.tasks.clone();
        let task_id = id.clone();
        let task = self
            .serialized(&board_id, move || tasks.update_task(&task_id, &patch))
            .await?;

        info!(task_id = %task.id, %actor, "task updated");
        Ok(task)
    }

    /// Change a task's title and/or description and reposition it, as one
    /// unit: a rejected move leaves the metadata untouched too.
    ///
    /// Without a destination the task stays in its current column.
    #[instrument(skip(self), fields(attempt = field::Empty))]
    pub async fn update_and_move_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        destination: Option<&ColumnId>,
        target_index: Option<usize>,
        actor: &UserId,
    ) -> Result<Task> {
        let patch = self.validated_patch(patch)?;
        self.require_user(actor).await?;
        let board_id = self.board_of_task(id).await?;
        let destination = match destination {
            Some(column) => Some(self.destination_on(&board_id, id, column).await?),
            None => None,
        };

        let tasks = self.tasks.clone();
        let task_id = id.clone();
        let task = self
            .serialized(&board_id, move || {
                tasks.update_and_move_task(
                    &task_id,
                    &patch,
                    destination.as_ref(),
                    target_index,
                )
            })
            .await?;

        info!(task_id = %task.id, column_id = %task.column_id, position = task.position, %actor, "task updated and moved");
        Ok(task)
    }

    /// Move a task to `target_index` of a column on the same board.
    ///
    /// Without a target index the task goes to the tail. Indexes past the
    /// tail clamp to it.
    #[instrument(skip(self), fields(attempt = field::Empty))]
    pub async fn move_task(
        &self,
        id: &TaskId,
        destination: &ColumnId,
        target_index: Option<usize>,
        actor: &UserId,
    ) -> Result<Task> {
        self.require_user(actor).await?;
        let board_id = self.board_of_task(id).await?;
        let destination = self.destination_on(&board_id, id, destination).await?;

        let tasks = self.tasks.clone();
        let task_id = id.clone();
        let task = self
            .serialized(&board_id, move || {
                tasks.move_task(&task_id, &destination, target_index)
            })
            .await?;

        info!(task_id = %task.id, column_id = %task.column_id, position = task.position, %actor, "task moved");
        Ok(task)
    }

    /// Delete a task and compact its column
    #[instrument(skip(self), fields(attempt = field::Empty))]
    pub async fn delete_task(&self, id: &TaskId, actor: &UserId) -> Result<()> {
        self.require_user(actor).await?;
        let board_id = self.board_of_task(id).await?;

        let tasks = self.tasks.clone();
        let task_id = id.clone();
        let task = self
            .serialized(&board_id, move || tasks.delete_task(&task_id))
            .await?;

        info!(task_id = %task.id, column_id = %task.column_id, %actor, "task deleted");
        Ok(())
    }

    /// Read a task
    pub async fn get_task(&self, id: &TaskId) -> Result<Task> {
        let tasks = self.tasks.clone();
        let id = id.clone();
        blocking(move || tasks.get_task(&id)).await
    }

    /// Read a column
    pub async fn get_column(&self, id: &ColumnId) -> Result<Column> {
        let columns = self.columns.clone();
        let id = id.clone();
        blocking(move || columns.get_column(&id)).await
    }

    /// Tasks of a column ordered by position
    pub async fn list_tasks(&self, column_id: &ColumnId) -> Result<Vec<Task>> {
        let tasks = self.tasks.clone();
        let column_id = column_id.clone();
        blocking(move || tasks.list_tasks_by_column(&column_id)).await
    }
}
