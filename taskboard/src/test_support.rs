//! Fixtures for tests and benches
//!
//! Compiled for this crate's own tests and, through the `test-support`
//! feature, for integration tests and benches.

use crate::config::BoardConfig;
use crate::directory::StaticDirectory;
use crate::manager::BoardManager;
use crate::sequence::is_contiguous;
use crate::storage::{MemoryStorage, SqliteStorage};
use crate::types::{BoardView, Column, ColumnId, Task};
use std::path::Path;
use std::sync::Arc;

pub const PROJECT: &str = "project-1";
pub const OTHER_PROJECT: &str = "project-2";
pub const USER: &str = "alice";
pub const OTHER_USER: &str = "bob";

/// A directory that knows both projects and both users
pub fn directory() -> Arc<StaticDirectory> {
    Arc::new(
        StaticDirectory::new()
            .with_project(PROJECT)
            .with_project(OTHER_PROJECT)
            .with_user(USER)
            .with_user(OTHER_USER),
    )
}

/// Manager over in-memory storage, with the storage handle for fault injection
pub fn memory_manager() -> (Arc<MemoryStorage>, BoardManager) {
    let storage = Arc::new(MemoryStorage::new());
    let manager = BoardManager::new(storage.clone(), directory(), BoardConfig::default());
    (storage, manager)
}

/// Manager over a SQLite file
pub fn sqlite_manager(path: &Path) -> BoardManager {
    let config = BoardConfig::default();
    let storage = SqliteStorage::open(path, config.busy_timeout()).expect("open sqlite storage");
    BoardManager::new(Arc::new(storage), directory(), config)
}

/// The board of [`PROJECT`], created on first call
pub async fn board(manager: &BoardManager) -> BoardView {
    manager
        .get_or_create_board_view(&PROJECT.into())
        .await
        .expect("board view")
}

/// Column `index` of the board of [`PROJECT`]
pub async fn column(manager: &BoardManager, index: usize) -> Column {
    board(manager).await.columns[index].column.clone()
}

/// Create tasks with the given titles, in order, as [`USER`]
pub async fn add_tasks(manager: &BoardManager, column: &ColumnId, titles: &[&str]) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(titles.len());
    for title in titles {
        tasks.push(
            manager
                .create_task(column, title, None, &USER.into())
                .await
                .expect("create task"),
        );
    }
    tasks
}

/// Titles of a column in position order
pub async fn titles(manager: &BoardManager, column: &ColumnId) -> Vec<String> {
    manager
        .list_tasks(column)
        .await
        .expect("list tasks")
        .into_iter()
        .map(|t| t.title)
        .collect()
}

/// Positions of a column in stored order
pub async fn positions(manager: &BoardManager, column: &ColumnId) -> Vec<usize> {
    manager
        .list_tasks(column)
        .await
        .expect("list tasks")
        .into_iter()
        .map(|t| t.position)
        .collect()
}

/// Panic unless every column of the view holds positions `0..n`
pub fn assert_contiguous(view: &BoardView) {
    for column in &view.columns {
        assert!(
            is_contiguous(column.tasks.iter().map(|t| t.position)),
            "column '{}' is not contiguous: {:?}",
            column.column.name,
            column.tasks.iter().map(|t| t.position).collect::<Vec<_>>()
        );
    }
}
