//! Task-board engine for project boards
//!
//! Every project owns exactly one board. A board is created lazily on first
//! access and seeded with the columns "To-Do", "In Progress" and "Completed".
//! Tasks live in exactly one column at a time and carry a zero-based position
//! that ranks them within it.
//!
//! ## Overview
//!
//! - **Contiguous ordering** - after every create, move and delete, each
//!   column's task positions are exactly `0..n` with no gaps or duplicates
//! - **One gate for writes** - all mutations go through [`BoardManager`], which
//!   serializes them per board and commits each renumbering as one atomic batch
//! - **Pluggable storage** - [`storage::SqliteStorage`] for durable use,
//!   [`storage::MemoryStorage`] for tests and embedding
//! - **Activity log** - mutating commands produce a [`LogEntry`] recorded by
//!   the [`OperationProcessor`]
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskboard::{
//!     board::GetBoard, task::{AddTask, MoveTask}, BoardConfig, BoardManager,
//!     OperationProcessor, StaticDirectory,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Arc::new(StaticDirectory::new().with_project("p1").with_user("alice"));
//! let manager = BoardManager::open_sqlite("board.db", directory, BoardConfig::load(None)?)?;
//! let processor = OperationProcessor::with_actor("alice");
//!
//! let board = processor.process(&GetBoard::new("p1"), &manager).await?;
//! let todo = board["columns"][0]["id"].as_str().unwrap_or_default().to_string();
//!
//! let task = processor
//!     .process(&AddTask::new(todo.as_str(), "Write docs", "alice"), &manager)
//!     .await?;
//! let id = task["id"].as_str().unwrap_or_default();
//!
//! processor
//!     .process(&MoveTask::to_column(id, todo.as_str(), "alice").at(0), &manager)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! board::*, task::*     command structs, one per endpoint
//!   └── BoardManager    validation, per-board lock, conflict retry
//!         ├── ColumnStore   board lookup and race-safe seeding
//!         └── TaskStore     create / update / move / delete via sequence
//!               └── BoardStorage   atomic row batches (SQLite or memory)
//! ```

mod column_store;
mod config;
mod directory;
mod error;
mod manager;
pub mod operation;
pub mod sequence;
pub mod storage;
mod task_store;
pub mod types;

// Command modules
pub mod board;
pub mod task;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use column_store::ColumnStore;
pub use config::BoardConfig;
pub use directory::{Directory, StaticDirectory};
pub use error::{BoardError, ErrorKind, Result};
pub use manager::{BoardLocks, BoardManager};
pub use operation::{Execute, ExecutionResult, LogEntry, Operation, OperationProcessor};
pub use task_store::TaskStore;

// Re-export commonly used types
pub use types::{
    Board, BoardId, BoardView, Column, ColumnId, ColumnView, ProjectId, Task, TaskId, TaskPatch,
    UserId,
};
