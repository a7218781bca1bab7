//! Core types for the task-board engine

mod board;
mod ids;
mod task;

// Re-export all types
pub use board::{Board, BoardView, Column, ColumnView, DEFAULT_COLUMNS};
pub use ids::{BoardId, ColumnId, ProjectId, TaskId, UserId};
pub use task::{Task, TaskPatch};
