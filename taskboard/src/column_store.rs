//! Board lookup, lazy creation and column ordering

use crate::error::{BoardError, ErrorKind, Result};
use crate::storage::BoardStorage;
use crate::types::{Board, BoardId, Column, ColumnId, ProjectId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the columns of every board
#[derive(Clone)]
pub struct ColumnStore {
    storage: Arc<dyn BoardStorage>,
}

impl ColumnStore {
    pub fn new(storage: Arc<dyn BoardStorage>) -> Self {
        Self { storage }
    }

    /// The board of a project, if one has been created
    pub fn find_board(&self, project_id: &ProjectId) -> Result<Option<Board>> {
        self.storage.find_board_by_project(project_id)
    }

    /// Return the project's board, creating and seeding it on first access.
    ///
    /// Creation inserts the board and its default columns as one unit. When
    /// two callers race, the storage uniqueness on project rejects the loser,
    /// which then re-reads and returns the winner's board.
    pub fn get_or_create_board(&self, project_id: &ProjectId) -> Result<Board> {
        if let Some(board) = self.storage.find_board_by_project(project_id)? {
            return Ok(board);
        }

        let board = Board::new(project_id.clone());
        let columns = board.default_columns();
        match self.storage.create_board(&board, &columns) {
            Ok(()) => {
                info!(%project_id, board_id = %board.id, "created board with default columns");
                Ok(board)
            }
            Err(err) if err.kind() == ErrorKind::Conflict => {
                warn!(%project_id, error = %err, "lost board creation race, using existing board");
                self.storage
                    .find_board_by_project(project_id)?
                    .ok_or_else(|| {
                        BoardError::conflict(format!(
                            "board for project '{project_id}' could not be created or found"
                        ))
                    })
            }
            Err(err) => Err(err),
        }
    }

    /// Columns of a board ordered by position
    pub fn list_columns(&self, board_id: &BoardId) -> Result<Vec<Column>> {
        if self.storage.get_board(board_id)?.is_none() {
            return Err(BoardError::BoardNotFound {
                id: board_id.to_string(),
            });
        }
        let columns = self.storage.list_columns(board_id)?;
        debug!(%board_id, count = columns.len(), "listed columns");
        Ok(columns)
    }

    /// Read a column
    pub fn get_column(&self, id: &ColumnId) -> Result<Column> {
        self.storage
            .get_column(id)?
            .ok_or_else(|| BoardError::ColumnNotFound { id: id.to_string() })
    }
}
