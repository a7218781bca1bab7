//! Error types for the task-board engine

use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

/// Result type for board operations
pub type Result<T> = std::result::Result<T, BoardError>;

/// Coarse classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced board, column, task, project or user does not exist
    NotFound,
    /// Malformed input
    Validation,
    /// Lost a race against a concurrent writer
    Conflict,
    /// The durable store failed
    Storage,
}

/// Errors that can occur in board operations
#[derive(Debug, Error)]
pub enum BoardError {
    /// Project not known to the platform
    #[error("project not found: {id}")]
    ProjectNotFound { id: String },

    /// User not known to the platform
    #[error("user not found: {id}")]
    UserNotFound { id: String },

    /// Board not found
    #[error("board not found: {id}")]
    BoardNotFound { id: String },

    /// Column not found
    #[error("column not found: {id}")]
    ColumnNotFound { id: String },

    /// Task not found
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    /// Invalid field value
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Destination column lives on a different board than the task
    #[error("task '{task}' cannot move to column '{column}' on another board")]
    CrossBoardMove { task: String, column: String },

    /// A concurrent writer won
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Per-board lock timeout
    #[error("board lock timeout after {elapsed_ms}ms")]
    LockTimeout { elapsed_ms: u64 },

    /// Generic storage failure
    #[error("storage error: {message}")]
    Storage { message: String },

    /// SQLite error that is not a conflict
    #[error("database error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),
}

impl BoardError {
    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProjectNotFound { .. }
            | Self::UserNotFound { .. }
            | Self::BoardNotFound { .. }
            | Self::ColumnNotFound { .. }
            | Self::TaskNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidValue { .. } | Self::CrossBoardMove { .. } | Self::Config(_) => {
                ErrorKind::Validation
            }
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::LockTimeout { .. } | Self::Storage { .. } | Self::Sqlite(_) | Self::Json(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// Busy/locked databases and unique-constraint violations mean another
/// writer got there first; everything else is a plain storage failure.
impl From<rusqlite::Error> for BoardError {
    fn from(error: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &error {
            let lost_race = matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) || (failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE);
            if lost_race {
                return Self::conflict(error.to_string());
            }
        }
        Self::Sqlite(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoardError::TaskNotFound {
            id: "abc123".into(),
        };
        assert_eq!(err.to_string(), "task not found: abc123");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            BoardError::ColumnNotFound { id: "c".into() }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BoardError::invalid_value("title", "must not be empty").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BoardError::CrossBoardMove {
                task: "t".into(),
                column: "c".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(BoardError::conflict("lost").kind(), ErrorKind::Conflict);
        assert_eq!(
            BoardError::LockTimeout { elapsed_ms: 10 }.kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_retryable() {
        assert!(BoardError::conflict("lost").is_retryable());
        assert!(!BoardError::TaskNotFound { id: "x".into() }.is_retryable());
        assert!(!BoardError::storage("disk full").is_retryable());
    }

    #[test]
    fn test_sqlite_classification() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert_eq!(BoardError::from(busy).kind(), ErrorKind::Conflict);

        let unique = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed: boards.project_id".into()),
        );
        assert_eq!(BoardError::from(unique).kind(), ErrorKind::Conflict);

        let other = rusqlite::Error::QueryReturnedNoRows;
        assert_eq!(BoardError::from(other).kind(), ErrorKind::Storage);
    }
}
