//! Error types for schedule-sync

use std::fmt;
use thiserror::Error;

/// Error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backing database errors (SQLite)
    Database,
    /// Row index out of range or row missing
    RowNotFound,
    /// Column not declared by the row store
    UnknownColumn,
    /// Entry id already present in the tree or the row store
    DuplicateId,
    /// Parent id resolves to nothing
    UnknownParent,
    /// Configuration errors
    Config,
    /// I/O errors
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::RowNotFound => "row_not_found",
            ErrorKind::UnknownColumn => "unknown_column",
            ErrorKind::DuplicateId => "duplicate_id",
            ErrorKind::UnknownParent => "unknown_parent",
            ErrorKind::Config => "config",
            ErrorKind::IO => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Crate error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct SyncError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn row_not_found(table: &str, index: usize) -> Self {
        Self::new(
            ErrorKind::RowNotFound,
            format!("Row {} not found in table '{}'", index, table),
        )
    }

    pub fn unknown_column(table: &str, column: &str) -> Self {
        Self::new(
            ErrorKind::UnknownColumn,
            format!("Column '{}' not declared by table '{}'", column, table),
        )
    }

    pub fn duplicate_id(id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::DuplicateId, format!("Duplicate entry id: {}", id))
    }

    pub fn unknown_parent(id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::UnknownParent, format!("Unknown parent id: {}", id))
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::database(format!("SQLite error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::new(ErrorKind::IO, format!("IO error: {}", err)).with_source(err)
    }
}

impl From<crate::config::ConfigError> for SyncError {
    fn from(err: crate::config::ConfigError) -> Self {
        SyncError::config(err.to_string()).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;
