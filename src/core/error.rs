//! Error types for the changes dumper.

use std::io;
use thiserror::Error;

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, DumpError>;

/// All errors that can occur while dumping or initializing a database.
#[derive(Error, Debug)]
pub enum DumpError {
    /// Table name cannot be used as an SQL identifier.
    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    /// Database error.
    #[error("{0}")]
    Db(#[from] rusqlite::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DumpError {
    /// Short stable code, used in log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            DumpError::InvalidTableName(_) => "InvalidTableName",
            DumpError::Db(_) => "DatabaseError",
            DumpError::Io(_) => "IoError",
        }
    }
}
