// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Error types for token database access.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for token database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a token database.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open database with context
    #[error("Failed to open database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A required connection parameter was empty
    #[error("Connection parameter '{0}' is empty")]
    EmptyParameter(&'static str),

    /// SQLite did not confirm foreign key enforcement
    #[error("Foreign key support could not be enabled for '{0}'")]
    ForeignKeysDisabled(PathBuf),

    /// The connection was closed
    #[error("Database connection is closed")]
    Closed,

    /// Operation on a statement that never compiled
    #[error("Statement is not valid")]
    InvalidStatement,

    /// Binding a parameter on a statement that ran and was not reset
    #[error("Statement must be reset before binding new values")]
    StatementNotReset,

    /// Parameter index outside of the statement's placeholders
    #[error("Parameter index {index} out of range (statement has {count} parameters)")]
    ParameterIndex { index: usize, count: usize },

    /// A statement run through `execute` produced a row
    #[error("Statement produced a row where none was expected")]
    UnexpectedRow,

    /// A transaction is already open on the connection
    #[error("A transaction is already in progress")]
    TransactionInProgress,

    /// Commit or rollback without an open transaction
    #[error("No transaction in progress")]
    NoTransaction,
}

impl Error {
    /// Whether this error is lock contention (`SQLITE_BUSY` or `SQLITE_LOCKED`).
    pub fn is_busy(&self) -> bool {
        let source = match self {
            Error::Sqlite(e) | Error::DatabaseOpen { source: e, .. } => e,
            _ => return false,
        };
        matches!(
            source.sqlite_error_code(),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}
