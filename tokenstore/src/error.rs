// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Error types for objects, tokens and the store catalog.

use std::path::PathBuf;

use thiserror::Error;

use crate::attribute::AttributeType;
use crate::object::ObjectId;

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Token database error: {0}")]
    Db(#[from] tokenstore_db::Error),

    /// The object has no database connection
    #[error("Object is not connected to a database")]
    NotConnected,

    /// The object was never inserted or found
    #[error("Object is not valid")]
    InvalidObject,

    #[error("Object id 0 is not a valid object id")]
    InvalidObjectId,

    #[error("Object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("A transaction is already in progress")]
    TransactionInProgress,

    #[error("No transaction in progress")]
    NoTransaction,

    #[error("Token database already exists at '{0}'")]
    TokenExists(PathBuf),

    #[error("No token database at '{0}'")]
    TokenNotFound(PathBuf),

    /// The token metadata object did not get the expected id
    #[error("Token at '{path}' is corrupt: metadata object has id {id}")]
    TokenCorrupt { path: PathBuf, id: ObjectId },

    /// The token was invalidated or cleared
    #[error("Token is not valid")]
    InvalidToken,

    #[error("Token attribute {0:#x} is missing")]
    MissingAttribute(AttributeType),

    #[error("Token index {0} out of range")]
    TokenIndex(usize),

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Random number generator failed: {0}")]
    Random(getrandom::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

/// Helper trait for adding context to IO errors
pub trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::io(f(), e))
    }
}
