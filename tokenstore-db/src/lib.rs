// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! SQLite access layer for token databases.
//!
//! This crate wraps one token database file behind a small connection,
//! statement and result-set API: values are always bound to `?N`
//! placeholders, statements are shared handles, and transactions can be
//! taken read-only (deferred) or read-write (immediate).
//!
//! **Architecture**: This is the Relational-Access Layer underneath the
//! `tokenstore` object and token types.
//!
//! # Example
//!
//! ```ignore
//! use tokenstore_db::{Access, Connection, ConnectionOptions};
//!
//! let conn = Connection::open("/var/lib/tokens/abc", "sqlite3.db", &ConnectionOptions::default())?;
//! let txn = conn.transaction(Access::ReadWrite)?;
//! let stmt = conn.prepare("insert into object default values")?;
//! conn.execute(&stmt)?;
//! txn.commit()?;
//! ```
//!
//! Engine errors are reported through one process-wide handler (see
//! [`set_log_error_handler`]) in addition to being returned.

mod connection;
mod error;
mod log;
mod result;
mod statement;
mod transaction;

pub use connection::{Connection, ConnectionOptions, DEFAULT_BUSY_TIMEOUT};
pub use error::{Error, Result};
pub use log::{LogErrorHandler, log_error, reset_log_error_handler, set_log_error_handler};
pub use result::ResultSet;
pub use statement::Statement;
pub use transaction::{Access, Transaction};
