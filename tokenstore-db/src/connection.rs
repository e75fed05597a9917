// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Database connection management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::OpenFlags;
use rusqlite::config::DbConfig;
use rusqlite::types::{Value, ValueRef};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::log::log_error;
use crate::result::ResultSet;
use crate::statement::Statement;
use crate::transaction::{Access, Transaction};

/// Default time a statement waits on a lock held by another connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings applied when a connection is opened.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// How long to wait on SQLite file locks before failing with busy.
    pub busy_timeout: Duration,
    /// Log every statement at `trace` level.
    pub trace: bool,
    /// Do not report busy/locked errors through the error handler.
    pub quiet_busy: bool,
    /// Name used in log messages for this connection.
    pub label: String,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            trace: false,
            quiet_busy: false,
            label: String::new(),
        }
    }
}

/// One open token database.
pub struct Connection {
    conn: Option<rusqlite::Connection>,
    path: PathBuf,
    label: String,
    trace: bool,
    quiet_busy: bool,
}

impl Connection {
    /// Open (creating if absent) the database `dir/name` for reading and writing.
    pub fn open<P: AsRef<Path>>(dir: P, name: &str, options: &ConnectionOptions) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            log_error("Connection::open: database directory is empty");
            return Err(Error::EmptyParameter("dir"));
        }
        if name.is_empty() {
            log_error("Connection::open: database name is empty");
            return Err(Error::EmptyParameter("name"));
        }
        let path = dir.join(name);

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = rusqlite::Connection::open_with_flags(&path, flags).map_err(|e| {
            log_error(format_args!(
                "Connection::open: cannot open '{}': {e}",
                path.display()
            ));
            Error::DatabaseOpen {
                path: path.clone(),
                source: e,
            }
        })?;

        let db = Self {
            conn: Some(conn),
            path,
            label: options.label.clone(),
            trace: options.trace,
            quiet_busy: options.quiet_busy,
        };
        db.enable_foreign_keys()?;
        db.set_busy_timeout(options.busy_timeout)?;

        debug!(
            "Opened token database at {} ({})",
            db.path.display(),
            db.label
        );
        Ok(db)
    }

    fn enable_foreign_keys(&self) -> Result<()> {
        let conn = self.raw()?;
        let enabled = conn
            .set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)
            .map_err(|e| self.fail("Connection::open", e))?;
        if !enabled {
            log_error("Connection::open: foreign key support not enabled");
            return Err(Error::ForeignKeysDisabled(self.path.clone()));
        }
        Ok(())
    }

    /// Full path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn raw(&self) -> Result<&rusqlite::Connection> {
        self.conn.as_ref().ok_or(Error::Closed)
    }

    /// Report an engine error and convert it.
    fn fail(&self, caller: &str, e: rusqlite::Error) -> Error {
        let err = Error::Sqlite(e);
        if !(self.quiet_busy && err.is_busy()) {
            log_error(format_args!("{caller}: {err}"));
        }
        err
    }

    fn trace_sql(&self, sql: &str) {
        if self.trace {
            trace!(connection = %self.label, "{sql}");
        }
    }

    /// Compile `sql`. Values must be passed as `?N` placeholders and bound on
    /// the returned statement.
    pub fn prepare(&self, sql: &str) -> Result<Statement> {
        let conn = self.raw()?;
        let stmt = conn
            .prepare_cached(sql)
            .map_err(|e| self.fail("Connection::prepare", e))?;
        Ok(Statement::new(sql.to_owned(), stmt.parameter_count()))
    }

    /// Run a query and collect its rows.
    ///
    /// The returned result set is positioned on the first row, and is invalid
    /// when the query produced none.
    pub fn perform(&self, statement: &Statement) -> Result<ResultSet> {
        let Some(inner) = statement.inner() else {
            log_error("Connection::perform: statement is not valid");
            return Err(Error::InvalidStatement);
        };
        let conn = self.raw()?;
        self.trace_sql(&inner.sql);

        let mut stmt = conn
            .prepare_cached(&inner.sql)
            .map_err(|e| self.fail("Connection::perform", e))?;
        let mut state = inner.state_mut();
        for (i, value) in state.params.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, value)
                .map_err(|e| self.fail("Connection::perform", e))?;
        }

        let columns = stmt.column_count();
        let mut collected = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next().map_err(|e| self.fail("Connection::perform", e))? {
            let mut values = Vec::with_capacity(columns);
            for idx in 0..columns {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| self.fail("Connection::perform", e))?;
                values.push(owned_value(value));
            }
            collected.push(values);
        }

        state.executed = true;
        state.cursor = 0;
        state.rows = collected;
        if state.rows.is_empty() {
            return Ok(ResultSet::default());
        }
        drop(state);
        Ok(ResultSet::new(statement.clone()))
    }

    /// Run a statement that is not expected to produce rows.
    pub fn execute(&self, statement: &Statement) -> Result<()> {
        let Some(inner) = statement.inner() else {
            log_error("Connection::execute: statement is not valid");
            return Err(Error::InvalidStatement);
        };
        let conn = self.raw()?;
        self.trace_sql(&inner.sql);

        let mut stmt = conn
            .prepare_cached(&inner.sql)
            .map_err(|e| self.fail("Connection::execute", e))?;
        let mut state = inner.state_mut();
        for (i, value) in state.params.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, value)
                .map_err(|e| self.fail("Connection::execute", e))?;
        }

        match stmt.raw_execute() {
            Ok(_) => {}
            Err(rusqlite::Error::ExecuteReturnedResults) => {
                log_error(format_args!(
                    "Connection::execute: statement produced a row: {}",
                    inner.sql
                ));
                return Err(Error::UnexpectedRow);
            }
            Err(e) => return Err(self.fail("Connection::execute", e)),
        }
        state.executed = true;
        state.rows.clear();
        state.cursor = 0;
        Ok(())
    }

    /// Run one or more SQL statements without parameters.
    pub(crate) fn execute_batch(&self, caller: &str, sql: &str) -> Result<()> {
        let conn = self.raw()?;
        self.trace_sql(sql);
        conn.execute_batch(sql).map_err(|e| self.fail(caller, e))
    }

    /// Whether a table named `name` exists in the database.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let statement =
            self.prepare("select count(*) from sqlite_master where type='table' and name=?1")?;
        statement.bind_text(1, name)?;
        let result = self.perform(&statement)?;
        Ok(result.get_int64(1) > 0)
    }

    /// Row id of the most recent successful insert on this connection.
    pub fn last_insert_row_id(&self) -> Result<i64> {
        Ok(self.raw()?.last_insert_rowid())
    }

    /// Whether a transaction is currently open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| !c.is_autocommit())
    }

    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.raw()?
            .busy_timeout(timeout)
            .map_err(|e| self.fail("Connection::set_busy_timeout", e))
    }

    /// Start a deferred transaction; locks are taken as statements need them.
    pub fn begin_transaction_ro(&self) -> Result<()> {
        self.execute_batch("Connection::begin_transaction_ro", "begin")
    }

    /// Start a transaction holding the write lock from the outset.
    pub fn begin_transaction_rw(&self) -> Result<()> {
        self.execute_batch("Connection::begin_transaction_rw", "begin immediate")
    }

    pub fn commit_transaction(&self) -> Result<()> {
        self.execute_batch("Connection::commit_transaction", "commit")
    }

    pub fn rollback_transaction(&self) -> Result<()> {
        self.execute_batch("Connection::rollback_transaction", "rollback")
    }

    /// Begin a transaction whose guard rolls back unless committed.
    pub fn transaction(&self, access: Access) -> Result<Transaction<'_>> {
        Transaction::begin(self, access)
    }

    /// Run `f` inside the savepoint `name`, releasing it on success and
    /// rolling back to it on failure.
    ///
    /// `name` must be a plain SQL identifier.
    pub fn with_savepoint<T, E, F>(&self, name: &str, f: F) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.execute_batch("Connection::with_savepoint", &format!("savepoint {name}"))?;
        match f() {
            Ok(value) => {
                self.execute_batch("Connection::with_savepoint", &format!("release {name}"))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.execute_batch(
                    "Connection::with_savepoint",
                    &format!("rollback to {name}; release {name}"),
                ) {
                    warn!(
                        "Failed to roll back savepoint {name} on {}: {rollback}",
                        self.path.display()
                    );
                }
                Err(e)
            }
        }
    }

    /// Close the connection. Any later operation fails with [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        match conn.close() {
            Ok(()) => {
                debug!("Closed token database at {}", self.path.display());
                Ok(())
            }
            Err((conn, e)) => {
                self.conn = Some(conn);
                Err(self.fail("Connection::close", e))
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

/// Copy a column value out of the engine.
///
/// TEXT that is not valid UTF-8 is kept as raw bytes instead of failing the
/// whole query.
fn owned_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_owned()),
            Err(_) => Value::Blob(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("label", &self.label)
            .field("open", &self.is_open())
            .finish()
    }
}
