// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Shared prepared statements.
//!
//! A [`Statement`] is a cheap handle: clones, and every [`ResultSet`] produced
//! from it, share the SQL text, the bound parameters, the rows of the last
//! execution and the cursor. The shared state is freed when the last handle
//! goes away, so a result set stays readable after the statement value that
//! produced it has been dropped.
//!
//! The compiled form lives in the connection's statement cache and is looked
//! up again on every execution; it may have been evicted and recompiled in
//! between.
//!
//! [`ResultSet`]: crate::ResultSet

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use rusqlite::types::Value;

use crate::error::{Error, Result};
use crate::log::log_error;

pub(crate) struct StatementInner {
    pub(crate) sql: String,
    pub(crate) param_count: usize,
    state: RefCell<StatementState>,
}

pub(crate) struct StatementState {
    pub(crate) params: Vec<Value>,
    pub(crate) executed: bool,
    pub(crate) rows: Vec<Vec<Value>>,
    pub(crate) cursor: usize,
}

impl StatementState {
    fn new(param_count: usize) -> Self {
        Self {
            params: vec![Value::Null; param_count],
            executed: false,
            rows: Vec::new(),
            cursor: 0,
        }
    }
}

impl StatementInner {
    pub(crate) fn state(&self) -> Ref<'_, StatementState> {
        self.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, StatementState> {
        self.state.borrow_mut()
    }
}

/// An SQL statement with `?N` placeholders, checked by the engine when prepared.
///
/// The default value is an invalid statement, which is what a failed
/// [`Connection::prepare`](crate::Connection::prepare) would have produced.
#[derive(Clone, Default)]
pub struct Statement {
    inner: Option<Rc<StatementInner>>,
}

impl Statement {
    pub(crate) fn new(sql: String, param_count: usize) -> Self {
        Self {
            inner: Some(Rc::new(StatementInner {
                sql,
                param_count,
                state: RefCell::new(StatementState::new(param_count)),
            })),
        }
    }

    pub(crate) fn inner(&self) -> Option<&Rc<StatementInner>> {
        self.inner.as_ref()
    }

    /// Whether this handle refers to a prepared statement.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Number of handles (statements and result sets) sharing this statement.
    pub fn refcount(&self) -> usize {
        self.inner.as_ref().map_or(0, Rc::strong_count)
    }

    /// The SQL text this statement was compiled from.
    pub fn sql(&self) -> Option<&str> {
        self.inner.as_deref().map(|inner| inner.sql.as_str())
    }

    /// Number of `?` placeholders.
    pub fn parameter_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.param_count)
    }

    pub fn bind_int(&self, index: usize, value: i32) -> Result<()> {
        self.bind("bind_int", index, Value::Integer(value.into()))
    }

    pub fn bind_int64(&self, index: usize, value: i64) -> Result<()> {
        self.bind("bind_int64", index, Value::Integer(value))
    }

    pub fn bind_double(&self, index: usize, value: f64) -> Result<()> {
        self.bind("bind_double", index, Value::Real(value))
    }

    pub fn bind_text(&self, index: usize, value: &str) -> Result<()> {
        self.bind("bind_text", index, Value::Text(value.to_owned()))
    }

    /// Bind an opaque byte string; embedded zero bytes are preserved.
    pub fn bind_blob(&self, index: usize, value: &[u8]) -> Result<()> {
        self.bind("bind_blob", index, Value::Blob(value.to_vec()))
    }

    pub fn bind_null(&self, index: usize) -> Result<()> {
        self.bind("bind_null", index, Value::Null)
    }

    fn bind(&self, caller: &str, index: usize, value: Value) -> Result<()> {
        let Some(inner) = &self.inner else {
            log_error(format_args!("Statement::{caller}: statement is not valid"));
            return Err(Error::InvalidStatement);
        };
        let mut state = inner.state_mut();
        if state.executed {
            log_error(format_args!(
                "Statement::{caller}: statement must be reset before binding"
            ));
            return Err(Error::StatementNotReset);
        }
        if index == 0 || index > inner.param_count {
            log_error(format_args!(
                "Statement::{caller}: parameter index {index} out of range"
            ));
            return Err(Error::ParameterIndex {
                index,
                count: inner.param_count,
            });
        }
        state.params[index - 1] = value;
        Ok(())
    }

    /// Clear bound parameters and the previous execution so the statement
    /// can be bound and run again.
    pub fn reset(&self) -> Result<()> {
        let Some(inner) = &self.inner else {
            log_error("Statement::reset: statement is not valid");
            return Err(Error::InvalidStatement);
        };
        *inner.state_mut() = StatementState::new(inner.param_count);
        Ok(())
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql())
            .field("refcount", &self.refcount())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_statement_is_invalid() {
        let statement = Statement::default();
        assert!(!statement.is_valid());
        assert_eq!(statement.refcount(), 0);
        assert!(matches!(
            statement.bind_int(1, 1),
            Err(Error::InvalidStatement)
        ));
        assert!(matches!(statement.reset(), Err(Error::InvalidStatement)));
    }

    #[test]
    fn test_copies_share_refcount() {
        let statement = Statement::new("select ?1".into(), 1);
        {
            let copy1 = statement.clone();
            let copy2 = statement.clone();
            assert_eq!(statement.refcount(), 3);
            assert!(copy1.is_valid());
            assert!(copy2.is_valid());
        }
        assert_eq!(statement.refcount(), 1);
    }

    #[test]
    fn test_parameter_index_is_checked() {
        let statement = Statement::new("select ?1, ?2".into(), 2);
        assert!(statement.bind_int64(2, 7).is_ok());
        assert!(matches!(
            statement.bind_int64(0, 7),
            Err(Error::ParameterIndex { index: 0, count: 2 })
        ));
        assert!(matches!(
            statement.bind_text(3, "x"),
            Err(Error::ParameterIndex { index: 3, count: 2 })
        ));
    }

    #[test]
    fn test_bind_after_execution_requires_reset() {
        let statement = Statement::new("select ?1".into(), 1);
        statement.inner().unwrap().state_mut().executed = true;
        assert!(matches!(
            statement.bind_blob(1, b"\0\x01"),
            Err(Error::StatementNotReset)
        ));
        statement.reset().unwrap();
        assert!(statement.bind_blob(1, b"\0\x01").is_ok());
    }
}
