// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Row access for executed queries.

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Value;

use crate::log::log_error;
use crate::statement::Statement;

/// The rows produced by [`Connection::perform`](crate::Connection::perform).
///
/// A result set shares its statement with every other handle cloned from the
/// same [`Statement`]. It is positioned on the first row when returned, and is
/// invalid when the query produced no rows at all.
///
/// Field indices are 1-based. Reading from an invalid result set, or with an
/// index that is zero or past the last column, reports through the error
/// handler and yields a zero, empty or sentinel value.
#[derive(Clone, Default, Debug)]
pub struct ResultSet {
    statement: Statement,
}

impl ResultSet {
    pub(crate) fn new(statement: Statement) -> Self {
        Self { statement }
    }

    pub fn is_valid(&self) -> bool {
        self.statement.is_valid()
    }

    /// Number of handles sharing the underlying statement.
    pub fn refcount(&self) -> usize {
        self.statement.refcount()
    }

    /// Advance to the next row. Returns `false` past the last row.
    pub fn next_row(&self) -> bool {
        let Some(inner) = self.statement.inner() else {
            log_error("ResultSet::next_row: statement is not valid");
            return false;
        };
        let mut state = inner.state_mut();
        if state.cursor < state.rows.len() {
            state.cursor += 1;
        }
        state.cursor < state.rows.len()
    }

    /// Rewind to the first row. Returns `false` when there are no rows.
    pub fn first_row(&self) -> bool {
        let Some(inner) = self.statement.inner() else {
            log_error("ResultSet::first_row: statement is not valid");
            return false;
        };
        let mut state = inner.state_mut();
        state.cursor = 0;
        !state.rows.is_empty()
    }

    /// Look up a field of the current row and hand it to `f`.
    fn with_field<T>(&self, caller: &str, field: usize, f: impl FnOnce(&Value) -> T) -> Option<T> {
        let Some(inner) = self.statement.inner() else {
            log_error(format_args!("ResultSet::{caller}: statement is not valid"));
            return None;
        };
        if field == 0 {
            log_error("ResultSet: zero is an invalid field index");
            return None;
        }
        let state = inner.state();
        let Some(row) = state.rows.get(state.cursor) else {
            log_error(format_args!("ResultSet::{caller}: no current row"));
            return None;
        };
        match row.get(field - 1) {
            Some(value) => Some(f(value)),
            None => {
                log_error(format_args!(
                    "ResultSet::{caller}: field index {field} out of range"
                ));
                None
            }
        }
    }

    pub fn field_is_null(&self, field: usize) -> bool {
        self.with_field("field_is_null", field, |v| matches!(v, Value::Null))
            .unwrap_or(true)
    }

    /// Length in bytes of the field's text or blob representation.
    pub fn field_length(&self, field: usize) -> usize {
        self.with_field("field_length", field, |v| as_bytes(v).len())
            .unwrap_or(0)
    }

    pub fn get_int(&self, field: usize) -> i32 {
        // Truncation matches sqlite3_column_int.
        self.with_field("get_int", field, |v| as_i64(v) as i32)
            .unwrap_or(0)
    }

    pub fn get_uint(&self, field: usize) -> u32 {
        self.with_field("get_uint", field, |v| as_i64(v) as i32 as u32)
            .unwrap_or(0)
    }

    pub fn get_int64(&self, field: usize) -> i64 {
        self.with_field("get_int64", field, as_i64).unwrap_or(0)
    }

    /// The stored 64-bit pattern reinterpreted as unsigned.
    pub fn get_uint64(&self, field: usize) -> u64 {
        self.with_field("get_uint64", field, |v| as_i64(v) as u64)
            .unwrap_or(0)
    }

    pub fn get_uchar(&self, field: usize) -> u8 {
        self.with_field("get_uchar", field, |v| as_i64(v) as u8)
            .unwrap_or(0)
    }

    pub fn get_double(&self, field: usize) -> f64 {
        self.with_field("get_double", field, as_f64).unwrap_or(0.0)
    }

    pub fn get_float(&self, field: usize) -> f32 {
        self.with_field("get_float", field, |v| as_f64(v) as f32)
            .unwrap_or(0.0)
    }

    /// Text representation of the field; `None` for NULL or on error.
    pub fn get_string(&self, field: usize) -> Option<String> {
        self.with_field("get_string", field, |v| match v {
            Value::Null => None,
            other => Some(String::from_utf8_lossy(&as_bytes(other)).into_owned()),
        })
        .flatten()
    }

    /// Raw bytes of the field; `None` for NULL or on error.
    pub fn get_binary(&self, field: usize) -> Option<Vec<u8>> {
        self.with_field("get_binary", field, |v| match v {
            Value::Null => None,
            other => Some(as_bytes(other).into_owned()),
        })
        .flatten()
    }

    /// Parse a `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` or `HH:MM:SS` field as UTC
    /// seconds since the epoch.
    ///
    /// Returns `-1` when the result set is invalid and `0` when the value does
    /// not parse.
    pub fn get_datetime(&self, field: usize) -> i64 {
        self.with_field("get_datetime", field, |v| {
            let text = as_bytes(v);
            let text = String::from_utf8_lossy(&text);
            match parse_datetime(&text) {
                Some(ts) => ts,
                None => {
                    log_error(format_args!(
                        "ResultSet: invalid date/time value: '{text}'"
                    ));
                    0
                }
            }
        })
        .unwrap_or(-1)
    }
}

fn parse_datetime(text: &str) -> Option<i64> {
    let datetime = match text.len() {
        19 => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok()?,
        10 => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()?
            .and_time(NaiveTime::MIN),
        8 => NaiveDate::from_ymd_opt(1970, 1, 1)?
            .and_time(NaiveTime::parse_from_str(text, "%H:%M:%S").ok()?),
        _ => return None,
    };
    Some(datetime.and_utc().timestamp())
}

fn as_i64(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Integer(i) => *i,
        Value::Real(f) => *f as i64,
        Value::Text(s) => leading_number(s.as_bytes()).0,
        Value::Blob(b) => leading_number(b).0,
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Integer(i) => *i as f64,
        Value::Real(f) => *f,
        Value::Text(s) => leading_number(s.as_bytes()).1,
        Value::Blob(b) => leading_number(b).1,
    }
}

fn as_bytes(value: &Value) -> Cow<'_, [u8]> {
    match value {
        Value::Null => Cow::Borrowed(&[]),
        Value::Integer(i) => Cow::Owned(i.to_string().into_bytes()),
        Value::Real(f) => Cow::Owned(format!("{f:?}").into_bytes()),
        Value::Text(s) => Cow::Borrowed(s.as_bytes()),
        Value::Blob(b) => Cow::Borrowed(b),
    }
}

/// Numeric prefix of a text value, as an integer and as a double.
fn leading_number(bytes: &[u8]) -> (i64, f64) {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    let prefix = &text[..end];
    let real = prefix.parse::<f64>().unwrap_or(0.0);
    let int = prefix.parse::<i64>().unwrap_or(real as i64);
    (int, real)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1970-01-01 00:00:00", Some(0))]
    #[case("2011-12-31 23:59:59", Some(1_325_375_999))]
    #[case("2011-12-31", Some(1_325_289_600))]
    #[case("01:02:03", Some(3723))]
    #[case("2011-12-31T23", None)]
    #[case("1:2:3", None)]
    fn test_parse_datetime(#[case] text: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_datetime(text), expected);
    }

    #[rstest]
    #[case("42", 42)]
    #[case("  -7 apples", -7)]
    #[case("3.9", 3)]
    #[case("abc", 0)]
    fn test_text_coerces_like_sqlite(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(as_i64(&Value::Text(text.into())), expected);
    }

    #[test]
    fn test_invalid_result_set_sentinels() {
        let result = ResultSet::default();
        assert!(!result.is_valid());
        assert_eq!(result.get_datetime(1), -1);
        assert!(result.field_is_null(1));
        assert_eq!(result.get_int(1), 0);
        assert_eq!(result.get_string(1), None);
        assert!(!result.next_row());
        assert!(!result.first_row());
    }
}
