//! Materialized query results
//!
//! Rows are read completely before the statement and connection are
//! released, so a [`ResultCursor`] never holds engine resources. The cursor
//! is an iterator that hands out each [`Row`] exactly once.

use std::sync::Arc;
use rusqlite::{Statement, params_from_iter};
use crate::value::{FromSqlValue, SqlValue};
use crate::{Error, Result};

/// One materialized row, addressable by column name or position.
///
/// Column names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Typed value of the named column
    pub fn get<T: FromSqlValue>(&self, column: &str) -> Result<T> {
        let index = self
            .index_of(column)
            .ok_or_else(|| Error::query(format!("no column named `{}`", column)))?;
        self.convert(index, column)
    }

    /// Typed value at a zero-based position
    pub fn get_index<T: FromSqlValue>(&self, index: usize) -> Result<T> {
        let column = self
            .columns
            .get(index)
            .ok_or_else(|| Error::query(format!("column index {} out of range ({} columns)", index, self.columns.len())))?;
        self.convert(index, column)
    }

    /// Raw value of the named column
    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.index_of(column).map(|i| &self.values[i])
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(column))
    }

    fn convert<T: FromSqlValue>(&self, index: usize, column: &str) -> Result<T> {
        let value = &self.values[index];
        T::from_sql_value(value).ok_or_else(|| {
            Error::query(format!(
                "column `{}`: expected {}, found {}",
                column,
                T::SQL_TYPE,
                value.type_name()
            ))
        })
    }
}

/// A detached, fully read query result.
#[derive(Debug)]
pub struct ResultCursor {
    columns: Arc<[String]>,
    rows: std::vec::IntoIter<Vec<SqlValue>>,
}

impl ResultCursor {
    /// Build a cursor from already-read rows. Column names are lowercased.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(|c| c.to_lowercase()).collect();
        Self {
            columns: columns.into(),
            rows: rows.into_iter(),
        }
    }

    /// Run a prepared statement and read every row into memory
    pub(crate) fn materialize(statement: &mut Statement<'_>, params: &[SqlValue]) -> rusqlite::Result<Self> {
        let columns: Vec<String> = statement.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = statement.query(params_from_iter(params.iter()))?;
        let mut materialized = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(SqlValue::from(row.get_ref(i)?));
            }
            materialized.push(values);
        }

        Ok(Self::new(columns, materialized))
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Rows not yet handed out
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows remain
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

impl Iterator for ResultCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next().map(|values| Row {
            columns: Arc::clone(&self.columns),
            values,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for ResultCursor {}
