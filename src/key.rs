//! Key capabilities - how rows are addressed
//!
//! An [`Example`] is a set of column names with optional values, used to match
//! one or more rows. A [`PrimaryKey`] is an `Example` whose every value must be
//! present: it addresses exactly one row and is bound in declared column order.

use crate::value::SqlValue;
use crate::{Error, Result};

/// A set of column names and values identifying one or more rows.
///
/// Columns whose value is absent (or NULL) are left out of the WHERE clause.
pub trait Example {
    /// Column names in declaration order
    fn column_names(&self) -> &[&'static str];

    /// Value for a column, `None` when unset
    fn value(&self, column: &str) -> Option<SqlValue>;

    /// `(column, value)` pairs for the columns that carry a non-null value
    fn present_values(&self) -> Vec<(&'static str, SqlValue)> {
        self.column_names()
            .iter()
            .filter_map(|&column| match self.value(column) {
                Some(value) if !value.is_null() => Some((column, value)),
                _ => None,
            })
            .collect()
    }
}

/// A full row address. Partial keys are rejected.
pub trait PrimaryKey: Example {
    /// Values in declared column order.
    ///
    /// Fails if the key declares no columns or any column has no value.
    fn values(&self) -> Result<Vec<SqlValue>> {
        let columns = self.column_names();
        if columns.is_empty() {
            return Err(Error::query("primary key declares no columns"));
        }
        columns
            .iter()
            .map(|&column| match self.value(column) {
                Some(value) if !value.is_null() => Ok(value),
                _ => Err(Error::query(format!("primary key value for column `{}` is missing", column))),
            })
            .collect()
    }
}

/// General-purpose key over a fixed list of declared columns.
///
/// Values may be assigned in any order; they are always reported in the
/// order the columns were declared.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeKey {
    columns: Vec<&'static str>,
    values: Vec<Option<SqlValue>>,
}

impl CompositeKey {
    /// Create a key with the given columns and no values
    pub fn new(columns: &[&'static str]) -> Self {
        Self {
            columns: columns.to_vec(),
            values: vec![None; columns.len()],
        }
    }

    /// Set the value of a declared column. `None`/NULL clears it.
    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) -> Result<()> {
        let index = self
            .columns
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| Error::query(format!("`{}` is not a key column", column)))?;
        let value = value.into();
        self.values[index] = if value.is_null() { None } else { Some(value) };
        Ok(())
    }

    /// Builder form of [`CompositeKey::set`]
    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Result<Self> {
        self.set(column, value)?;
        Ok(self)
    }

    /// Whether every declared column has a value
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }
}

impl Example for CompositeKey {
    fn column_names(&self) -> &[&'static str] {
        &self.columns
    }

    fn value(&self, column: &str) -> Option<SqlValue> {
        let index = self.columns.iter().position(|c| *c == column)?;
        self.values[index].clone()
    }
}

impl PrimaryKey for CompositeKey {}
