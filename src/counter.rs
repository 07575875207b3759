//! Counter repository - a single-row, single-column integer table

use crate::storage::{ColumnModifier, ColumnType, SchemaBuilder, SharedExecutor, quote_ident, transactional};
use crate::value::SqlValue;
use crate::{Error, Result};

/// Persistent counter, seeded with 1 when its table is first created
pub struct CounterRepository {
    executor: SharedExecutor,
    table: String,
    column: String,
}

impl CounterRepository {
    /// Create the counter table if absent and seed it when empty
    pub fn new(executor: SharedExecutor, table: &str, column: &str) -> Result<Self> {
        let counter = Self {
            executor,
            table: table.to_string(),
            column: column.to_string(),
        };
        counter.init_table()?;
        Ok(counter)
    }

    fn init_table(&self) -> Result<()> {
        let ddl = SchemaBuilder::new(&self.table)
            .add_column(&self.column, ColumnType::Integer, &[ColumnModifier::NotNull])
            .build()?;
        self.executor.execute_write(&ddl, &[])?;

        let any_row = format!("SELECT 1 FROM {} LIMIT 1", quote_ident(&self.table));
        if self.executor.execute_read(&any_row, &[])?.is_empty() {
            self.reset_counter()?;
            tracing::info!("Seeded counter {}.{}", self.table, self.column);
        }
        Ok(())
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Current value; `NotFound` if the table holds no row
    pub fn select_counter(&self) -> Result<i64> {
        let query = format!("SELECT {} FROM {}", quote_ident(&self.column), quote_ident(&self.table));
        let row = self
            .executor
            .execute_read(&query, &[])?
            .next()
            .ok_or_else(|| Error::NotFound(format!("counter table {} is empty", self.table)))?;
        row.get_index(0)
    }

    /// Replace whatever the table holds with a single row carrying `value`
    pub fn insert_counter(&self, value: i64) -> Result<()> {
        let table = quote_ident(&self.table);
        let delete = format!("DELETE FROM {}", table);
        let insert = format!("INSERT INTO {} ({}) VALUES (?)", table, quote_ident(&self.column));

        transactional(&*self.executor, || {
            self.executor.execute_write(&delete, &[])?;
            match self.executor.execute_write(&insert, &[SqlValue::Integer(value)])? {
                0 => Err(Error::Invariant(format!("inserting into counter {} changed no rows", self.table))),
                _ => Ok(()),
            }
        })
    }

    /// Add one to the counter. Exactly one row must change.
    pub fn increment_counter(&self) -> Result<()> {
        let column = quote_ident(&self.column);
        let query = format!("UPDATE {} SET {} = {} + 1", quote_ident(&self.table), column, column);

        transactional(&*self.executor, || {
            let changed = self.executor.execute_write(&query, &[])?;
            if changed != 1 {
                return Err(Error::Invariant(format!(
                    "incrementing counter {} changed {} rows, expected 1",
                    self.table, changed
                )));
            }
            Ok(())
        })
    }

    pub fn reset_counter(&self) -> Result<()> {
        self.insert_counter(1)
    }

    /// Read the current value and advance the counter in one span
    pub fn next_value(&self) -> Result<i64> {
        transactional(&*self.executor, || {
            let value = self.select_counter()?;
            self.increment_counter()?;
            Ok(value)
        })
    }
}
