//! Engine-agnostic execution contract
//!
//! Any backing store with parameterized statements, transactions and a
//! materializable result set can implement [`QueryExecutor`].

use std::sync::Arc;
use crate::value::SqlValue;
use crate::Result;
use super::cursor::ResultCursor;

/// Single point of contact with the relational engine.
///
/// An executor holds at most one open transaction. While it is open, reads
/// and writes are routed to it; otherwise each call runs on its own
/// connection and every write is committed atomically on its own.
///
/// The transaction slot is shared by every caller of the same executor:
/// concurrent spans on one executor must be serialized by the caller.
pub trait QueryExecutor: Send + Sync {
    /// Open a dedicated connection and start a transaction on it
    fn begin_transaction(&self) -> Result<()>;

    /// Commit and release the transaction connection
    fn commit(&self) -> Result<()>;

    /// Roll back and release the transaction connection
    fn rollback(&self) -> Result<()>;

    /// Whether a transaction is currently open
    fn in_transaction(&self) -> bool;

    /// Run a parameterized read and return the fully materialized rows
    fn execute_read(&self, query: &str, params: &[SqlValue]) -> Result<ResultCursor>;

    /// Run a parameterized write and return the affected row count
    fn execute_write(&self, query: &str, params: &[SqlValue]) -> Result<usize>;

    /// Like [`QueryExecutor::execute_write`], also returning the rowid the
    /// engine assigned to the last inserted row (read on the same connection)
    fn execute_insert(&self, query: &str, params: &[SqlValue]) -> Result<(usize, i64)>;
}

/// Executor shared between repositories
pub type SharedExecutor = Arc<dyn QueryExecutor>;

/// Run `action` inside one transaction span.
///
/// Commits when `action` succeeds; otherwise rolls back (if the transaction
/// is still open) and returns the original error. When a transaction is
/// already open, `action` joins it and the outer span decides the outcome.
pub fn transactional<R>(executor: &dyn QueryExecutor, action: impl FnOnce() -> Result<R>) -> Result<R> {
    if executor.in_transaction() {
        return action();
    }

    executor.begin_transaction()?;
    match action() {
        Ok(output) => {
            executor.commit()?;
            Ok(output)
        }
        Err(err) => {
            // a failed write inside the span already rolled back
            if executor.in_transaction() {
                if let Err(rollback_err) = executor.rollback() {
                    tracing::warn!("Rollback after failed transaction span also failed: {}", rollback_err);
                }
            }
            Err(err)
        }
    }
}

/// Trim a statement and terminate it with exactly one `;`
pub fn normalize_query(query: &str) -> String {
    let body = query.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("{};", body)
}
