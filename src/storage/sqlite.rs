//! SQLite executor implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use rusqlite::{Connection, params_from_iter};
use crate::value::SqlValue;
use crate::{Error, Result};
use super::cursor::ResultCursor;
use super::executor::{QueryExecutor, normalize_query};

/// Reads a result off the connection a write just ran on
type WriteOutcome<R> = fn(&Connection, usize) -> R;

/// Default time a connection waits on a locked database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`SqliteExecutor`]
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Database file (created if it doesn't exist)
    pub path: PathBuf,
    /// Enforce foreign-key constraints on every connection
    pub foreign_keys: bool,
    pub busy_timeout: Duration,
}

impl ExecutorConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            foreign_keys: true,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// [`QueryExecutor`] over a single-file SQLite database.
///
/// Every non-transactional call opens its own short-lived connection; a
/// transaction keeps one dedicated connection until commit or rollback.
pub struct SqliteExecutor {
    config: ExecutorConfig,
    transaction: Mutex<Option<Connection>>,
}

impl SqliteExecutor {
    /// Open a database file with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(ExecutorConfig::new(path.as_ref()))
    }

    /// Create an executor, checking once that the database can be opened
    pub fn with_config(config: ExecutorConfig) -> Result<Self> {
        let executor = Self {
            config,
            transaction: Mutex::new(None),
        };
        executor.connect()?;
        Ok(executor)
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn connect(&self) -> Result<Connection> {
        let path = &self.config.path;
        let connection_error = |source| Error::Connection {
            message: format!("failed to open {}", path.display()),
            source,
        };

        let conn = Connection::open(path).map_err(connection_error)?;
        conn.busy_timeout(self.config.busy_timeout).map_err(connection_error)?;
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)
            .map_err(connection_error)?;
        Ok(conn)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Connection>> {
        self.transaction.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the transaction with `COMMIT` or `ROLLBACK`.
    /// The connection is dropped on every path.
    fn finish(&self, verb: &str) -> Result<()> {
        let conn = self.slot().take().ok_or_else(|| {
            Error::State(format!("{} called when not in a transaction", verb.to_lowercase()))
        })?;
        tracing::debug!("{} transaction", verb);
        conn.execute_batch(verb)
            .map_err(|e| Error::sql(format!("failed to {} transaction", verb.to_lowercase()), e))
    }

    /// Reject blank statements (rolling back any open transaction) and normalize the rest
    fn prepare_query(&self, query: &str) -> Result<String> {
        if query.trim_matches(|c: char| c == ';' || c.is_whitespace()).is_empty() {
            if self.in_transaction() {
                if let Err(e) = self.rollback() {
                    tracing::warn!("Rollback after blank query failed: {}", e);
                }
            }
            return Err(Error::query("query is null or empty"));
        }
        Ok(normalize_query(query))
    }

    fn write_autocommit<R>(&self, query: &str, params: &[SqlValue], outcome: WriteOutcome<R>) -> Result<R> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::sql("failed to begin implicit transaction", e))?;
        // dropping `tx` on error rolls it back
        let changed = write_on(&tx, query, params)?;
        let output = outcome(&tx, changed);
        tx.commit()
            .map_err(|e| Error::sql("failed to commit implicit transaction", e))?;
        Ok(output)
    }

    /// Route a write to the open transaction (rolling it back on failure)
    /// or to an implicit one, then read `outcome` on the same connection
    fn write<R>(&self, query: &str, params: &[SqlValue], outcome: WriteOutcome<R>) -> Result<R> {
        let query = self.prepare_query(query)?;
        tracing::debug!(params = params.len(), "write: {}", query);

        let mut slot = self.slot();
        let result = slot
            .as_ref()
            .map(|conn| write_on(conn, &query, params).map(|changed| outcome(conn, changed)));
        match result {
            Some(Ok(output)) => Ok(output),
            Some(Err(err)) => {
                // a failed statement aborts the whole transaction
                if let Some(conn) = slot.take() {
                    if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                        tracing::warn!("Rollback after failed write also failed: {}", rollback_err);
                    }
                }
                Err(err)
            }
            None => {
                drop(slot);
                self.write_autocommit(&query, params, outcome)
            }
        }
    }
}

impl QueryExecutor for SqliteExecutor {
    fn begin_transaction(&self) -> Result<()> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(Error::State("begin_transaction called while a transaction is open".to_string()));
        }
        let conn = self.connect()?;
        conn.execute_batch("BEGIN")
            .map_err(|e| Error::sql("failed to begin transaction", e))?;
        tracing::debug!("BEGIN transaction on {}", self.config.path.display());
        *slot = Some(conn);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.finish("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.finish("ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        self.slot().is_some()
    }

    fn execute_read(&self, query: &str, params: &[SqlValue]) -> Result<ResultCursor> {
        let query = self.prepare_query(query)?;
        tracing::debug!(params = params.len(), "read: {}", query);

        let slot = self.slot();
        if let Some(conn) = slot.as_ref() {
            return read_on(conn, &query, params);
        }
        drop(slot);

        let conn = self.connect()?;
        read_on(&conn, &query, params)
    }

    fn execute_write(&self, query: &str, params: &[SqlValue]) -> Result<usize> {
        self.write(query, params, |_, changed| changed)
    }

    fn execute_insert(&self, query: &str, params: &[SqlValue]) -> Result<(usize, i64)> {
        self.write(query, params, |conn, changed| (changed, conn.last_insert_rowid()))
    }
}

fn read_on(conn: &Connection, query: &str, params: &[SqlValue]) -> Result<ResultCursor> {
    let mut stmt = conn
        .prepare(query)
        .map_err(|e| Error::sql(format!("failed to prepare `{}`", query), e))?;
    ResultCursor::materialize(&mut stmt, params)
        .map_err(|e| Error::sql(format!("failed to read `{}`", query), e))
}

fn write_on(conn: &Connection, query: &str, params: &[SqlValue]) -> Result<usize> {
    let mut stmt = conn
        .prepare(query)
        .map_err(|e| Error::sql(format!("failed to prepare `{}`", query), e))?;
    stmt.execute(params_from_iter(params.iter()))
        .map_err(|e| Error::sql(format!("failed to execute `{}`", query), e))
}
