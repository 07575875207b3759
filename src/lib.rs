//! # Repokit - typed repositories over SQLite
//!
//! A small persistence access layer: concrete tables describe their schema and
//! row mapping once, and get key-addressed CRUD without writing query strings.
//!
//! Repokit provides:
//! - A schema builder that renders idempotent `CREATE TABLE IF NOT EXISTS` DDL
//! - A query executor owning the connection/transaction lifecycle
//! - Detached, fully materialized result cursors
//! - A generic repository keyed by (possibly composite) primary keys
//! - A single-row counter repository
//! - A process-local identity cache

pub mod value;
pub mod key;
pub mod cache;
pub mod storage;
pub mod repository;
pub mod counter;
pub mod tables;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use value::{FromSqlValue, SqlValue};
pub use key::{CompositeKey, Example, PrimaryKey};
pub use cache::{Cacheable, IdentityCache};
pub use storage::{
    ColumnModifier, ColumnType, ExecutorConfig, ForeignKey, QueryExecutor, ReferentialAction,
    ResultCursor, Row, SchemaBuilder, SharedExecutor, SqliteExecutor, transactional,
};
pub use repository::{Dao, Repository, Table};
pub use counter::CounterRepository;

/// Result type alias for Repokit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Repokit operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing engine could not be opened or reached
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Malformed call or a statement failure not tied to an invariant
    #[error("Query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// Transaction API misuse
    #[error("Transaction state error: {0}")]
    State(String),

    /// A read expected at least one row and found none
    #[error("Not found: {0}")]
    NotFound(String),

    /// A write did not affect the exact number of rows it must affect
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// Query error with no underlying engine failure
    pub fn query(message: impl Into<String>) -> Self {
        Error::Query { message: message.into(), source: None }
    }

    /// Query error wrapping an engine failure
    pub fn sql(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Error::Query { message: message.into(), source: Some(source) }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_invariant(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}
