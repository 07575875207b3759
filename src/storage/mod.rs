//! Storage Layer - SQLite-backed execution
//!
//! - `schema`: CREATE TABLE rendering
//! - `cursor`: materialized query results
//! - `executor`: the engine-agnostic execution contract and transaction spans
//! - `sqlite`: the SQLite binding (foreign keys enforced on every connection)

pub mod cursor;
pub mod executor;
pub mod schema;
pub mod sqlite;

pub use cursor::{ResultCursor, Row};
pub use executor::{QueryExecutor, SharedExecutor, normalize_query, transactional};
pub use schema::{ColumnModifier, ColumnType, ForeignKey, ReferentialAction, SchemaBuilder, quote_ident};
pub use sqlite::{ExecutorConfig, SqliteExecutor};
