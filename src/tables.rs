//! Built-in tables
//!
//! `session` is the table the CLI manages: an integer id (allocated from the
//! `session_counter` counter when not given) and a free-form label.

use serde::Serialize;
use crate::cache::Cacheable;
use crate::counter::CounterRepository;
use crate::key::{Example, PrimaryKey};
use crate::repository::{Dao, Repository, Table};
use crate::storage::{ColumnModifier, ColumnType, Row, SchemaBuilder, SharedExecutor, transactional};
use crate::value::SqlValue;
use crate::{Error, Result};

/// Table holding the session id counter
pub const SESSION_COUNTER_TABLE: &str = "session_counter";
pub const SESSION_COUNTER_COLUMN: &str = "next_id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: i64,
    pub label: String,
}

impl Session {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self { id, label: label.into() }
    }
}

impl Cacheable for Session {
    fn identifier(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKey {
    pub id: i64,
}

impl SessionKey {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

impl Example for SessionKey {
    fn column_names(&self) -> &[&'static str] {
        &["id"]
    }

    fn value(&self, column: &str) -> Option<SqlValue> {
        match column {
            "id" => Some(SqlValue::Integer(self.id)),
            _ => None,
        }
    }
}

impl PrimaryKey for SessionKey {}

/// Filter sessions by label
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub label: Option<String>,
}

impl Example for SessionFilter {
    fn column_names(&self) -> &[&'static str] {
        &["id", "label"]
    }

    fn value(&self, column: &str) -> Option<SqlValue> {
        match column {
            "label" => self.label.clone().map(SqlValue::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionTable;

impl Table for SessionTable {
    type Entity = Session;
    type Key = SessionKey;

    fn name(&self) -> &str {
        "session"
    }

    fn define_schema(&self, schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .add_column("id", ColumnType::Integer, &[ColumnModifier::PrimaryKey])
            .add_column("label", ColumnType::Text, &[ColumnModifier::NotNull])
    }

    fn map_row(&self, row: &Row) -> Result<Session> {
        Ok(Session {
            id: row.get("id")?,
            label: row.get("label")?,
        })
    }

    fn key_of(&self, session: &Session) -> SessionKey {
        SessionKey::new(session.id)
    }

    fn column_values(&self, session: &Session) -> Vec<(&'static str, SqlValue)> {
        vec![("id", session.id.into()), ("label", session.label.as_str().into())]
    }
}

/// The session table together with the counter its ids are drawn from
pub struct SessionStore {
    executor: SharedExecutor,
    pub sessions: Repository<SessionTable>,
    pub counter: CounterRepository,
}

impl SessionStore {
    pub fn open(executor: SharedExecutor) -> Result<Self> {
        let sessions = Repository::new(executor.clone(), SessionTable)?;
        let counter = CounterRepository::new(executor.clone(), SESSION_COUNTER_TABLE, SESSION_COUNTER_COLUMN)?;
        Ok(Self { executor, sessions, counter })
    }

    /// Insert a session, allocating its id from the counter when not given.
    /// An explicit id at or past the counter moves the counter beyond it.
    pub fn add(&self, label: impl Into<String>, id: Option<i64>) -> Result<Session> {
        let label = label.into();
        transactional(&*self.executor, || {
            let id = match id {
                Some(id) => {
                    let next = id
                        .checked_add(1)
                        .ok_or_else(|| Error::query(format!("session id {} leaves no id to allocate after it", id)))?;
                    if id >= self.counter.select_counter()? {
                        self.counter.insert_counter(next)?;
                    }
                    id
                }
                None => self.counter.next_value()?,
            };
            let session = Session::new(id, label);
            self.sessions.insert(&session)?;
            Ok(session)
        })
    }
}
