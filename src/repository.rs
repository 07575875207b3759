//! Repository - typed CRUD over one table
//!
//! A concrete table implements [`Table`] (name, schema hook, row mapping and
//! the column values of an entity); [`Repository`] turns that into the
//! key-addressed operations of [`Dao`].
//!
//! Cache policy: operations that read or write an entity outside an explicit
//! transaction put it in the identity cache; inside a transaction they only
//! evict it, so uncommitted data never reaches the cache. Deletes always
//! evict. Reads never consult the cache.

use std::sync::{Mutex, MutexGuard, PoisonError};
use crate::cache::{Cacheable, IdentityCache};
use crate::key::{Example, PrimaryKey};
use crate::storage::{Row, SchemaBuilder, SharedExecutor, quote_ident, transactional};
use crate::value::SqlValue;
use crate::{Error, Result};

/// Construction contract for a concrete repository
pub trait Table: Send + Sync {
    type Entity: Cacheable + Clone + Send;
    type Key: PrimaryKey;

    /// Table name
    fn name(&self) -> &str;

    /// Declare columns, keys and constraints. Called once per repository.
    fn define_schema(&self, schema: SchemaBuilder) -> SchemaBuilder;

    /// Build one entity from one row
    fn map_row(&self, row: &Row) -> Result<Self::Entity>;

    /// The key addressing `entity`'s row
    fn key_of(&self, entity: &Self::Entity) -> Self::Key;

    /// Column values written by insert/update, in the order they are bound
    fn column_values(&self, entity: &Self::Entity) -> Vec<(&'static str, SqlValue)>;

    /// The entity as stored, given the rowid the engine assigned on insert.
    ///
    /// Tables with an engine-generated key override this to fill it in; the
    /// default leaves the entity as supplied.
    fn with_rowid(&self, entity: &Self::Entity, rowid: i64) -> Self::Entity {
        let _ = rowid;
        entity.clone()
    }
}

/// Data access object over entities `E` addressed by keys `K`
pub trait Dao<E, K: PrimaryKey> {
    /// The row matching `key`; `NotFound` if there is none
    fn select(&self, key: &K) -> Result<E>;

    /// Every row; empty when the table is empty
    fn select_all(&self) -> Result<Vec<E>>;

    /// One entity per key, in key order, inside one transaction span
    fn select_many(&self, keys: &[K]) -> Result<Vec<E>>;

    /// Insert one row, returning the affected row count
    fn insert(&self, entity: &E) -> Result<usize>;

    /// Insert every entity, all or nothing
    fn insert_all(&self, entities: &[E]) -> Result<Vec<usize>>;

    /// Update the non-key columns of the row addressed by `entity`'s key
    fn update(&self, entity: &E) -> Result<()>;

    /// Update every entity, all or nothing
    fn update_all(&self, entities: &[E]) -> Result<()>;

    /// Delete the row matching `key`. A missing row is not an error.
    fn delete(&self, key: &K) -> Result<usize>;

    /// Delete every key in order, all or nothing
    fn delete_all(&self, keys: &[K]) -> Result<usize>;

    /// Whether a row matches `key`
    fn exists(&self, key: &K) -> Result<bool>;
}

/// Generic repository over one [`Table`]
pub struct Repository<T: Table> {
    executor: SharedExecutor,
    table: T,
    cache: Mutex<IdentityCache<T::Entity>>,
}

impl<T: Table> Repository<T> {
    /// Create the repository and its table (if it doesn't exist yet)
    pub fn new(executor: SharedExecutor, table: T) -> Result<Self> {
        let ddl = table.define_schema(SchemaBuilder::new(table.name())).build()?;
        executor.execute_write(&ddl, &[])?;
        tracing::info!("Initialized table {}", table.name());

        Ok(Self {
            executor,
            table,
            cache: Mutex::new(IdentityCache::new()),
        })
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn executor(&self) -> &SharedExecutor {
        &self.executor
    }

    /// Cached entity sharing `needle`'s identifier
    pub fn cached(&self, needle: &T::Entity) -> Option<T::Entity> {
        self.cache().get(needle).cloned()
    }

    /// Evict one entity, e.g. after changing its row with direct SQL
    pub fn invalidate(&self, entity: &T::Entity) {
        self.cache().remove(entity);
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }

    /// Every row matching the present values of `example`
    pub fn select_where(&self, example: &dyn Example) -> Result<Vec<T::Entity>> {
        let (filter, params) = example_filter(example);
        let query = format!("SELECT * FROM {}{}", quote_ident(self.table.name()), filter);
        self.read_entities(&query, &params)
    }

    /// Whether any row matches the present values of `example`
    pub fn exists_where(&self, example: &dyn Example) -> Result<bool> {
        let (filter, params) = example_filter(example);
        let query = format!("SELECT 1 FROM {}{} LIMIT 1", quote_ident(self.table.name()), filter);
        Ok(!self.executor.execute_read(&query, &params)?.is_empty())
    }

    /// Insert one row and return the entity as stored, generated key included
    pub fn insert_returning(&self, entity: &T::Entity) -> Result<T::Entity> {
        self.insert_row(entity).map(|(_, stored)| stored)
    }

    fn insert_row(&self, entity: &T::Entity) -> Result<(usize, T::Entity)> {
        let (query, params) = insert_statement(self.table.name(), self.table.column_values(entity))?;
        let (changed, rowid) = self.executor.execute_insert(&query, &params)?;
        let stored = self.table.with_rowid(entity, rowid);
        self.remember(std::slice::from_ref(&stored));
        Ok((changed, stored))
    }

    fn read_entities(&self, query: &str, params: &[SqlValue]) -> Result<Vec<T::Entity>> {
        let cursor = self.executor.execute_read(query, params)?;
        let entities = cursor
            .map(|row| self.table.map_row(&row))
            .collect::<Result<Vec<_>>>()?;
        self.remember(&entities);
        Ok(entities)
    }

    fn remember(&self, entities: &[T::Entity]) {
        let in_transaction = self.executor.in_transaction();
        let mut cache = self.cache();
        if in_transaction {
            for entity in entities {
                cache.remove(entity);
            }
        } else {
            cache.put_all(entities.iter().cloned());
        }
    }

    /// Evict every entry whose key binds to `key_values`
    fn forget_key(&self, key_values: &[SqlValue]) {
        self.cache().retain(|entity| match self.table.key_of(entity).values() {
            Ok(values) => values.as_slice() != key_values,
            Err(_) => false,
        });
    }

    fn for_all<I, O>(&self, items: &[I], mut action: impl FnMut(&I) -> Result<O>) -> Result<Vec<O>> {
        transactional(&*self.executor, || items.iter().map(|item| action(item)).collect())
            .inspect_err(|e| tracing::debug!("Batch on {} rolled back: {}", self.table.name(), e))
    }

    fn cache(&self) -> MutexGuard<'_, IdentityCache<T::Entity>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Table> Dao<T::Entity, T::Key> for Repository<T> {
    fn select(&self, key: &T::Key) -> Result<T::Entity> {
        let (filter, params) = key_filter(key)?;
        let query = format!("SELECT * FROM {}{}", quote_ident(self.table.name()), filter);

        let row = self
            .executor
            .execute_read(&query, &params)?
            .next()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no row in {} where {}",
                    self.table.name(),
                    describe(key.column_names(), &params)
                ))
            })?;

        let entity = self.table.map_row(&row)?;
        self.remember(std::slice::from_ref(&entity));
        Ok(entity)
    }

    fn select_all(&self) -> Result<Vec<T::Entity>> {
        let query = format!("SELECT * FROM {}", quote_ident(self.table.name()));
        self.read_entities(&query, &[])
    }

    fn select_many(&self, keys: &[T::Key]) -> Result<Vec<T::Entity>> {
        self.for_all(keys, |key| self.select(key))
    }

    fn insert(&self, entity: &T::Entity) -> Result<usize> {
        self.insert_row(entity).map(|(changed, _)| changed)
    }

    fn insert_all(&self, entities: &[T::Entity]) -> Result<Vec<usize>> {
        self.for_all(entities, |entity| self.insert(entity))
    }

    fn update(&self, entity: &T::Entity) -> Result<()> {
        let key = self.table.key_of(entity);
        let (query, params) = update_statement(self.table.name(), self.table.column_values(entity), &key)?;

        if self.executor.execute_write(&query, &params)? == 0 {
            self.invalidate(entity);
            return Err(Error::NotFound(format!(
                "no row in {} where {} to update",
                self.table.name(),
                describe(key.column_names(), &key.values()?)
            )));
        }
        self.remember(std::slice::from_ref(entity));
        Ok(())
    }

    fn update_all(&self, entities: &[T::Entity]) -> Result<()> {
        self.for_all(entities, |entity| self.update(entity)).map(|_| ())
    }

    fn delete(&self, key: &T::Key) -> Result<usize> {
        let (filter, params) = key_filter(key)?;
        let query = format!("DELETE FROM {}{}", quote_ident(self.table.name()), filter);

        let changed = self.executor.execute_write(&query, &params)?;
        self.forget_key(&params);
        Ok(changed)
    }

    fn delete_all(&self, keys: &[T::Key]) -> Result<usize> {
        Ok(self.for_all(keys, |key| self.delete(key))?.into_iter().sum())
    }

    fn exists(&self, key: &T::Key) -> Result<bool> {
        let (filter, params) = key_filter(key)?;
        let query = format!("SELECT 1 FROM {}{} LIMIT 1", quote_ident(self.table.name()), filter);
        Ok(!self.executor.execute_read(&query, &params)?.is_empty())
    }
}

/// ` WHERE "c1" = ? AND "c2" = ?` in the key's declared column order, with its values
pub(crate) fn key_filter<K: PrimaryKey + ?Sized>(key: &K) -> Result<(String, Vec<SqlValue>)> {
    let values = key.values()?;
    Ok((where_clause(key.column_names()), values))
}

/// Like [`key_filter`], skipping columns without a value
pub(crate) fn example_filter(example: &dyn Example) -> (String, Vec<SqlValue>) {
    let (columns, values): (Vec<&str>, Vec<SqlValue>) = example.present_values().into_iter().unzip();
    (where_clause(&columns), values)
}

fn where_clause(columns: &[&str]) -> String {
    if columns.is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = columns.iter().map(|c| format!("{} = ?", quote_ident(c))).collect();
    format!(" WHERE {}", conditions.join(" AND "))
}

pub(crate) fn insert_statement(table: &str, columns: Vec<(&'static str, SqlValue)>) -> Result<(String, Vec<SqlValue>)> {
    if columns.is_empty() {
        return Err(Error::query(format!("no columns to insert into {}", table)));
    }
    let (names, values): (Vec<&str>, Vec<SqlValue>) = columns.into_iter().unzip();
    let quoted: Vec<String> = names.iter().map(|n| quote_ident(n)).collect();
    let placeholders = vec!["?"; names.len()].join(", ");

    let query = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        quoted.join(", "),
        placeholders
    );
    Ok((query, values))
}

/// `UPDATE t SET <non-key columns> WHERE <key columns>`; SET values bind first
pub(crate) fn update_statement<K: PrimaryKey + ?Sized>(
    table: &str,
    columns: Vec<(&'static str, SqlValue)>,
    key: &K,
) -> Result<(String, Vec<SqlValue>)> {
    let key_columns = key.column_names();
    let (assignments, mut params): (Vec<String>, Vec<SqlValue>) = columns
        .into_iter()
        .filter(|(name, _)| !key_columns.contains(name))
        .map(|(name, value)| (format!("{} = ?", quote_ident(name)), value))
        .unzip();

    if assignments.is_empty() {
        return Err(Error::query(format!("no non-key columns to update in {}", table)));
    }

    let (filter, key_values) = key_filter(key)?;
    params.extend(key_values);
    let query = format!("UPDATE {} SET {}{}", quote_ident(table), assignments.join(", "), filter);
    Ok((query, params))
}

fn describe(columns: &[&str], values: &[SqlValue]) -> String {
    columns
        .iter()
        .zip(values)
        .map(|(c, v)| format!("{} = {}", c, v))
        .collect::<Vec<_>>()
        .join(" AND ")
}
