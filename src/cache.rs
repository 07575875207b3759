//! Identity cache - process-local, non-evicting entity map
//!
//! Entries are keyed by [`Cacheable::identifier`], which may differ from the
//! row's primary key (composite keys flatten to one string). The database is
//! always the source of truth; the cache is advisory.

use std::collections::HashMap;

/// An entity that can be stored in an [`IdentityCache`]
pub trait Cacheable {
    /// Stable identifier used as the cache map key
    fn identifier(&self) -> String;
}

/// Map from identifier to entity with no eviction.
///
/// Not synchronized; share it behind a lock.
#[derive(Debug, Clone)]
pub struct IdentityCache<T> {
    entries: HashMap<String, T>,
}

impl<T> Default for IdentityCache<T> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<T: Cacheable> IdentityCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite, returning the previous entry
    pub fn put(&mut self, entity: T) -> Option<T> {
        self.entries.insert(entity.identifier(), entity)
    }

    pub fn put_all(&mut self, entities: impl IntoIterator<Item = T>) {
        for entity in entities {
            self.put(entity);
        }
    }

    /// Look up the entry sharing `needle`'s identifier
    pub fn get(&self, needle: &T) -> Option<&T> {
        self.entries.get(&needle.identifier())
    }

    pub fn get_by_identifier(&self, identifier: &str) -> Option<&T> {
        self.entries.get(identifier)
    }

    pub fn remove(&mut self, needle: &T) -> Option<T> {
        self.entries.remove(&needle.identifier())
    }

    pub fn contains(&self, needle: &T) -> bool {
        self.entries.contains_key(&needle.identifier())
    }

    /// Keep only the entries for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|_, entity| keep(entity));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
