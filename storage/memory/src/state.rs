//! Database contents: stores, records and index entries.
//!
//! Everything here is synchronous and runs under the engine lock.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use shelf_core::engine::{EngineResult, KeyMode};
use shelf_core::value::{extract_key, Key, Value};
use shelf_core::EngineError;

use crate::session::SessionFlags;

#[derive(Debug, Default)]
pub(crate) struct DatabaseState {
    pub version: u32,
    pub stores: BTreeMap<String, StoreState>,
    pub sessions: Vec<Arc<SessionFlags>>,
}

impl DatabaseState {
    pub fn store(&self, name: &str) -> EngineResult<&StoreState> {
        self.stores.get(name).ok_or_else(|| EngineError::NotFound(format!("object store {name}")))
    }

    pub fn store_mut(&mut self, name: &str) -> EngineResult<&mut StoreState> {
        self.stores.get_mut(name).ok_or_else(|| EngineError::NotFound(format!("object store {name}")))
    }

    pub fn open_sessions(&self) -> usize { self.sessions.iter().filter(|s| !s.is_closed()).count() }

    pub fn detach(&mut self, id: u64) { self.sessions.retain(|s| s.id != id) }
}

#[derive(Debug, Clone)]
pub(crate) struct IndexState {
    pub attr: String,
    pub unique: bool,
    entries: BTreeMap<Key, BTreeSet<Key>>,
}

impl IndexState {
    fn new(attr: &str, unique: bool) -> Self { Self { attr: attr.to_owned(), unique, entries: BTreeMap::new() } }

    /// Records without a valid key at the attribute path are not indexed.
    fn key_for(&self, value: &Value) -> Option<Key> { extract_key(value, &self.attr).ok().flatten() }

    fn conflicts(&self, index_key: &Key, primary: &Key) -> bool {
        self.unique && self.entries.get(index_key).is_some_and(|keys| keys.iter().any(|k| k != primary))
    }

    fn insert(&mut self, index_key: Key, primary: Key) { self.entries.entry(index_key).or_default().insert(primary); }

    fn remove(&mut self, index_key: &Key, primary: &Key) {
        if let Some(keys) = self.entries.get_mut(index_key) {
            keys.remove(primary);
            if keys.is_empty() {
                self.entries.remove(index_key);
            }
        }
    }

    fn first(&self, index_key: &Key) -> Option<&Key> { self.entries.get(index_key).and_then(|keys| keys.iter().next()) }
}

#[derive(Debug, Clone)]
pub(crate) struct StoreState {
    pub key_mode: KeyMode,
    next_key: i64,
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, IndexState>,
}

impl StoreState {
    pub fn new(key_mode: KeyMode) -> Self { Self { key_mode, next_key: 1, records: BTreeMap::new(), indexes: BTreeMap::new() } }

    #[cfg(test)]
    pub fn len(&self) -> usize { self.records.len() }

    pub fn index_names(&self) -> Vec<String> { self.indexes.keys().cloned().collect() }

    pub fn index(&self, name: &str) -> EngineResult<&IndexState> {
        self.indexes.get(name).ok_or_else(|| EngineError::NotFound(format!("index {name}")))
    }

    /// Creates an index over the records already in the store.
    pub fn create_index(&mut self, name: &str, attr: &str, unique: bool) -> EngineResult<()> {
        if self.indexes.contains_key(name) {
            return Err(EngineError::Constraint(format!("index {name} already exists")));
        }
        let mut index = IndexState::new(attr, unique);
        for (primary, value) in &self.records {
            if let Some(index_key) = index.key_for(value) {
                if index.conflicts(&index_key, primary) {
                    return Err(EngineError::Constraint(format!("existing records violate unique index {name} at {index_key}")));
                }
                index.insert(index_key, primary.clone());
            }
        }
        self.indexes.insert(name.to_owned(), index);
        Ok(())
    }

    fn resolve_key(&self, value: &Value, explicit: Option<Key>) -> EngineResult<Key> {
        match (&self.key_mode, explicit) {
            (KeyMode::KeyPath(_), Some(_)) => {
                Err(EngineError::Data("the store uses a key path, so an explicit key cannot be provided".into()))
            }
            (KeyMode::KeyPath(path), None) => {
                extract_key(value, path)?.ok_or_else(|| EngineError::Data(format!("record has no value at key path {path}")))
            }
            (KeyMode::AutoIncrement, Some(key)) => Ok(key),
            (KeyMode::AutoIncrement, None) => Ok(Key::Integer(self.next_key)),
        }
    }

    pub fn add(&mut self, value: Value, explicit: Option<Key>) -> EngineResult<Key> {
        let key = self.resolve_key(&value, explicit)?;
        if self.records.contains_key(&key) {
            return Err(EngineError::Constraint(format!("key {key} already exists")));
        }
        self.write(key, value)
    }

    pub fn put(&mut self, value: Value, explicit: Option<Key>) -> EngineResult<Key> {
        let key = self.resolve_key(&value, explicit)?;
        self.write(key, value)
    }

    fn write(&mut self, key: Key, value: Value) -> EngineResult<Key> {
        // check every unique index before touching anything
        for (name, index) in &self.indexes {
            if let Some(index_key) = index.key_for(&value) {
                if index.conflicts(&index_key, &key) {
                    return Err(EngineError::Constraint(format!("unique index {name} already contains {index_key}")));
                }
            }
        }

        if let Some(old) = self.records.remove(&key) {
            self.unindex(&key, &old);
        }
        for index in self.indexes.values_mut() {
            if let Some(index_key) = index.key_for(&value) {
                index.insert(index_key, key.clone());
            }
        }
        self.records.insert(key.clone(), value);

        if self.key_mode == KeyMode::AutoIncrement {
            if let Key::Integer(i) = key {
                if i >= self.next_key {
                    self.next_key = i.saturating_add(1);
                }
            }
        }
        Ok(key)
    }

    fn unindex(&mut self, key: &Key, value: &Value) {
        for index in self.indexes.values_mut() {
            if let Some(index_key) = index.key_for(value) {
                index.remove(&index_key, key);
            }
        }
    }

    pub fn delete(&mut self, key: &Key) {
        if let Some(old) = self.records.remove(key) {
            self.unindex(key, &old);
        }
    }

    pub fn get(&self, key: &Key) -> Option<Value> { self.records.get(key).cloned() }

    /// Removes all records. The key generator keeps counting.
    pub fn clear(&mut self) {
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.entries.clear();
        }
    }

    pub fn index_get(&self, name: &str, index_key: &Key) -> EngineResult<Option<(Key, Value)>> {
        let index = self.index(name)?;
        Ok(index.first(index_key).and_then(|primary| self.records.get(primary).map(|value| (primary.clone(), value.clone()))))
    }

    /// The first record strictly after `after`, or the first record overall.
    pub fn next_after(&self, after: Option<&Key>) -> Option<(Key, Value)> {
        let mut range = match after {
            None => self.records.range::<Key, _>(..),
            Some(key) => self.records.range::<Key, _>((Bound::Excluded(key), Bound::Unbounded)),
        };
        range.next().map(|(k, v)| (k.clone(), v.clone()))
    }
}
