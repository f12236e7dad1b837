//! Sessions, transactions, stores, indexes and cursors of the memory engine.
//!
//! Requests made through a transaction are queued on the dispatcher and
//! complete asynchronously. Requests made during an upgrade run inline, on
//! the dispatcher thread that is executing the upgrade; a failed request
//! marks the upgrade as failed so the engine rolls it back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use shelf_core::engine::{Callback, Cursor, CursorCallback, EngineResult, Index, KeyMode, ObjectStore, Session, Transaction, TransactionMode};
use shelf_core::value::{Key, Value};
use shelf_core::EngineError;
use tracing::debug;

use crate::engine::Shared;
use crate::state::StoreState;

#[derive(Debug)]
pub(crate) struct SessionFlags {
    pub id: u64,
    closed: AtomicBool,
    upgrading: AtomicBool,
    upgrade_error: Mutex<Option<EngineError>>,
}

impl SessionFlags {
    pub fn new(id: u64) -> Self {
        Self { id, closed: AtomicBool::new(false), upgrading: AtomicBool::new(false), upgrade_error: Mutex::new(None) }
    }

    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

    pub fn close(&self) { self.closed.store(true, Ordering::Release) }

    pub fn is_upgrading(&self) -> bool { self.upgrading.load(Ordering::Acquire) }

    pub fn set_upgrading(&self, upgrading: bool) { self.upgrading.store(upgrading, Ordering::Release) }

    /// Records the first failure of a request issued during the upgrade.
    pub fn fail_upgrade(&self, err: EngineError) {
        self.upgrade_error.lock().unwrap_or_else(PoisonError::into_inner).get_or_insert(err);
    }

    pub fn take_upgrade_error(&self) -> Option<EngineError> { self.upgrade_error.lock().unwrap_or_else(PoisonError::into_inner).take() }
}

/// What a store handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Upgrade,
    Transaction(TransactionMode),
}

/// Everything a handle needs to reach its database.
#[derive(Clone)]
struct Handle {
    shared: Arc<Shared>,
    database: String,
    flags: Arc<SessionFlags>,
}

impl Handle {
    fn with_store<T>(&self, store: &str, f: impl FnOnce(&mut StoreState) -> EngineResult<T>) -> EngineResult<T> {
        self.shared.with_database(&self.database, |db| f(db.store_mut(store)?))
    }
}

pub struct MemorySession {
    handle: Handle,
    version: u32,
}

impl MemorySession {
    pub(crate) fn new(shared: Arc<Shared>, database: String, version: u32, flags: Arc<SessionFlags>) -> Self {
        Self { handle: Handle { shared, database, flags }, version }
    }

    fn require_upgrade(&self, what: &str) -> EngineResult<()> {
        if self.handle.flags.is_upgrading() {
            Ok(())
        } else {
            Err(EngineError::InvalidState(format!("cannot {what} outside of a version change")))
        }
    }

    fn detach(&self) {
        self.handle.flags.close();
        if let Some(db) = self.handle.shared.databases().get_mut(&self.handle.database) {
            db.detach(self.handle.flags.id);
        }
    }
}

impl Session for MemorySession {
    fn name(&self) -> &str { &self.handle.database }

    fn version(&self) -> u32 { self.version }

    fn store_names(&self) -> Vec<String> {
        self.handle.shared.databases().get(&self.handle.database).map(|db| db.stores.keys().cloned().collect()).unwrap_or_default()
    }

    fn create_store(&self, name: &str, key_mode: KeyMode) -> EngineResult<Box<dyn ObjectStore>> {
        self.require_upgrade("create an object store")?;
        self.handle.shared.with_database(&self.handle.database, |db| {
            if db.stores.contains_key(name) {
                return Err(EngineError::Constraint(format!("object store {name} already exists")));
            }
            db.stores.insert(name.to_owned(), StoreState::new(key_mode.clone()));
            Ok(())
        })?;
        debug!("{}: created object store {} ({:?})", self.handle.database, name, key_mode);
        Ok(Box::new(MemoryStore { handle: self.handle.clone(), name: name.to_owned(), key_mode, scope: Scope::Upgrade }))
    }

    fn delete_store(&self, name: &str) -> EngineResult<()> {
        self.require_upgrade("delete an object store")?;
        self.handle.shared.with_database(&self.handle.database, |db| {
            db.stores.remove(name).map(|_| ()).ok_or_else(|| EngineError::NotFound(format!("object store {name}")))
        })?;
        debug!("{}: deleted object store {}", self.handle.database, name);
        Ok(())
    }

    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> EngineResult<Box<dyn Transaction>> {
        if self.handle.flags.is_closed() {
            return Err(EngineError::InvalidState(format!("the session on {} is closed", self.handle.database)));
        }
        if self.handle.flags.is_upgrading() {
            return Err(EngineError::InvalidState("a version change transaction is running".into()));
        }
        if stores.is_empty() {
            return Err(EngineError::InvalidState("a transaction needs at least one object store".into()));
        }
        self.handle.shared.with_database(&self.handle.database, |db| {
            for store in stores {
                db.store(store)?;
            }
            Ok(())
        })?;
        let stores = stores.iter().map(|s| (*s).to_owned()).collect();
        Ok(Box::new(MemoryTransaction { handle: self.handle.clone(), stores, mode }))
    }

    fn is_closed(&self) -> bool { self.handle.flags.is_closed() }

    fn close(&self, callback: Callback<()>) {
        self.detach();
        debug!("{}: session {} closed", self.handle.database, self.handle.flags.id);
        self.handle.shared.dispatcher.dispatch(move || callback(Ok(())));
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if !self.handle.flags.is_closed() {
            self.detach();
        }
    }
}

struct MemoryTransaction {
    handle: Handle,
    stores: Vec<String>,
    mode: TransactionMode,
}

impl Transaction for MemoryTransaction {
    fn mode(&self) -> TransactionMode { self.mode }

    fn object_store(&self, name: &str) -> EngineResult<Box<dyn ObjectStore>> {
        if !self.stores.iter().any(|s| s == name) {
            return Err(EngineError::NotFound(format!("object store {name} is not in the transaction scope")));
        }
        let key_mode = self.handle.with_store(name, |store| Ok(store.key_mode.clone()))?;
        Ok(Box::new(MemoryStore { handle: self.handle.clone(), name: name.to_owned(), key_mode, scope: Scope::Transaction(self.mode) }))
    }
}

#[derive(Clone)]
struct MemoryStore {
    handle: Handle,
    name: String,
    key_mode: KeyMode,
    scope: Scope,
}

impl MemoryStore {
    /// Executes a request against this store and delivers its result.
    fn run<T, F>(&self, callback: Callback<T>, writes: bool, op: F)
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreState) -> EngineResult<T> + Send + 'static,
    {
        let dispatcher = &self.handle.shared.dispatcher;
        if writes && self.scope == Scope::Transaction(TransactionMode::ReadOnly) {
            let err = EngineError::ReadOnly(format!("cannot write to {} in a readonly transaction", self.name));
            dispatcher.dispatch(move || callback(Err(err)));
            return;
        }

        let handle = self.handle.clone();
        let store = self.name.clone();
        match self.scope {
            Scope::Upgrade => {
                let result = if handle.flags.is_upgrading() {
                    handle.with_store(&store, op)
                } else {
                    Err(EngineError::InvalidState("the version change transaction has finished".into()))
                };
                if let Err(e) = &result {
                    handle.flags.fail_upgrade(e.clone());
                }
                callback(result);
            }
            Scope::Transaction(_) => dispatcher.dispatch(move || {
                let result = handle.with_store(&store, op);
                callback(result);
            }),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn name(&self) -> &str { &self.name }

    fn key_mode(&self) -> KeyMode { self.key_mode.clone() }

    fn index_names(&self) -> Vec<String> { self.handle.with_store(&self.name, |store| Ok(store.index_names())).unwrap_or_default() }

    fn create_index(&self, name: &str, attr: &str, unique: bool) -> EngineResult<()> {
        if self.scope != Scope::Upgrade || !self.handle.flags.is_upgrading() {
            return Err(EngineError::InvalidState("cannot create an index outside of a version change".into()));
        }
        self.handle.with_store(&self.name, |store| store.create_index(name, attr, unique))?;
        debug!("{}: created index {} on {}.{} (unique: {})", self.handle.database, name, self.name, attr, unique);
        Ok(())
    }

    fn add(&self, value: Value, key: Option<Key>, callback: Callback<Key>) { self.run(callback, true, move |store| store.add(value, key)) }

    fn put(&self, value: Value, key: Option<Key>, callback: Callback<Key>) { self.run(callback, true, move |store| store.put(value, key)) }

    fn delete(&self, key: Key, callback: Callback<()>) {
        self.run(callback, true, move |store| {
            store.delete(&key);
            Ok(())
        })
    }

    fn get(&self, key: Key, callback: Callback<Option<Value>>) { self.run(callback, false, move |store| Ok(store.get(&key))) }

    fn clear(&self, callback: Callback<()>) {
        self.run(callback, true, |store| {
            store.clear();
            Ok(())
        })
    }

    fn index(&self, name: &str) -> EngineResult<Box<dyn Index>> {
        let (attr, unique) = self.handle.with_store(&self.name, |store| {
            let index = store.index(name)?;
            Ok((index.attr.clone(), index.unique))
        })?;
        Ok(Box::new(MemoryIndex { store: self.clone(), name: name.to_owned(), attr, unique }))
    }

    fn open_cursor(&self, callback: CursorCallback) {
        let request = Arc::new(CursorRequest { store: self.clone(), callback: Mutex::new(Some(callback)) });
        request.advance(None);
    }
}

struct MemoryIndex {
    store: MemoryStore,
    name: String,
    attr: String,
    unique: bool,
}

impl Index for MemoryIndex {
    fn name(&self) -> &str { &self.name }

    fn attr(&self) -> &str { &self.attr }

    fn unique(&self) -> bool { self.unique }

    fn get(&self, value: Value, callback: Callback<Option<(Key, Value)>>) {
        let name = self.name.clone();
        self.store.run(callback, false, move |store| store.index_get(&name, &Key::from_value(&value)?))
    }
}

/// A live forward cursor: each step looks up the first key after the
/// previous one, so records written between steps are observed.
struct CursorRequest {
    store: MemoryStore,
    callback: Mutex<Option<CursorCallback>>,
}

impl CursorRequest {
    fn advance(self: Arc<Self>, after: Option<Key>) {
        let dispatcher = self.store.handle.shared.dispatcher.clone();
        dispatcher.dispatch(move || {
            let next = self.store.handle.with_store(&self.store.name, |store| Ok(store.next_after(after.as_ref())));
            let Some(mut callback) = self.callback.lock().unwrap_or_else(PoisonError::into_inner).take() else {
                return;
            };
            match next {
                Ok(Some((key, value))) => {
                    callback(Ok(Some(Box::new(MemoryCursor { key, value, request: self.clone() }))));
                    *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
                }
                Ok(None) => callback(Ok(None)),
                Err(e) => callback(Err(e)),
            }
        });
    }
}

struct MemoryCursor {
    key: Key,
    value: Value,
    request: Arc<CursorRequest>,
}

impl Cursor for MemoryCursor {
    fn key(&self) -> &Key { &self.key }

    fn value(&self) -> &Value { &self.value }

    fn continue_(self: Box<Self>) {
        let MemoryCursor { key, request, .. } = *self;
        request.advance(Some(key));
    }
}
