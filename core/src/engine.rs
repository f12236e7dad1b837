//! The capability interface consumed from an underlying storage engine.
//!
//! Engines are callback driven: every request is issued together with the
//! callback that receives its terminal event. One-shot requests invoke their
//! callback exactly once. Cursor requests invoke theirs once per visited
//! record and a final time with `Ok(None)` when exhausted. Callbacks may run on
//! an engine-owned thread, so they must not block.
//!
//! The [`bridge`](crate::bridge) module turns these callbacks into futures
//! and streams.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::{Key, Value};

pub type EngineResult<T> = Result<T, EngineError>;

/// Receives the terminal event of a one-shot request.
pub type Callback<T> = Box<dyn FnOnce(EngineResult<T>) + Send + 'static>;

/// Receives every event of a cursor request.
pub type CursorCallback = Box<dyn FnMut(EngineResult<Option<Box<dyn Cursor>>>) + Send + 'static>;

/// Invoked inside the engine's upgrade transaction when a database is opened
/// with a version greater than the stored one.
pub type UpgradeHandler = Box<dyn FnOnce(&dyn Session, VersionChange) -> EngineResult<()> + Send + 'static>;

/// How a store derives the primary key of its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMode {
    /// The key is read from the record at this (dotted) attribute path.
    KeyPath(String),
    /// The engine assigns increasing integer keys, starting at 1.
    AutoIncrement,
}

impl KeyMode {
    /// An absent or empty key path selects auto-increment.
    pub fn from_key_path(key_path: Option<&str>) -> Self {
        match key_path {
            Some(path) if !path.is_empty() => KeyMode::KeyPath(path.to_owned()),
            _ => KeyMode::AutoIncrement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::ReadOnly => f.write_str("readonly"),
            TransactionMode::ReadWrite => f.write_str("readwrite"),
        }
    }
}

/// Versions involved in an upgrade. `old_version` is 0 for a new database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionChange {
    pub old_version: u32,
    pub new_version: u32,
}

/// Handlers attached to an open request.
pub struct OpenHandlers {
    pub upgrade_needed: Option<UpgradeHandler>,
    pub complete: Callback<Arc<dyn Session>>,
}

impl OpenHandlers {
    pub fn new(complete: Callback<Arc<dyn Session>>) -> Self { Self { upgrade_needed: None, complete } }

    pub fn with_upgrade(mut self, handler: UpgradeHandler) -> Self {
        self.upgrade_needed = Some(handler);
        self
    }
}

/// A storage engine able to host named, versioned databases.
pub trait StorageEngine: Send + Sync {
    /// Short identifier of the engine, used in logs.
    fn kind(&self) -> &'static str;

    /// Whether the engine is present in the current runtime.
    fn is_available(&self) -> bool;

    /// Opens (creating if absent) the named database at `version`.
    ///
    /// If `version` exceeds the stored version the upgrade handler runs first;
    /// an upgrade failure rolls the database back and fails the request.
    fn open(&self, name: &str, version: u32, handlers: OpenHandlers);

    /// Deletes the named database. Fails with [`EngineError::Blocked`] while
    /// sessions on it are open.
    fn delete_database(&self, name: &str, callback: Callback<()>);
}

/// An open connection to one database.
pub trait Session: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> u32;

    fn store_names(&self) -> Vec<String>;

    fn contains_store(&self, name: &str) -> bool { self.store_names().iter().any(|n| n == name) }

    /// Creates a store. Only valid during an upgrade.
    fn create_store(&self, name: &str, key_mode: KeyMode) -> EngineResult<Box<dyn ObjectStore>>;

    /// Drops a store with its indexes and records. Only valid during an upgrade.
    fn delete_store(&self, name: &str) -> EngineResult<()>;

    /// Starts a transaction over the named stores.
    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> EngineResult<Box<dyn Transaction>>;

    fn is_closed(&self) -> bool;

    fn close(&self, callback: Callback<()>);
}

pub trait Transaction: Send {
    fn mode(&self) -> TransactionMode;

    fn object_store(&self, name: &str) -> EngineResult<Box<dyn ObjectStore>>;
}

/// A record store, as seen through one transaction.
pub trait ObjectStore: Send {
    fn name(&self) -> &str;

    fn key_mode(&self) -> KeyMode;

    fn index_names(&self) -> Vec<String>;

    /// Creates a secondary index. Only valid during an upgrade.
    fn create_index(&self, name: &str, attr: &str, unique: bool) -> EngineResult<()>;

    /// Inserts a record; fails if its key or a unique index value is taken.
    fn add(&self, value: Value, key: Option<Key>, callback: Callback<Key>);

    /// Inserts or replaces a record.
    fn put(&self, value: Value, key: Option<Key>, callback: Callback<Key>);

    /// Removes the record at `key`; absent keys are not an error.
    fn delete(&self, key: Key, callback: Callback<()>);

    fn get(&self, key: Key, callback: Callback<Option<Value>>);

    fn clear(&self, callback: Callback<()>);

    fn index(&self, name: &str) -> EngineResult<Box<dyn Index>>;

    /// Opens a forward cursor over all records in key order.
    fn open_cursor(&self, callback: CursorCallback);
}

pub trait Index: Send {
    fn name(&self) -> &str;

    fn attr(&self) -> &str;

    fn unique(&self) -> bool;

    /// Fetches the first record (in primary key order) whose indexed
    /// attribute equals `value`.
    fn get(&self, value: Value, callback: Callback<Option<(Key, Value)>>);
}

/// A position in a cursor request.
pub trait Cursor: Send {
    fn key(&self) -> &Key;

    fn value(&self) -> &Value;

    /// Advances the cursor; the next event is delivered to the request's callback.
    fn continue_(self: Box<Self>);
}
