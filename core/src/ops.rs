//! Per-table record operations.
//!
//! Each operation opens exactly one transaction over one table (read-only for
//! reads, read-write for mutations) and issues exactly one request on it, so
//! every call is atomic on its own. Sequences of calls are not.

use futures::TryStreamExt;
use tracing::debug;

use crate::bridge::{cursor_stream, request, CursorStream};
use crate::connection::ConnectionManager;
use crate::engine::{ObjectStore, TransactionMode};
use crate::error::AccessError;
use crate::value::{Key, Record, Value};

impl ConnectionManager {
    fn object_store(&self, table: &str, mode: TransactionMode) -> Result<Box<dyn ObjectStore>, AccessError> {
        let session = self.active()?;
        let transaction = session.transaction(&[table], mode)?;
        Ok(transaction.object_store(table)?)
    }

    /// Inserts a record and returns its key.
    ///
    /// Fails with `ConstraintViolation` if the key or a unique index value is taken.
    pub async fn save_data(&self, table: &str, record: Value) -> Result<Key, AccessError> {
        let store = self.object_store(table, TransactionMode::ReadWrite)?;
        let key = request(|cb| store.add(record, None, cb)).await?;
        debug!("{}: saved {}", table, key);
        Ok(key)
    }

    /// Removes the record at `key`. Removing an absent key succeeds.
    pub async fn delete_data(&self, table: &str, key: impl Into<Key>) -> Result<(), AccessError> {
        let key = key.into();
        let store = self.object_store(table, TransactionMode::ReadWrite)?;
        request(|cb| store.delete(key.clone(), cb)).await?;
        debug!("{}: deleted {}", table, key);
        Ok(())
    }

    /// Upserts a record: replaces the record with the same key or inserts it.
    ///
    /// For key-path tables the record must carry its key. Failures are
    /// reported like any other operation.
    pub async fn update_data(&self, table: &str, record: Value) -> Result<Key, AccessError> {
        let store = self.object_store(table, TransactionMode::ReadWrite)?;
        let key = request(|cb| store.put(record, None, cb)).await?;
        debug!("{}: updated {}", table, key);
        Ok(key)
    }

    /// Upserts a record under an explicit key, for auto-increment tables.
    pub async fn update_data_at(&self, table: &str, key: impl Into<Key>, record: Value) -> Result<Key, AccessError> {
        let store = self.object_store(table, TransactionMode::ReadWrite)?;
        let key = request(|cb| store.put(record, Some(key.into()), cb)).await?;
        debug!("{}: updated {}", table, key);
        Ok(key)
    }

    /// Fetches a record by primary key.
    pub async fn get_data(&self, table: &str, key: impl Into<Key>) -> Result<Record, AccessError> {
        let key = key.into();
        let store = self.object_store(table, TransactionMode::ReadOnly)?;
        match request(|cb| store.get(key.clone(), cb)).await? {
            Some(value) => Ok(Record::new(key, value)),
            None => Err(AccessError::NotFound(format!("no record with key {key} in {table}"))),
        }
    }

    /// Fetches the first record whose `index` attribute equals `value`.
    ///
    /// Fails with `NotFound` if the index does not exist or nothing matches.
    pub async fn get_data_by_key(&self, table: &str, index: &str, value: impl Into<Value>) -> Result<Record, AccessError> {
        let value = value.into();
        let store = self.object_store(table, TransactionMode::ReadOnly)?;
        let index_ref = store.index(index)?;
        match request(|cb| index_ref.get(value.clone(), cb)).await? {
            Some((key, record)) => Ok(Record::new(key, record)),
            None => Err(AccessError::NotFound(format!("no record with {index} = {value} in {table}"))),
        }
    }

    /// Streams the table's records in key order.
    ///
    /// The scan is lazy: the cursor moves only as items are pulled.
    pub fn scan(&self, table: &str) -> Result<CursorStream, AccessError> {
        let store = self.object_store(table, TransactionMode::ReadOnly)?;
        Ok(cursor_stream(|cb| store.open_cursor(cb)))
    }

    /// Reads every record of the table, in key order, into memory.
    pub async fn get_all(&self, table: &str) -> Result<Vec<Record>, AccessError> {
        let records: Vec<Record> = self.scan(table)?.try_collect().await?;
        debug!("{}: read {} records", table, records.len());
        Ok(records)
    }

    /// Removes every record of the table.
    pub async fn clear_data(&self, table: &str) -> Result<(), AccessError> {
        let store = self.object_store(table, TransactionMode::ReadWrite)?;
        request(|cb| store.clear(cb)).await?;
        debug!("{}: cleared", table);
        Ok(())
    }
}
