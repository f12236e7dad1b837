//! # Shelf
//!
//! Shelf is an asynchronous access layer over versioned, transactional object
//! stores, modelled on IndexedDB. It manages one database session per
//! [`ConnectionManager`], runs idempotent table creation as part of a version
//! upgrade, and exposes per-table CRUD and index lookups as futures.
//!
//! ## Engines
//!
//! - **memory** (default): an in-process engine, see [`memory`]
//! - **indexeddb**: the browser's IndexedDB, for `wasm32` targets
//!
//! ## Example
//!
//! ```rust
//! # use shelf::{json, IndexSpec, TableSpec};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = shelf::in_memory()?;
//!
//!     let items = TableSpec::new("items").key_path("id").index(IndexSpec::new("sku", "sku").unique());
//!     db.create_db("shop", 1, items).await?;
//!
//!     db.save_data("items", json!({"id": 1, "sku": "A1", "name": "kettle"})).await?;
//!     let kettle = db.get_data_by_key("items", "sku", "A1").await?;
//!     assert_eq!(kettle.value["name"], "kettle");
//!
//!     db.close_db().await?;
//!     Ok(())
//! # }
//! ```

pub use serde_json::json;
pub use shelf_core as core;
pub use shelf_core::{
    bridge::CursorStream,
    engine,
    error,
    migration::{Migration, MigrationContext, MigrationOperation},
    AccessError, ConnectionManager, ConnectionStatus, EngineError, ErrorKind, IndexSpec, Key, KeyMode, Record, SchemaSpec,
    StorageEngine, TableSpec, Value,
};

#[cfg(feature = "memory")]
pub use shelf_storage_memory as memory;

#[cfg(feature = "indexeddb")]
pub use shelf_storage_indexeddb_wasm as indexeddb;

/// A connection manager over a fresh in-process engine.
#[cfg(feature = "memory")]
pub fn in_memory() -> anyhow::Result<ConnectionManager> {
    let engine = shelf_storage_memory::MemoryEngine::new()?;
    tracing::debug!("created in-memory engine");
    Ok(ConnectionManager::new(std::sync::Arc::new(engine)))
}

/// A connection manager over the browser's IndexedDB.
#[cfg(feature = "indexeddb")]
pub fn indexeddb() -> ConnectionManager { ConnectionManager::new(std::sync::Arc::new(shelf_storage_indexeddb_wasm::IndexedDbEngine::new())) }
