//! # Shelf Core
//!
//! An asynchronous access layer over versioned, transactional object stores.
//!
//! - [`engine`]: the callback-driven capability interface an engine implements
//! - [`bridge`]: adapters turning engine callbacks into futures and streams
//! - [`migration`]: version-gated, idempotent table creation
//! - [`ConnectionManager`]: database lifecycle plus per-table CRUD and lookups
//!
//! Every public operation resolves to `Result<T, AccessError>`.

pub mod bridge;
pub mod connection;
pub mod engine;
pub mod error;
pub mod migration;
mod ops;
pub mod schema;
pub mod value;

pub use connection::{ConnectionManager, ConnectionStatus};
pub use engine::{KeyMode, StorageEngine, TransactionMode};
pub use error::{AccessError, EngineError, ErrorKind};
pub use schema::{IndexSpec, SchemaSpec, TableSpec};
pub use value::{Key, Record, Value};
