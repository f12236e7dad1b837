//! In-process storage engine for Shelf.
//!
//! Implements the `shelf_core::engine` capability traits with IndexedDB-like
//! semantics: versioned databases, upgrade-only schema changes rolled back on
//! failure, unique and non-unique indexes, read-only transactions and live
//! forward cursors. Useful for native targets and for tests.

mod config;
mod dispatcher;
mod engine;
mod session;
mod state;

pub use config::{MemoryConfig, MemoryConfigBuilder};
pub use engine::MemoryEngine;
pub use session::MemorySession;
