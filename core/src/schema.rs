//! Declarative table and schema definitions.
//!
//! These are plain serde types so a whole schema can be kept in a config file:
//!
//! ```json
//! {
//!   "name": "shop",
//!   "version": 1,
//!   "tables": [
//!     { "name": "items", "indexes": [{ "name": "sku", "attr": "sku", "unique": true }],
//!       "seed": [{ "sku": "A1", "price": 10 }] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::KeyMode;
use crate::error::AccessError;
use crate::value::Value;

/// A secondary index on one record attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    /// Attribute path the index reads from each record.
    pub attr: String,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, attr: impl Into<String>) -> Self {
        Self { name: name.into(), attr: attr.into(), unique: false }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A table definition: key mode, indexes and seed records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    /// Primary key attribute; absent or empty selects auto-increment keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// Records inserted right after the table is created.
    #[serde(default)]
    pub seed: Vec<Value>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), key_path: None, indexes: Vec::new(), seed: Vec::new() }
    }

    pub fn key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn seed(mut self, records: impl IntoIterator<Item = Value>) -> Self {
        self.seed.extend(records);
        self
    }

    pub fn key_mode(&self) -> KeyMode { KeyMode::from_key_path(self.key_path.as_deref()) }
}

/// A named, versioned collection of tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

impl SchemaSpec {
    pub fn new(name: impl Into<String>, version: u32) -> Self { Self { name: name.into(), version, tables: Vec::new() } }

    pub fn table(mut self, table: TableSpec) -> Self {
        self.tables.push(table);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, AccessError> { Ok(serde_json::from_str(json)?) }
}
