//! Schema migrations.
//!
//! A migration runs only inside an engine upgrade, which the engine starts
//! when a database is opened with a version greater than its stored version.
//! Re-opening at an unchanged version never re-runs it.
//!
//! Table creation is idempotent: [`MigrationContext::create_table`] skips a
//! table that already exists, without diffing its indexes or merging data, so
//! running the same migration twice never duplicates indexes or seed records.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::{EngineResult, Session, UpgradeHandler, VersionChange};
use crate::error::EngineError;
use crate::schema::TableSpec;

/// An operation performed during a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOperation {
    CreateTable { name: String },
    /// The table already existed; nothing was changed.
    SkipTable { name: String },
    CreateIndex { table: String, index: String },
    Seed { table: String, records: usize },
    DropTable { name: String },
}

/// Schema operations available inside an upgrade.
pub struct MigrationContext<'a> {
    session: &'a dyn Session,
    change: VersionChange,
    operations: Vec<MigrationOperation>,
}

impl<'a> MigrationContext<'a> {
    pub fn new(session: &'a dyn Session, change: VersionChange) -> Self { Self { session, change, operations: Vec::new() } }

    pub fn version_change(&self) -> VersionChange { self.change }

    pub fn session(&self) -> &dyn Session { self.session }

    pub fn operations(&self) -> &[MigrationOperation] { &self.operations }

    pub fn has_table(&self, name: &str) -> bool { self.session.contains_store(name) }

    /// Creates a table with its indexes and seed records.
    ///
    /// Returns `false` without touching anything if the table already exists.
    /// A failing seed record is only logged here; the engine aborts the
    /// upgrade, and the open reports that abort to the caller.
    pub fn create_table(&mut self, spec: &TableSpec) -> EngineResult<bool> {
        if self.session.contains_store(&spec.name) {
            debug!("table {} already exists, skipping", spec.name);
            self.operations.push(MigrationOperation::SkipTable { name: spec.name.clone() });
            return Ok(false);
        }

        let store = self.session.create_store(&spec.name, spec.key_mode())?;
        self.operations.push(MigrationOperation::CreateTable { name: spec.name.clone() });

        for index in &spec.indexes {
            store.create_index(&index.name, &index.attr, index.unique)?;
            self.operations.push(MigrationOperation::CreateIndex { table: spec.name.clone(), index: index.name.clone() });
        }

        for record in &spec.seed {
            let table = spec.name.clone();
            store.add(
                record.clone(),
                None,
                Box::new(move |result| {
                    if let Err(e) = result {
                        warn!("seeding {} failed: {}", table, e);
                    }
                }),
            );
        }
        if !spec.seed.is_empty() {
            self.operations.push(MigrationOperation::Seed { table: spec.name.clone(), records: spec.seed.len() });
        }
        Ok(true)
    }

    /// Drops a table with its indexes and records.
    pub fn delete_table(&mut self, name: &str) -> EngineResult<()> {
        if !self.session.contains_store(name) {
            return Err(EngineError::NotFound(format!("table {name}")));
        }
        self.session.delete_store(name)?;
        self.operations.push(MigrationOperation::DropTable { name: name.to_owned() });
        Ok(())
    }
}

/// A step run inside an upgrade transaction.
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, ctx: &mut MigrationContext<'_>) -> EngineResult<()>;
}

/// Creates one table if it does not exist yet.
#[derive(Debug, Clone)]
pub struct TableMigration(pub TableSpec);

impl Migration for TableMigration {
    fn name(&self) -> &str { "create_table" }

    fn apply(&self, ctx: &mut MigrationContext<'_>) -> EngineResult<()> {
        ctx.create_table(&self.0)?;
        Ok(())
    }
}

/// Creates every table of a schema that does not exist yet.
#[derive(Debug, Clone)]
pub struct SchemaMigration(pub Vec<TableSpec>);

impl Migration for SchemaMigration {
    fn name(&self) -> &str { "create_schema" }

    fn apply(&self, ctx: &mut MigrationContext<'_>) -> EngineResult<()> {
        for table in &self.0 {
            ctx.create_table(table)?;
        }
        Ok(())
    }
}

/// Drops one table.
#[derive(Debug, Clone)]
pub struct DropTableMigration(pub String);

impl Migration for DropTableMigration {
    fn name(&self) -> &str { "drop_table" }

    fn apply(&self, ctx: &mut MigrationContext<'_>) -> EngineResult<()> { ctx.delete_table(&self.0) }
}

/// Leaves the schema untouched; used by a plain `open`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMigration;

impl Migration for NoMigration {
    fn name(&self) -> &str { "none" }

    fn apply(&self, _ctx: &mut MigrationContext<'_>) -> EngineResult<()> { Ok(()) }
}

/// Wraps a migration into the handler an engine invokes on upgrade.
pub fn upgrade_handler(migration: Arc<dyn Migration>) -> UpgradeHandler {
    Box::new(move |session: &dyn Session, change: VersionChange| {
        info!("upgrading {} from v{} to v{} ({})", session.name(), change.old_version, change.new_version, migration.name());
        let mut ctx = MigrationContext::new(session, change);
        let result = migration.apply(&mut ctx);
        match &result {
            Ok(()) => debug!("migration {} applied: {:?}", migration.name(), ctx.operations()),
            Err(e) => warn!("migration {} failed: {}", migration.name(), e),
        }
        result
    })
}
