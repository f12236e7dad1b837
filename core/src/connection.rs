//! The connection manager: one active session per manager.
//!
//! Every operation reaches the engine through the session the manager
//! currently tracks. The manager is an ordinary value, so independent managers
//! (or test doubles) can coexist without sharing state.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::bridge::request;
use crate::engine::{OpenHandlers, Session, StorageEngine};
use crate::error::AccessError;
use crate::migration::{upgrade_handler, DropTableMigration, Migration, NoMigration, SchemaMigration, TableMigration};
use crate::schema::{SchemaSpec, TableSpec};

/// Lifecycle of the tracked session: closed → opening → open → closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Closed,
    Opening,
    Open,
}

#[derive(Clone)]
pub struct ConnectionManager(Arc<Inner>);

struct Inner {
    engine: Arc<dyn StorageEngine>,
    state: RwLock<State>,
}

struct State {
    session: Option<Arc<dyn Session>>,
    status: ConnectionStatus,
}

impl ConnectionManager {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self(Arc::new(Inner { engine, state: RwLock::new(State { session: None, status: ConnectionStatus::Closed }) }))
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> { &self.0.engine }

    /// Capability probe: whether the underlying engine exists in this runtime.
    pub fn is_supported(&self) -> bool { self.0.engine.is_available() }

    pub fn status(&self) -> ConnectionStatus { self.read().status }

    /// Returns the raw tracked session, bypassing every check of this layer.
    ///
    /// After [`close_db`](Self::close_db) this is still the closed session.
    pub fn session(&self) -> Option<Arc<dyn Session>> { self.read().session.clone() }

    /// Opens (creating if absent) the named database at `version`.
    ///
    /// On success the new session replaces the tracked one; a previously
    /// tracked session is not closed. On failure the tracked session is kept.
    pub async fn open(&self, name: &str, version: u32) -> Result<(), AccessError> {
        self.open_with(name, version, Arc::new(NoMigration)).await
    }

    /// Opens the database and, if `version` exceeds the stored version,
    /// creates `table` with its indexes and seed records unless it exists.
    pub async fn create_db(&self, name: &str, version: u32, table: TableSpec) -> Result<(), AccessError> {
        self.open_with(name, version, Arc::new(TableMigration(table))).await
    }

    /// Opens a whole declarative schema, creating every missing table on upgrade.
    pub async fn open_schema(&self, schema: &SchemaSpec) -> Result<(), AccessError> {
        self.open_with(&schema.name, schema.version, Arc::new(SchemaMigration(schema.tables.clone()))).await
    }

    /// Opens the database, running `migration` only if the engine reports an upgrade.
    pub async fn open_with(&self, name: &str, version: u32, migration: Arc<dyn Migration>) -> Result<(), AccessError> {
        if !self.is_supported() {
            return Err(AccessError::NotSupported(format!("{} engine is not available", self.0.engine.kind())));
        }

        self.write().status = ConnectionStatus::Opening;
        debug!("opening {} v{} on {}", name, version, self.0.engine.kind());

        let engine = self.0.engine.clone();
        let result =
            request(|cb| engine.open(name, version, OpenHandlers::new(cb).with_upgrade(upgrade_handler(migration)))).await;

        let mut state = self.write();
        match result {
            Ok(session) => {
                if let Some(old) = state.session.as_ref().filter(|old| !old.is_closed()) {
                    debug!("replacing tracked session {} without closing it", old.name());
                }
                info!("opened {} v{}", session.name(), session.version());
                state.session = Some(session);
                state.status = ConnectionStatus::Open;
                Ok(())
            }
            Err(e) => {
                warn!("failed to open {} v{}: {}", name, version, e);
                // overlapping opens may have replaced the session meanwhile
                state.status = match &state.session {
                    Some(session) if !session.is_closed() => ConnectionStatus::Open,
                    _ => ConnectionStatus::Closed,
                };
                Err(e.into())
            }
        }
    }

    /// Closes the tracked session. Fails if no session is open.
    pub async fn close_db(&self) -> Result<(), AccessError> {
        let session = self.active()?;
        request(|cb| session.close(cb)).await?;
        self.write().status = ConnectionStatus::Closed;
        info!("closed {}", session.name());
        Ok(())
    }

    /// Deletes the named database with all of its tables.
    ///
    /// Fails while any session on it is open, including the tracked one.
    pub async fn delete_db(&self, name: &str) -> Result<(), AccessError> {
        if !self.is_supported() {
            return Err(AccessError::NotSupported(format!("{} engine is not available", self.0.engine.kind())));
        }
        let engine = self.0.engine.clone();
        request(|cb| engine.delete_database(name, cb)).await?;
        info!("deleted database {}", name);
        Ok(())
    }

    /// Creates a table on the open database.
    ///
    /// Schema changes need an upgrade, so the session is reopened at the next
    /// version with a migration creating the table.
    pub async fn create_table(&self, table: TableSpec) -> Result<(), AccessError> {
        let session = self.active()?;
        if session.contains_store(&table.name) {
            return Err(AccessError::AlreadyExists(format!("table {}", table.name)));
        }
        self.reopen_with(session, Arc::new(TableMigration(table))).await
    }

    /// Drops a table with its indexes and records, via a version upgrade.
    pub async fn delete_table(&self, name: &str) -> Result<(), AccessError> {
        let session = self.active()?;
        if !session.contains_store(name) {
            return Err(AccessError::NotFound(format!("table {name}")));
        }
        self.reopen_with(session, Arc::new(DropTableMigration(name.to_owned()))).await
    }

    async fn reopen_with(&self, session: Arc<dyn Session>, migration: Arc<dyn Migration>) -> Result<(), AccessError> {
        let name = session.name().to_owned();
        let version = session
            .version()
            .checked_add(1)
            .ok_or_else(|| AccessError::NotSupported(format!("{name} is at the highest possible version")))?;
        request(|cb| session.close(cb)).await?;
        self.write().status = ConnectionStatus::Closed;
        match self.open_with(&name, version, migration).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("upgrading {} failed, reopening at v{}", name, session.version());
                if let Err(reopen) = self.open(&name, session.version()).await {
                    warn!("failed to reopen {}: {}", name, reopen);
                }
                Err(e)
            }
        }
    }

    /// The tracked session, provided it is open.
    pub(crate) fn active(&self) -> Result<Arc<dyn Session>, AccessError> {
        let state = self.read();
        match (&state.session, state.status) {
            (Some(session), ConnectionStatus::Open) if !session.is_closed() => Ok(session.clone()),
            _ => Err(AccessError::session_closed()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> { self.0.state.read().unwrap_or_else(PoisonError::into_inner) }

    fn write(&self) -> RwLockWriteGuard<'_, State> { self.0.state.write().unwrap_or_else(PoisonError::into_inner) }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("ConnectionManager")
            .field("engine", &self.0.engine.kind())
            .field("session", &state.session.as_ref().map(|s| s.name().to_owned()))
            .field("status", &state.status)
            .finish()
    }
}
