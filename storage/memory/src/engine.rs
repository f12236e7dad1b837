use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shelf_core::engine::{Callback, EngineResult, OpenHandlers, Session, StorageEngine, VersionChange};
use shelf_core::EngineError;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::dispatcher::Dispatcher;
use crate::session::{MemorySession, SessionFlags};
use crate::state::DatabaseState;

pub(crate) struct Shared {
    pub dispatcher: Dispatcher,
    databases: Mutex<HashMap<String, DatabaseState>>,
    next_session: AtomicU64,
}

impl Shared {
    pub fn databases(&self) -> MutexGuard<'_, HashMap<String, DatabaseState>> {
        self.databases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_database<T>(&self, name: &str, f: impl FnOnce(&mut DatabaseState) -> EngineResult<T>) -> EngineResult<T> {
        let mut databases = self.databases();
        let db = databases.get_mut(name).ok_or_else(|| EngineError::InvalidState(format!("database {name} no longer exists")))?;
        f(db)
    }
}

/// An in-process engine hosting named, versioned databases.
///
/// Requests are executed on a dedicated dispatcher thread, which is also where
/// every callback runs. Data lives as long as the engine (or any session
/// opened from it) does.
#[derive(Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
    config: MemoryConfig,
}

impl MemoryEngine {
    pub fn new() -> anyhow::Result<Self> { Self::with_config(MemoryConfig::default()) }

    pub fn with_config(config: MemoryConfig) -> anyhow::Result<Self> {
        let dispatcher = Dispatcher::spawn(&config.thread_name)?;
        let shared = Arc::new(Shared { dispatcher, databases: Mutex::new(HashMap::new()), next_session: AtomicU64::new(1) });
        Ok(Self { shared, config })
    }

    pub fn config(&self) -> &MemoryConfig { &self.config }

    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.databases().keys().cloned().collect();
        names.sort();
        names
    }

    /// The stored version of a database, if it exists.
    pub fn version_of(&self, name: &str) -> Option<u32> { self.shared.databases().get(name).map(|db| db.version) }

    /// Number of sessions currently open on a database.
    pub fn open_sessions(&self, name: &str) -> usize { self.shared.databases().get(name).map_or(0, DatabaseState::open_sessions) }
}

impl StorageEngine for MemoryEngine {
    fn kind(&self) -> &'static str { "memory" }

    fn is_available(&self) -> bool { self.config.available }

    fn open(&self, name: &str, version: u32, handlers: OpenHandlers) {
        let shared = self.shared.clone();
        let name = name.to_owned();
        self.shared.dispatcher.dispatch(move || open_blocking(shared, name, version, handlers));
    }

    fn delete_database(&self, name: &str, callback: Callback<()>) {
        let shared = self.shared.clone();
        let name = name.to_owned();
        self.shared.dispatcher.dispatch(move || {
            let result = {
                let mut databases = shared.databases();
                match databases.get(&name) {
                    Some(db) if db.open_sessions() > 0 => {
                        Err(EngineError::Blocked(format!("{} has {} open session(s)", name, db.open_sessions())))
                    }
                    Some(_) => {
                        databases.remove(&name);
                        info!("deleted database {}", name);
                        Ok(())
                    }
                    None => {
                        debug!("database {} does not exist, nothing to delete", name);
                        Ok(())
                    }
                }
            };
            callback(result);
        });
    }
}

enum Opened {
    Current(Arc<SessionFlags>),
    Upgrade { flags: Arc<SessionFlags>, old_version: u32, snapshot: DatabaseState },
}

fn open_blocking(shared: Arc<Shared>, name: String, version: u32, handlers: OpenHandlers) {
    let OpenHandlers { upgrade_needed, complete } = handlers;
    if version == 0 {
        complete(Err(EngineError::Version("version must be at least 1".into())));
        return;
    }

    let opened = {
        let mut databases = shared.databases();
        let db = databases.entry(name.clone()).or_default();
        if version < db.version {
            let err = EngineError::Version(format!("requested version {} is lower than the stored version {}", version, db.version));
            drop(databases);
            complete(Err(err));
            return;
        }

        let flags = Arc::new(SessionFlags::new(shared.next_session.fetch_add(1, Ordering::Relaxed)));
        if version == db.version {
            db.sessions.push(flags.clone());
            Opened::Current(flags)
        } else {
            for other in db.sessions.drain(..) {
                if !other.is_closed() {
                    warn!("{}: closing session {} for the upgrade to v{}", name, other.id, version);
                    other.close();
                }
            }
            let snapshot = DatabaseState { version: db.version, stores: db.stores.clone(), sessions: Vec::new() };
            let old_version = db.version;
            db.version = version;
            flags.set_upgrading(true);
            db.sessions.push(flags.clone());
            Opened::Upgrade { flags, old_version, snapshot }
        }
    };

    match opened {
        Opened::Current(flags) => {
            debug!("{}: opened v{} (session {})", name, version, flags.id);
            complete(Ok(Arc::new(MemorySession::new(shared, name, version, flags))));
        }
        Opened::Upgrade { flags, old_version, snapshot } => {
            let session = Arc::new(MemorySession::new(shared.clone(), name.clone(), version, flags.clone()));
            let change = VersionChange { old_version, new_version: version };
            let result = match upgrade_needed {
                Some(handler) => handler(session.as_ref(), change),
                None => Ok(()),
            };
            let result = result.and_then(|()| flags.take_upgrade_error().map_or(Ok(()), Err));
            flags.set_upgrading(false);

            match result {
                Ok(()) => {
                    info!("{}: upgraded from v{} to v{}", name, old_version, version);
                    complete(Ok(session));
                }
                Err(e) => {
                    warn!("{}: upgrade to v{} failed, rolling back: {}", name, version, e);
                    flags.close();
                    {
                        let mut databases = shared.databases();
                        if old_version == 0 {
                            databases.remove(&name);
                        } else if let Some(db) = databases.get_mut(&name) {
                            db.version = snapshot.version;
                            db.stores = snapshot.stores;
                            db.detach(flags.id);
                        }
                    }
                    drop(session);
                    complete(Err(EngineError::Aborted(format!("upgrade of {name} to v{version} failed: {e}"))));
                }
            }
        }
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine").field("config", &self.config).field("databases", &self.database_names()).finish()
    }
}
