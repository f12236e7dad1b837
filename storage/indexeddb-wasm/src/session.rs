use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use send_wrapper::SendWrapper;
use shelf_core::engine::{Callback, EngineResult, KeyMode, ObjectStore, Session, Transaction, TransactionMode};
use shelf_core::EngineError;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{IdbDatabase, IdbObjectStoreParameters, IdbTransaction, IdbTransactionMode, IdbVersionChangeEvent};

use crate::store::IdbStore;
use crate::util::convert::string_list;
use crate::util::require::WBGRequire;

/// An open IndexedDB connection.
///
/// The browser asks open connections to close when another one upgrades the
/// database; the session complies and reports itself closed from then on.
pub struct IdbSession {
    db: SendWrapper<IdbDatabase>,
    name: String,
    version: u32,
    /// Present while the session is handed to an upgrade handler.
    upgrade: Option<SendWrapper<IdbTransaction>>,
    closed: Arc<AtomicBool>,
    _onversionchange: Option<SendWrapper<Closure<dyn FnMut(IdbVersionChangeEvent)>>>,
}

impl IdbSession {
    pub(crate) fn open(db: IdbDatabase) -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        let closed_for_cb = closed.clone();
        let onversionchange = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
            closed_for_cb.store(true, Ordering::SeqCst);
            if let Some(target) = event.target() {
                warn!("Version change event received - closing database");
                let db: IdbDatabase = target.unchecked_into();
                db.close();
            }
        }) as Box<dyn FnMut(IdbVersionChangeEvent)>);
        db.set_onversionchange(Some(onversionchange.as_ref().unchecked_ref()));

        let name = db.name();
        let version = db.version() as u32;
        Self { db: SendWrapper::new(db), name, version, upgrade: None, closed, _onversionchange: Some(SendWrapper::new(onversionchange)) }
    }

    pub(crate) fn upgrading(db: IdbDatabase, transaction: IdbTransaction, version: u32) -> Self {
        let name = db.name();
        Self {
            db: SendWrapper::new(db),
            name,
            version,
            upgrade: Some(SendWrapper::new(transaction)),
            closed: Arc::new(AtomicBool::new(false)),
            _onversionchange: None,
        }
    }

    /// Aborts the upgrade transaction; the pending open request then fails.
    pub(crate) fn abort_upgrade(&self) {
        if let Some(transaction) = &self.upgrade {
            if let Err(e) = transaction.abort() {
                warn!("{}: failed to abort the upgrade: {}", self.name, crate::error::extract_message(&e));
            }
        }
    }

    fn require_upgrade(&self, what: &str) -> EngineResult<()> {
        match self.upgrade {
            Some(_) => Ok(()),
            None => Err(EngineError::InvalidState(format!("cannot {what} outside of a version change"))),
        }
    }
}

impl Session for IdbSession {
    fn name(&self) -> &str { &self.name }

    fn version(&self) -> u32 { self.version }

    fn store_names(&self) -> Vec<String> { string_list(self.db.object_store_names()) }

    fn contains_store(&self, name: &str) -> bool { self.db.object_store_names().contains(name) }

    fn create_store(&self, name: &str, key_mode: KeyMode) -> EngineResult<Box<dyn ObjectStore>> {
        self.require_upgrade("create an object store")?;
        let params = IdbObjectStoreParameters::new();
        match &key_mode {
            KeyMode::KeyPath(path) => params.set_key_path(&JsValue::from_str(path)),
            KeyMode::AutoIncrement => params.set_auto_increment(true),
        }
        let store = self.db.create_object_store_with_optional_parameters(name, &params).require("create object store")?;
        debug!("{}: created object store {} ({:?})", self.name, name, key_mode);
        Ok(Box::new(IdbStore::new(store, true)))
    }

    fn delete_store(&self, name: &str) -> EngineResult<()> {
        self.require_upgrade("delete an object store")?;
        self.db.delete_object_store(name).require("delete object store")?;
        debug!("{}: deleted object store {}", self.name, name);
        Ok(())
    }

    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> EngineResult<Box<dyn Transaction>> {
        if self.is_closed() {
            return Err(EngineError::InvalidState(format!("the session on {} is closed", self.name)));
        }
        let names = js_sys::Array::new();
        for store in stores {
            names.push(&JsValue::from_str(store));
        }
        let idb_mode = match mode {
            TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
            TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
        };
        let transaction = self.db.transaction_with_str_sequence_and_mode(&names, idb_mode).require("start transaction")?;
        Ok(Box::new(IdbTransactionHandle { transaction: SendWrapper::new(transaction), mode }))
    }

    fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

    fn close(&self, callback: Callback<()>) {
        self.db.set_onversionchange(None);
        self.db.close();
        self.closed.store(true, Ordering::SeqCst);
        callback(Ok(()));
    }
}

struct IdbTransactionHandle {
    transaction: SendWrapper<IdbTransaction>,
    mode: TransactionMode,
}

impl Transaction for IdbTransactionHandle {
    fn mode(&self) -> TransactionMode { self.mode }

    fn object_store(&self, name: &str) -> EngineResult<Box<dyn ObjectStore>> {
        let store = self.transaction.object_store(name).require("get object store")?;
        Ok(Box::new(IdbStore::new(store, false)))
    }
}
