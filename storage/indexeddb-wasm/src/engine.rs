use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use shelf_core::engine::{Callback, EngineResult, OpenHandlers, Session, StorageEngine, VersionChange};
use shelf_core::EngineError;
use tracing::{debug, info, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Event, IdbDatabase, IdbFactory, IdbVersionChangeEvent};

use crate::error::request_error;
use crate::session::IdbSession;
use crate::util::listeners::Listeners;
use crate::util::require::WBGRequire;

/// Global names under which browsers have exposed the IndexedDB factory.
const FACTORY_NAMES: [&str; 4] = ["indexedDB", "webkitIndexedDB", "mozIndexedDB", "msIndexedDB"];

/// Finds the IndexedDB factory on the global object (window or worker).
pub fn factory() -> EngineResult<IdbFactory> {
    let global = js_sys::global();
    for name in FACTORY_NAMES {
        if let Ok(factory) = js_sys::Reflect::get(&global, &JsValue::from_str(name)) {
            if !factory.is_undefined() && !factory.is_null() {
                return Ok(factory.unchecked_into());
            }
        }
    }
    Err(EngineError::Unavailable("IndexedDB is not available in this runtime".into()))
}

/// The browser's IndexedDB, exposed through the Shelf engine traits.
///
/// Callbacks run on the browser event loop. Handles are wrapped in
/// `SendWrapper` since the engine traits are `Send`; they must stay on the
/// thread that created them, which is the only thread in a browser.
#[derive(Debug, Default, Clone)]
pub struct IndexedDbEngine;

impl IndexedDbEngine {
    pub fn new() -> Self { Self }
}

type Slot<T> = Rc<RefCell<Option<T>>>;

fn settle<T>(slot: &Slot<Callback<T>>, result: EngineResult<T>) {
    let callback = slot.borrow_mut().take();
    match callback {
        Some(callback) => callback(result),
        None => debug!("request already settled"),
    }
}

impl StorageEngine for IndexedDbEngine {
    fn kind(&self) -> &'static str { "indexeddb" }

    fn is_available(&self) -> bool { factory().is_ok() }

    fn open(&self, name: &str, version: u32, handlers: OpenHandlers) {
        let OpenHandlers { upgrade_needed, complete } = handlers;
        if version == 0 {
            complete(Err(EngineError::Version("version must be at least 1".into())));
            return;
        }
        let request = match factory().and_then(|f| f.open_with_u32(name, version).require("open database")) {
            Ok(request) => request,
            Err(e) => return complete(Err(e)),
        };

        let listeners = Listeners::new();
        let complete: Slot<Callback<Arc<dyn Session>>> = Rc::new(RefCell::new(Some(complete)));
        let upgrade_error: Slot<EngineError> = Rc::new(RefCell::new(None));
        let db_name = name.to_owned();

        let on_upgrade = {
            let request = request.clone();
            let upgrade_error = upgrade_error.clone();
            let db_name = db_name.clone();
            let mut handler = upgrade_needed;
            move |event: Event| {
                let event: IdbVersionChangeEvent = event.unchecked_into();
                let change = VersionChange {
                    old_version: event.old_version() as u32,
                    new_version: event.new_version().map_or(version, |v| v as u32),
                };
                info!("upgrading {} from v{} to v{}", db_name, change.old_version, change.new_version);
                let db = request.result().require("get upgrading database").map(|db| db.unchecked_into::<IdbDatabase>());
                let transaction = request.transaction().require("get upgrade transaction");
                let (db, transaction) = match (db, transaction) {
                    (Ok(db), Ok(transaction)) => (db, transaction),
                    (Err(e), _) | (_, Err(e)) => {
                        *upgrade_error.borrow_mut() = Some(e);
                        return;
                    }
                };
                let session = IdbSession::upgrading(db, transaction, version);
                let result = match handler.take() {
                    Some(handler) => handler(&session, change),
                    None => Ok(()),
                };
                if let Err(e) = result {
                    warn!("{}: upgrade to v{} failed, aborting: {}", db_name, version, e);
                    *upgrade_error.borrow_mut() = Some(e);
                    session.abort_upgrade();
                }
            }
        };

        let on_settled = {
            let request = request.clone();
            let listeners = listeners.clone();
            move |event: Event| {
                let result = if event.type_() == "success" {
                    request.result().require("get database").map(|db| Arc::new(IdbSession::open(db.unchecked_into())) as Arc<dyn Session>)
                } else {
                    let cause = request_error(&request, "open database");
                    let upgrade_failure = upgrade_error.borrow_mut().take();
                    match upgrade_failure {
                        Some(e) => Err(EngineError::Aborted(format!("upgrade of {db_name} to v{version} failed: {e}"))),
                        None => Err(cause),
                    }
                };
                request.set_onupgradeneeded(None);
                request.set_onsuccess(None);
                request.set_onerror(None);
                request.set_onblocked(None);
                settle(&complete, result);
                listeners.release();
            }
        };

        let on_blocked = {
            let name = name.to_owned();
            move |_event: Event| warn!("{}: open is waiting for other connections to close", name)
        };

        let upgrade_fn = listeners.wrap(on_upgrade);
        let settled_fn = listeners.wrap(on_settled);
        let blocked_fn = listeners.wrap(on_blocked);
        request.set_onupgradeneeded(Some(&upgrade_fn));
        request.set_onsuccess(Some(&settled_fn));
        request.set_onerror(Some(&settled_fn));
        request.set_onblocked(Some(&blocked_fn));
    }

    /// A delete blocked by open connections fails with `Blocked` right away.
    /// The browser keeps the request pending and deletes the database once
    /// those connections close.
    fn delete_database(&self, name: &str, callback: Callback<()>) {
        let request = match factory().and_then(|f| f.delete_database(name).require("delete database")) {
            Ok(request) => request,
            Err(e) => return callback(Err(e)),
        };

        let listeners = Listeners::new();
        let callback: Slot<Callback<()>> = Rc::new(RefCell::new(Some(callback)));

        let on_event = {
            let request = request.clone();
            let listeners = listeners.clone();
            let name = name.to_owned();
            move |event: Event| match event.type_().as_str() {
                "blocked" => settle(&callback, Err(EngineError::Blocked(format!("{name} has open connections")))),
                kind => {
                    let result = if kind == "success" { Ok(()) } else { Err(request_error(&request, "delete database")) };
                    settle(&callback, result);
                    request.set_onsuccess(None);
                    request.set_onerror(None);
                    request.set_onblocked(None);
                    listeners.release();
                }
            }
        };
        let handler = listeners.wrap(on_event);
        request.set_onsuccess(Some(&handler));
        request.set_onerror(Some(&handler));
        request.set_onblocked(Some(&handler));
    }
}
