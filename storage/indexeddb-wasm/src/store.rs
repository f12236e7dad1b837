//! Object stores, indexes and cursors over `web_sys` handles.

use std::cell::RefCell;
use std::rc::Rc;

use send_wrapper::SendWrapper;
use shelf_core::engine::{Callback, Cursor, CursorCallback, EngineResult, Index, KeyMode, ObjectStore};
use shelf_core::value::{Key, Value};
use shelf_core::EngineError;
use tracing::{error, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{IdbCursorWithValue, IdbIndex, IdbIndexParameters, IdbObjectStore, IdbRequest};

use crate::error::{js_error, request_error};
use crate::util::convert::{key_from_js, key_to_js, string_list, value_from_js, value_to_js};
use crate::util::listeners::{on_settled, Listeners};
use crate::util::require::WBGRequire;

pub(crate) fn key_mode_of(store: &IdbObjectStore) -> KeyMode {
    let key_path = store.key_path().ok().and_then(|path| path.as_string());
    KeyMode::from_key_path(key_path.as_deref())
}

pub(crate) struct IdbStore {
    store: SendWrapper<IdbObjectStore>,
    name: String,
    key_mode: KeyMode,
    upgrading: bool,
}

impl IdbStore {
    pub fn new(store: IdbObjectStore, upgrading: bool) -> Self {
        let name = store.name();
        let key_mode = key_mode_of(&store);
        Self { store: SendWrapper::new(store), name, key_mode, upgrading }
    }

    /// Issues a request, reporting a synchronous throw through the callback.
    fn issue<T: 'static>(
        &self,
        context: &'static str,
        callback: Callback<T>,
        make: impl FnOnce(&IdbObjectStore) -> EngineResult<IdbRequest>,
        map: impl FnOnce(JsValue) -> EngineResult<T> + 'static,
    ) {
        match make(&self.store) {
            Ok(request) => on_settled(&request, context, callback, map),
            Err(e) => callback(Err(e)),
        }
    }

    fn write(&self, value: Value, key: Option<Key>, callback: Callback<Key>, replace: bool) {
        let context = if replace { "put record" } else { "add record" };
        self.issue(
            context,
            callback,
            |store| {
                let value = value_to_js(&value)?;
                let request = match (key.as_ref().map(key_to_js), replace) {
                    (Some(key), false) => store.add_with_key(&value, &key),
                    (None, false) => store.add(&value),
                    (Some(key), true) => store.put_with_key(&value, &key),
                    (None, true) => store.put(&value),
                };
                request.require(context)
            },
            |key| key_from_js(&key),
        )
    }
}

impl ObjectStore for IdbStore {
    fn name(&self) -> &str { &self.name }

    fn key_mode(&self) -> KeyMode { self.key_mode.clone() }

    fn index_names(&self) -> Vec<String> { string_list(self.store.index_names()) }

    fn create_index(&self, name: &str, attr: &str, unique: bool) -> EngineResult<()> {
        if !self.upgrading {
            return Err(EngineError::InvalidState("cannot create an index outside of a version change".into()));
        }
        let params = IdbIndexParameters::new();
        params.set_unique(unique);
        self.store.create_index_with_str_and_optional_parameters(name, attr, &params).require("create index")?;
        Ok(())
    }

    fn add(&self, value: Value, key: Option<Key>, callback: Callback<Key>) { self.write(value, key, callback, false) }

    fn put(&self, value: Value, key: Option<Key>, callback: Callback<Key>) { self.write(value, key, callback, true) }

    fn delete(&self, key: Key, callback: Callback<()>) {
        self.issue("delete record", callback, |store| store.delete(&key_to_js(&key)).require("delete record"), |_| Ok(()))
    }

    fn get(&self, key: Key, callback: Callback<Option<Value>>) {
        self.issue(
            "get record",
            callback,
            |store| store.get(&key_to_js(&key)).require("get record"),
            |value| if value.is_undefined() { Ok(None) } else { value_from_js(value).map(Some) },
        )
    }

    fn clear(&self, callback: Callback<()>) { self.issue("clear store", callback, |store| store.clear().require("clear store"), |_| Ok(())) }

    fn index(&self, name: &str) -> EngineResult<Box<dyn Index>> {
        let index = self.store.index(name).require("get index")?;
        Ok(Box::new(IdbIndexHandle::new(index)))
    }

    fn open_cursor(&self, callback: CursorCallback) {
        match self.store.open_cursor().require("open cursor") {
            Ok(request) => watch_cursor(request, callback),
            Err(e) => {
                let mut callback = callback;
                callback(Err(e));
            }
        }
    }
}

struct IdbIndexHandle {
    index: SendWrapper<IdbIndex>,
    name: String,
    attr: String,
    unique: bool,
}

impl IdbIndexHandle {
    fn new(index: IdbIndex) -> Self {
        let name = index.name();
        let attr = index.key_path().ok().and_then(|path| path.as_string()).unwrap_or_default();
        let unique = index.unique();
        Self { index: SendWrapper::new(index), name, attr, unique }
    }
}

impl Index for IdbIndexHandle {
    fn name(&self) -> &str { &self.name }

    fn attr(&self) -> &str { &self.attr }

    fn unique(&self) -> bool { self.unique }

    /// The first cursor position over the matching range yields both the
    /// primary key and the record in one request.
    fn get(&self, value: Value, callback: Callback<Option<(Key, Value)>>) {
        let request = Key::from_value(&value).and_then(|key| self.index.open_cursor_with_range(&key_to_js(&key)).require("query index"));
        match request {
            Ok(request) => on_settled(&request, "query index", callback, |result| {
                if result.is_null() || result.is_undefined() {
                    return Ok(None);
                }
                let cursor: IdbCursorWithValue = result.unchecked_into();
                let key = key_from_js(&cursor.primary_key().require("read primary key")?)?;
                let value = value_from_js(cursor.value().require("read record")?)?;
                Ok(Some((key, value)))
            }),
            Err(e) => callback(Err(e)),
        }
    }
}

type SharedCallback = Rc<RefCell<Option<CursorCallback>>>;

fn deliver(callback: &SharedCallback, event: EngineResult<Option<Box<dyn Cursor>>>) {
    match callback.try_borrow_mut() {
        Ok(mut slot) => match slot.as_mut() {
            Some(cb) => cb(event),
            None => warn!("cursor event after the cursor finished"),
        },
        Err(_) => error!("cursor callback re-entered"),
    }
}

/// Forwards every `success` of a cursor request to `callback` until the
/// cursor is exhausted or fails.
fn watch_cursor(request: IdbRequest, callback: CursorCallback) {
    let callback: SharedCallback = Rc::new(RefCell::new(Some(callback)));
    let listeners = Listeners::new();

    let on_event = {
        let request = request.clone();
        let callback = callback.clone();
        let listeners = listeners.clone();
        move |event: web_sys::Event| {
            let next = if event.type_() == "success" { request.result().map_err(|e| js_error(e, "advance cursor")) } else { Err(request_error(&request, "advance cursor")) };
            let finished = match next {
                Ok(result) if result.is_null() || result.is_undefined() => {
                    deliver(&callback, Ok(None));
                    true
                }
                Ok(result) => match IdbCursorHandle::new(result.unchecked_into(), callback.clone()) {
                    Ok(cursor) => {
                        deliver(&callback, Ok(Some(Box::new(cursor))));
                        false
                    }
                    Err(e) => {
                        deliver(&callback, Err(e));
                        true
                    }
                },
                Err(e) => {
                    deliver(&callback, Err(e));
                    true
                }
            };
            if finished {
                request.set_onsuccess(None);
                request.set_onerror(None);
                callback.borrow_mut().take();
                listeners.release();
            }
        }
    };

    let handler = listeners.wrap(on_event);
    request.set_onsuccess(Some(&handler));
    request.set_onerror(Some(&handler));
}

struct IdbCursorHandle {
    key: Key,
    value: Value,
    cursor: SendWrapper<IdbCursorWithValue>,
    callback: SendWrapper<SharedCallback>,
}

impl IdbCursorHandle {
    fn new(cursor: IdbCursorWithValue, callback: SharedCallback) -> EngineResult<Self> {
        let key = key_from_js(&cursor.primary_key().require("read primary key")?)?;
        let value = value_from_js(cursor.value().require("read record")?)?;
        Ok(Self { key, value, cursor: SendWrapper::new(cursor), callback: SendWrapper::new(callback) })
    }
}

impl Cursor for IdbCursorHandle {
    fn key(&self) -> &Key { &self.key }

    fn value(&self) -> &Value { &self.value }

    fn continue_(self: Box<Self>) {
        if let Err(e) = self.cursor.continue_() {
            // usually the transaction committed because the consumer paused
            deliver(&self.callback, Err(js_error(e, "continue cursor")));
        }
    }
}
