use std::cell::RefCell;
use std::rc::Rc;

use shelf_core::engine::{Callback, EngineResult};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, IdbRequest};

use crate::error::request_error;

/// Keeps a request's event handlers alive until it settles.
///
/// Handlers cannot be dropped while one of them is running, so `release`
/// hands them to a later microtask.
#[derive(Clone, Default)]
pub(crate) struct Listeners(Rc<RefCell<Vec<Closure<dyn FnMut(Event)>>>>);

impl Listeners {
    pub fn new() -> Self { Self::default() }

    /// Wraps `handler` and returns the function to install on the request.
    pub fn wrap(&self, handler: impl FnMut(Event) + 'static) -> js_sys::Function {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        let function = closure.as_ref().unchecked_ref::<js_sys::Function>().clone();
        self.0.borrow_mut().push(closure);
        function
    }

    pub fn release(&self) {
        let closures = std::mem::take(&mut *self.0.borrow_mut());
        wasm_bindgen_futures::spawn_local(async move { drop(closures) });
    }
}

/// Routes the single terminal event (`success` or `error`) of a one-shot
/// request to `callback`, converting the request result with `map`.
pub(crate) fn on_settled<T: 'static>(
    request: &IdbRequest,
    context: &'static str,
    callback: Callback<T>,
    map: impl FnOnce(JsValue) -> EngineResult<T> + 'static,
) {
    let target = request.clone();
    // one function serves both events, and exactly one of them fires
    let handler = Closure::once_into_js(move |event: Event| {
        let result = if event.type_() == "success" {
            target.result().map_err(|e| crate::error::js_error(e, context)).and_then(map)
        } else {
            Err(request_error(&target, context))
        };
        target.set_onsuccess(None);
        target.set_onerror(None);
        callback(result);
    });
    request.set_onsuccess(Some(handler.unchecked_ref()));
    request.set_onerror(Some(handler.unchecked_ref()));
}
