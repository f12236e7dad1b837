use shelf_core::engine::EngineResult;
use shelf_core::EngineError;
use wasm_bindgen::JsValue;

use crate::error::js_error;

/// Helper trait a bit like expect, except it's tailored for wasm-bindgen use cases
/// This helps eliminate a lot of boilerplate code associated with error type conversions
pub trait WBGRequire<T> {
    fn require(self, context: &'static str) -> EngineResult<T>;
}
impl<T> WBGRequire<T> for Result<T, JsValue> {
    fn require(self, context: &'static str) -> EngineResult<T> { self.map_err(|e| js_error(e, context)) }
}
impl<T> WBGRequire<T> for Option<T> {
    fn require(self, context: &'static str) -> EngineResult<T> { self.ok_or_else(|| EngineError::Other(format!("{context} is None"))) }
}
impl<T> WBGRequire<T> for Result<Option<T>, JsValue> {
    fn require(self, context: &'static str) -> EngineResult<T> {
        match self {
            Ok(Some(res)) => Ok(res),
            Ok(None) => Err(EngineError::Other(format!("{context} is None"))),
            Err(e) => Err(js_error(e, context)),
        }
    }
}
