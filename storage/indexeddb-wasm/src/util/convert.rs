use serde::Serialize;
use shelf_core::engine::EngineResult;
use shelf_core::value::{Key, Value};
use shelf_core::EngineError;
use wasm_bindgen::JsValue;

/// Serializes a record value into a plain JS object graph.
pub(crate) fn value_to_js(value: &Value) -> EngineResult<JsValue> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible()).map_err(|e| EngineError::Data(e.to_string()))
}

pub(crate) fn value_from_js(value: JsValue) -> EngineResult<Value> {
    serde_wasm_bindgen::from_value(value).map_err(|e| EngineError::Data(e.to_string()))
}

pub(crate) fn key_to_js(key: &Key) -> JsValue {
    match key {
        Key::Integer(i) => JsValue::from_f64(*i as f64),
        Key::String(s) => JsValue::from_str(s),
    }
}

pub(crate) fn key_from_js(key: &JsValue) -> EngineResult<Key> {
    if let Some(s) = key.as_string() {
        return Ok(Key::String(s));
    }
    match key.as_f64() {
        Some(n) if n.fract() == 0.0 && n.abs() <= (1u64 << 53) as f64 => Ok(Key::Integer(n as i64)),
        _ => Err(EngineError::Data(format!("unsupported key {:?}", key))),
    }
}

/// Reads a `DOMStringList` into owned strings.
pub(crate) fn string_list(list: web_sys::DomStringList) -> Vec<String> { (0..list.length()).filter_map(|i| list.get(i)).collect() }
