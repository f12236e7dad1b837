use shelf_core::EngineError;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{DomException, IdbRequest};

pub(crate) fn extract_message(err: &JsValue) -> String {
    // If it's a JS Error object, grab its `message`
    if let Some(e) = err.dyn_ref::<js_sys::Error>() {
        return format!("{}: {}", e.name(), e.message());
    }

    // If it's already a string, convert directly
    if let Some(s) = err.as_string() {
        return s;
    }

    // Fallback: stringify the value
    js_sys::JSON::stringify(err).ok().and_then(|s| s.as_string()).unwrap_or_else(|| format!("{:?}", err))
}

/// Maps an IndexedDB exception name onto an [`EngineError`].
pub(crate) fn from_exception(name: &str, message: String) -> EngineError {
    match name {
        "ConstraintError" => EngineError::Constraint(message),
        "NotFoundError" => EngineError::NotFound(message),
        "InvalidStateError" | "InvalidAccessError" | "TransactionInactiveError" => EngineError::InvalidState(message),
        "ReadOnlyError" => EngineError::ReadOnly(message),
        "VersionError" => EngineError::Version(message),
        "DataError" | "DataCloneError" => EngineError::Data(message),
        "AbortError" => EngineError::Aborted(message),
        _ => EngineError::Other(format!("{name}: {message}")),
    }
}

/// Converts a thrown JS value, usually a `DOMException`, into an [`EngineError`].
pub(crate) fn js_error(err: JsValue, context: &str) -> EngineError {
    match err.dyn_ref::<DomException>() {
        Some(exception) => from_exception(&exception.name(), format!("{} - {}", context, exception.message())),
        None => EngineError::Other(format!("{} - {}", context, extract_message(&err))),
    }
}

/// The error a failed request settled with.
pub(crate) fn request_error(request: &IdbRequest, context: &str) -> EngineError {
    match request.error() {
        Ok(Some(exception)) => from_exception(&exception.name(), format!("{} - {}", context, exception.message())),
        Ok(None) => EngineError::Other(format!("{context}: unknown error")),
        Err(e) => js_error(e, context),
    }
}
