//! Error types for the browser storage backend

use market_core::MarketError;
use thiserror::Error;

/// Result type for browser storage operations
pub type Result<T> = std::result::Result<T, WebStorageError>;

/// Errors that can occur while opening or using browser storage
#[derive(Debug, Error)]
pub enum WebStorageError {
    /// The storage scope is not available in this environment
    #[error("web storage not available: {0}")]
    NotAvailable(String),

    /// A JavaScript call threw
    #[error("JS error: {0}")]
    Js(String),

    /// Market construction or mutation failed
    #[error(transparent)]
    Market(#[from] MarketError),
}

impl From<wasm_bindgen::JsValue> for WebStorageError {
    fn from(val: wasm_bindgen::JsValue) -> Self {
        WebStorageError::Js(js_error_message(&val))
    }
}

/// Best-effort human readable text for a thrown JS value.
///
/// DOMExceptions (quota, security) are reported as `"Name: message"`.
pub fn js_error_message(val: &wasm_bindgen::JsValue) -> String {
    use wasm_bindgen::JsCast;

    if let Some(exception) = val.dyn_ref::<web_sys::DomException>() {
        return format!("{}: {}", exception.name(), exception.message());
    }
    if let Some(s) = val.as_string() {
        return s;
    }
    js_sys::JSON::stringify(val)
        .ok()
        .and_then(|s| s.as_string())
        .unwrap_or_else(|| format!("{:?}", val))
}
