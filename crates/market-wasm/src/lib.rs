//! Market WASM bridge
//!
//! Exposes markets to JavaScript. The JSON helpers in this module are shared
//! by the browser bindings and are plain Rust, so they are testable natively.
//!
//! # Features
//!
//! - `browser` - wasm-bindgen bindings (`useLocalMarket`, `useSessionMarket`,
//!   the `Market` class) over `market-webstorage`

#[cfg(feature = "browser")]
pub mod browser;

use market_core::{MarketEvent, Products};
use serde_json::Value;

/// Parse a JSON document into a product mapping.
///
/// An empty input, `null`, or `undefined` rendered as an empty string yields
/// an empty mapping; any non-object value is an error.
pub fn products_from_json(json: &str) -> Result<Products, String> {
    if json.trim().is_empty() {
        return Ok(Products::new());
    }
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(products)) => Ok(products),
        Ok(Value::Null) => Ok(Products::new()),
        Ok(other) => Err(format!("expected an object of products, got {}", other)),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

/// Serialize an event for JavaScript listeners.
pub fn event_to_json(event: &MarketEvent) -> Result<String, String> {
    serde_json::to_string(event).map_err(|e| format!("serialization failed: {}", e))
}

/// Get the market-core version.
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
