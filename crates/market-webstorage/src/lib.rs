//! Browser storage backend for markets (browser WASM)
//!
//! Connects `market-core` to the two standard browser persistence scopes and
//! to DOM event targets:
//!
//! - [`WebStorage`] implements `market_core::Storage` over `localStorage` or
//!   `sessionStorage`.
//! - [`DomElement`] implements `market_core::Element` over any DOM
//!   `EventTarget`, reading and writing element properties.
//! - [`use_local_market`] and [`use_session_market`] build a ready market for
//!   each scope.
//!
//! # Example
//!
//! ```rust,ignore
//! use market_webstorage::{use_local_market, DomElement};
//! use market_core::Subscription;
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! let market = use_local_market("settings", json!({"theme": "light"}).as_object().cloned().unwrap())?;
//!
//! let input: web_sys::EventTarget = document.get_element_by_id("theme").unwrap().into();
//! market.subscribe_element(Subscription::new(
//!     Rc::new(DomElement::new(input)),
//!     "change",
//!     "value",
//!     "theme",
//! ))?;
//! ```

pub mod element;
pub mod error;
pub mod storage;

use market_core::{Market, Products};

pub use element::DomElement;
pub use error::{js_error_message, Result, WebStorageError};
pub use storage::{StorageScope, WebStorage};

/// Create a market persisted in `localStorage`.
pub fn use_local_market(market_id: &str, default_products: Products) -> Result<Market> {
    use_market(market_id, default_products, StorageScope::Local)
}

/// Create a market persisted in `sessionStorage`.
pub fn use_session_market(market_id: &str, default_products: Products) -> Result<Market> {
    use_market(market_id, default_products, StorageScope::Session)
}

/// Create a market persisted in the given scope, on the global event bus.
pub fn use_market(market_id: &str, default_products: Products, scope: StorageScope) -> Result<Market> {
    let storage = WebStorage::open(scope)?;
    let market = Market::new(market_id, default_products, storage)?;
    Ok(market)
}
