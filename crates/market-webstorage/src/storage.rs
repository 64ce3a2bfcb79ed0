//! `localStorage` / `sessionStorage` backend implementing `market_core::Storage`

use std::fmt;

use market_core::{Storage, StorageError, StorageResult};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::error::{js_error_message, Result, WebStorageError};

/// Browser persistence scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Survives reloads and browser restarts
    Local,
    /// Cleared when the tab's session ends
    Session,
}

impl StorageScope {
    /// Property name on the global object.
    pub fn global_name(&self) -> &'static str {
        match self {
            StorageScope::Local => "localStorage",
            StorageScope::Session => "sessionStorage",
        }
    }
}

impl fmt::Display for StorageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.global_name())
    }
}

/// Market storage backed by a browser `Storage` object.
#[derive(Debug, Clone)]
pub struct WebStorage {
    storage: web_sys::Storage,
    scope: StorageScope,
}

impl WebStorage {
    /// Look up the storage object for `scope` on the global object.
    ///
    /// Fails when the scope is missing (workers, some embedded contexts) or
    /// when the browser denies access (third-party iframes, disabled storage).
    pub fn open(scope: StorageScope) -> Result<Self> {
        let global = js_sys::global();

        let value: JsValue = js_sys::Reflect::get(&global, &scope.global_name().into())
            .map_err(|e| WebStorageError::NotAvailable(format!("{}: {}", scope, js_error_message(&e))))?;

        if value.is_undefined() || value.is_null() {
            return Err(WebStorageError::NotAvailable(format!(
                "{} is null/undefined",
                scope
            )));
        }

        let storage = value
            .dyn_into::<web_sys::Storage>()
            .map_err(|_| WebStorageError::NotAvailable(format!("{} is not Storage", scope)))?;

        tracing::debug!(%scope, "opened web storage");
        Ok(Self { storage, scope })
    }

    pub fn local() -> Result<Self> {
        Self::open(StorageScope::Local)
    }

    pub fn session() -> Result<Self> {
        Self::open(StorageScope::Session)
    }

    pub fn scope(&self) -> StorageScope {
        self.scope
    }

    /// Number of keys in the underlying storage, across all markets.
    pub fn len(&self) -> Result<u32> {
        Ok(self.storage.length()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn backend_error(op: &str, key: &str, err: JsValue) -> StorageError {
    StorageError::Backend(format!("{} '{}': {}", op, key, js_error_message(&err)))
}

impl Storage for WebStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| backend_error("getItem", key, e))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| backend_error("setItem", key, e))
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| backend_error("removeItem", key, e))
    }
}
