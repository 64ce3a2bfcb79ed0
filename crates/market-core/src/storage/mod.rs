//! Storage abstraction for market snapshots
//!
//! A market persists its whole product mapping as one JSON string under its
//! own id. Backends only need the three key-value calls of the browser
//! `Storage` interface:
//!
//! - **Memory**: in-process storage for tests and non-browser hosts (`MemoryStorage`)
//! - **Web storage**: `localStorage` / `sessionStorage` (separate crate, WASM only)
//!
//! # Example
//!
//! ```rust
//! use market_core::storage::{MemoryStorage, Storage};
//!
//! let storage = MemoryStorage::new();
//! storage.set_item("prefs", r#"{"theme":"dark"}"#).unwrap();
//!
//! assert_eq!(storage.get_item("prefs").unwrap().as_deref(), Some(r#"{"theme":"dark"}"#));
//! storage.remove_item("prefs").unwrap();
//! assert!(storage.get_item("prefs").unwrap().is_none());
//! ```

mod error;
mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use traits::Storage;
