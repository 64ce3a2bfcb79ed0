//! Market core
//!
//! A small client-side state container: a named mapping of JSON "products",
//! persisted as one JSON snapshot to a key-value storage backend, with
//! change events, two-way element bindings, and a queue for deferred async
//! work. Designed to run identically in the browser (WASM) and natively.
//!
//! # Example
//!
//! ```rust
//! use market_core::{EventBus, Market, MemoryStorage, Storage};
//! use serde_json::json;
//!
//! let storage = MemoryStorage::new();
//! storage.set_item("prefs", r#"{"theme":"dark","lang":"en"}"#).unwrap();
//!
//! let market = Market::builder("prefs")
//!     .default_product("theme", json!("light"))
//!     .storage(storage.clone())
//!     .bus(EventBus::new())
//!     .build()
//!     .unwrap();
//!
//! // Persisted values win over defaults
//! assert_eq!(market.get("theme"), Some(json!("dark")));
//! assert_eq!(market.get("lang"), Some(json!("en")));
//!
//! market.remove(["lang"]).unwrap();
//! assert_eq!(storage.get_item("prefs").unwrap().as_deref(), Some(r#"{"theme":"dark"}"#));
//! ```

pub mod binding;
pub mod bus;
pub mod error;
pub mod event;
pub mod market;
pub mod queue;
pub mod storage;

// Re-export main types at crate root
pub use binding::{
    Element, ElementEvent, ElementListener, ListenerToken, MemoryElement, Subscription,
    SubscriptionCallback, SubscriptionId,
};
pub use bus::{event_name, EventBus, Listener, ListenerId};
pub use error::{MarketError, MarketResult, TaskError};
pub use event::{EventDetails, MarketEvent, MarketEventKind, Products, RemovedProducts};
pub use market::{Market, MarketBuilder};
pub use queue::{Queue, Task};
pub use storage::{MemoryStorage, Storage, StorageError, StorageResult};
