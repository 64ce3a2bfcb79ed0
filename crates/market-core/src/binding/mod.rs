//! Two-way binding between element attributes and products
//!
//! A [`Subscription`] names an element, the event to listen for, the
//! attribute to read, and the product to write. The market registers one
//! listener per subscription and hands back a [`SubscriptionId`] that is later
//! used to detach exactly that listener.

mod element;
mod memory;

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

pub use element::{Element, ElementEvent, ElementListener, ListenerToken};
pub use memory::MemoryElement;

use crate::market::Market;

/// Called after a bound element has written its value into the market.
pub type SubscriptionCallback = Rc<dyn Fn(&ElementEvent, &Market)>;

/// Handle returned by `Market::subscribe_element`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// Declarative rule syncing one element attribute with one product.
#[derive(Clone)]
pub struct Subscription {
    /// Element to listen on
    pub element: Rc<dyn Element>,
    /// Event name, e.g. `"input"` or `"change"`
    pub event: String,
    /// Attribute read from the event target and written on initial sync
    pub attribute: String,
    /// Product key the attribute is stored under
    pub product: String,
    /// Written to the element when the product is absent at subscription time
    pub default: Option<Value>,
    pub callback: Option<SubscriptionCallback>,
}

impl Subscription {
    pub fn new(
        element: Rc<dyn Element>,
        event: impl Into<String>,
        attribute: impl Into<String>,
        product: impl Into<String>,
    ) -> Self {
        Self {
            element,
            event: event.into(),
            attribute: attribute.into(),
            product: product.into(),
            default: None,
            callback: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ElementEvent, &Market) + 'static,
    {
        self.callback = Some(Rc::new(callback));
        self
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("attribute", &self.attribute)
            .field("product", &self.product)
            .field("default", &self.default)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}
