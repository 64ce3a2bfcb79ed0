//! Element trait definition

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::MarketResult;

/// Callback registered on an element for one event name.
pub type ElementListener = Rc<dyn Fn(&ElementEvent)>;

/// Identifies one listener registered on one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub u64);

/// An event fired by an element.
#[derive(Clone)]
pub struct ElementEvent {
    /// Event name
    pub event: String,
    /// Element the event originated from. Bound values are read from here.
    pub target: Rc<dyn Element>,
    /// Host event object, e.g. the DOM `Event` that triggered the listener.
    pub native: Option<Rc<dyn Any>>,
}

impl ElementEvent {
    pub fn new(event: impl Into<String>, target: Rc<dyn Element>) -> Self {
        Self {
            event: event.into(),
            target,
            native: None,
        }
    }

    /// Attach the host event object.
    pub fn with_native<T: Any>(mut self, native: T) -> Self {
        self.native = Some(Rc::new(native));
        self
    }

    /// Host event object, if one of type `T` was attached.
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.as_deref()?.downcast_ref()
    }
}

impl fmt::Debug for ElementEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementEvent")
            .field("event", &self.event)
            .field("native", &self.native.is_some())
            .finish_non_exhaustive()
    }
}

/// Anything that can fire named events and expose named attributes.
///
/// Attribute values are JSON so bound products persist unchanged. Browser
/// implementations read and write element properties (`value`, `checked`, ...).
pub trait Element {
    /// Register `listener` for `event`.
    fn add_event_listener(&self, event: &str, listener: ElementListener)
        -> MarketResult<ListenerToken>;

    /// Remove a listener previously returned by `add_event_listener`.
    /// Unknown tokens are ignored.
    fn remove_event_listener(&self, event: &str, token: ListenerToken);

    /// Current value of `attribute`, `None` if unset.
    fn get_attribute(&self, attribute: &str) -> Option<Value>;

    /// Write `value` to `attribute`.
    fn set_attribute(&self, attribute: &str, value: &Value) -> MarketResult<()>;
}
