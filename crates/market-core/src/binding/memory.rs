//! In-memory element
//!
//! Stands in for a DOM node in tests and headless hosts. Events are fired
//! explicitly with [`MemoryElement::fire`].

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::binding::element::{Element, ElementEvent, ElementListener, ListenerToken};
use crate::error::MarketResult;

#[derive(Default)]
struct ElementState {
    attributes: HashMap<String, Value>,
    listeners: Vec<(String, ListenerToken, ElementListener)>,
    next_token: u64,
}

/// Element backed by a map of attributes. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryElement {
    state: Rc<RefCell<ElementState>>,
}

impl MemoryElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute assignment.
    pub fn with_attribute(self, attribute: impl Into<String>, value: Value) -> Self {
        self.state
            .borrow_mut()
            .attributes
            .insert(attribute.into(), value);
        self
    }

    /// Assign an attribute without notifying anyone, like a user typing.
    pub fn put(&self, attribute: impl Into<String>, value: Value) {
        self.state
            .borrow_mut()
            .attributes
            .insert(attribute.into(), value);
    }

    /// Fire `event` with this element as target. Returns the number of
    /// listeners invoked.
    pub fn fire(&self, event: &str) -> usize {
        self.dispatch(ElementEvent::new(event, Rc::new(self.clone())))
    }

    /// Like [`MemoryElement::fire`], attaching `native` as the host event.
    pub fn fire_with<T: Any>(&self, event: &str, native: T) -> usize {
        self.dispatch(ElementEvent::new(event, Rc::new(self.clone())).with_native(native))
    }

    fn dispatch(&self, element_event: ElementEvent) -> usize {
        let event = element_event.event.as_str();
        let listeners: Vec<ElementListener> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|(name, _, _)| name == event)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(&element_event);
        }
        listeners.len()
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|(name, _, _)| name == event)
            .count()
    }
}

impl Element for MemoryElement {
    fn add_event_listener(
        &self,
        event: &str,
        listener: ElementListener,
    ) -> MarketResult<ListenerToken> {
        let mut state = self.state.borrow_mut();
        state.next_token += 1;
        let token = ListenerToken(state.next_token);
        state.listeners.push((event.to_string(), token, listener));
        Ok(token)
    }

    fn remove_event_listener(&self, event: &str, token: ListenerToken) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|(name, t, _)| !(name == event && *t == token));
    }

    fn get_attribute(&self, attribute: &str) -> Option<Value> {
        self.state.borrow().attributes.get(attribute).cloned()
    }

    fn set_attribute(&self, attribute: &str, value: &Value) -> MarketResult<()> {
        self.put(attribute, value.clone());
        Ok(())
    }
}
