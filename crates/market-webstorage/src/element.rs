//! DOM event target implementing `market_core::Element`
//!
//! Attributes are element *properties* (`input.value`, `input.checked`, ...),
//! read and written with `Reflect` and converted through `JSON`, so anything a
//! market can persist can be bound.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use market_core::{Element, ElementEvent, ElementListener, ListenerToken, MarketError, MarketResult};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::EventTarget;

use crate::error::js_error_message;

type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

/// A DOM node (or any `EventTarget`) usable in market subscriptions.
///
/// Clones share the listener registry, so a listener added through one clone
/// can be removed through another.
#[derive(Clone)]
pub struct DomElement {
    target: EventTarget,
    closures: Rc<RefCell<HashMap<ListenerToken, EventClosure>>>,
    next_token: Rc<Cell<u64>>,
}

impl DomElement {
    pub fn new(target: impl Into<EventTarget>) -> Self {
        Self {
            target: target.into(),
            closures: Rc::default(),
            next_token: Rc::default(),
        }
    }

    pub fn target(&self) -> &EventTarget {
        &self.target
    }

    /// Number of listeners this handle keeps alive.
    pub fn listener_count(&self) -> usize {
        self.closures.borrow().len()
    }
}

impl Element for DomElement {
    fn add_event_listener(
        &self,
        event: &str,
        listener: ElementListener,
    ) -> MarketResult<ListenerToken> {
        let fallback = self.target.clone();
        let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let target = event.target().unwrap_or_else(|| fallback.clone());
            let element_event = ElementEvent::new(event.type_(), Rc::new(DomElement::new(target)))
                .with_native(event);
            listener(&element_event);
        }) as Box<dyn FnMut(web_sys::Event)>);

        self.target
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .map_err(|e| {
                MarketError::Element(format!("addEventListener '{}': {}", event, js_error_message(&e)))
            })?;

        let token = ListenerToken(self.next_token.get() + 1);
        self.next_token.set(token.0);
        // Keep the closure alive until the listener is removed
        self.closures.borrow_mut().insert(token, closure);
        Ok(token)
    }

    fn remove_event_listener(&self, event: &str, token: ListenerToken) {
        let closure = self.closures.borrow_mut().remove(&token);
        if let Some(closure) = closure {
            if let Err(e) = self
                .target
                .remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            {
                tracing::warn!(event, error = %js_error_message(&e), "removeEventListener failed");
            }
        }
    }

    fn get_attribute(&self, attribute: &str) -> Option<Value> {
        let value = js_sys::Reflect::get(&self.target, &attribute.into()).ok()?;
        if value.is_undefined() || value.is_function() {
            return None;
        }

        let json = js_sys::JSON::stringify(&value).ok()?.as_string()?;
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(attribute, error = %e, "property is not JSON-compatible");
                None
            }
        }
    }

    fn set_attribute(&self, attribute: &str, value: &Value) -> MarketResult<()> {
        let json = serde_json::to_string(value)?;
        let js_value = js_sys::JSON::parse(&json)
            .map_err(|e| MarketError::Element(js_error_message(&e)))?;

        js_sys::Reflect::set(&self.target, &attribute.into(), &js_value)
            .map_err(|e| {
                MarketError::Element(format!("set '{}': {}", attribute, js_error_message(&e)))
            })?;
        Ok(())
    }
}
