//! Browser WASM bindings using wasm-bindgen and web storage
//!
//! Mirrors the JavaScript surface of the market package:
//!
//! ```js
//! const market = useLocalMarket("settings", { theme: "light" });
//! market.on("set", (event, market) => console.log(event.products));
//! market.set({ theme: "dark" });
//! const handle = market.subscribeElement({
//!   element: input, event: "input", attribute: "value", product: "theme",
//! });
//! market.unsubscribeElement(handle);
//! ```
//!
//! Products cross the boundary as JSON: JS values are `JSON.stringify`-ed on
//! the way in and events are `JSON.parse`-d on the way out.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use market_core::{
    ListenerId, Market, MarketEventKind, Products, Subscription, SubscriptionId, Task, TaskError,
};
use market_webstorage::{js_error_message, DomElement, StorageScope};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::{event_to_json, products_from_json};

/// Numeric handles given to JavaScript for listeners and subscriptions.
#[derive(Default)]
struct Handles {
    next: u32,
    listeners: HashMap<u32, ListenerId>,
    subscriptions: HashMap<u32, SubscriptionId>,
}

impl Handles {
    fn next(&mut self) -> u32 {
        self.next += 1;
        self.next
    }
}

/// A market as seen from JavaScript.
#[wasm_bindgen(js_name = Market)]
#[derive(Clone)]
pub struct JsMarket {
    market: Market,
    handles: Rc<RefCell<Handles>>,
}

/// Create a market persisted in `localStorage`.
#[wasm_bindgen(js_name = useLocalMarket)]
pub fn use_local_market(market_id: &str, default_products: JsValue) -> Result<JsMarket, JsValue> {
    open_market(market_id, default_products, StorageScope::Local)
}

/// Create a market persisted in `sessionStorage`.
#[wasm_bindgen(js_name = useSessionMarket)]
pub fn use_session_market(
    market_id: &str,
    default_products: JsValue,
) -> Result<JsMarket, JsValue> {
    open_market(market_id, default_products, StorageScope::Session)
}

fn open_market(
    market_id: &str,
    default_products: JsValue,
    scope: StorageScope,
) -> Result<JsMarket, JsValue> {
    // Route Rust panics to console.error instead of "RuntimeError: unreachable"
    console_error_panic_hook::set_once();

    let defaults = js_to_products(&default_products)?;
    let market = market_webstorage::use_market(market_id, defaults, scope)
        .map_err(|e| JsValue::from_str(&format!("Failed to open market: {}", e)))?;

    Ok(JsMarket {
        market,
        handles: Rc::default(),
    })
}

#[wasm_bindgen(js_class = Market)]
impl JsMarket {
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.market.id().to_string()
    }

    /// One product, or every product when called without a key.
    /// Missing products are `undefined`.
    pub fn get(&self, product: Option<String>) -> Result<JsValue, JsValue> {
        match product {
            Some(product) => match self.market.get(&product) {
                Some(value) => json_to_js(&value),
                None => Ok(JsValue::UNDEFINED),
            },
            None => json_to_js(&Value::Object(self.market.get_all())),
        }
    }

    pub fn has(&self, product: &str) -> bool {
        self.market.has(product)
    }

    /// True if every own key of `products` is present, whatever its value.
    #[wasm_bindgen(js_name = hasAll)]
    pub fn has_all(&self, products: JsValue) -> Result<bool, JsValue> {
        Ok(object_keys(&products)?
            .iter()
            .all(|product| self.market.has(product)))
    }

    pub fn set(&self, products: JsValue) -> Result<(), JsValue> {
        let products = js_to_products(&products)?;
        self.market.set(products).map_err(market_error)
    }

    /// Remove one product (`remove("a")`) or several (`remove(["a", "b"])`).
    pub fn remove(&self, products: JsValue) -> Result<(), JsValue> {
        let products = product_names(&products)?;
        self.market.remove(products).map_err(market_error)
    }

    pub fn clear(&self) -> Result<(), JsValue> {
        self.market.clear().map_err(market_error)
    }

    pub fn destroy(&self) -> Result<(), JsValue> {
        self.market.destroy().map_err(market_error)?;
        let mut handles = self.handles.borrow_mut();
        handles.listeners.clear();
        handles.subscriptions.clear();
        Ok(())
    }

    /// Register `callback(event, market)` for `set`, `remove`, `clear` or
    /// `destroy`. Returns a handle for `off`.
    pub fn on(&self, event: &str, callback: js_sys::Function) -> Result<u32, JsValue> {
        let kind: MarketEventKind = event.parse().map_err(|e: String| JsValue::from_str(&e))?;

        let handles = self.handles.clone();
        let listener = self
            .market
            .on(kind, move |event, market| {
                let payload = event_to_json(event)
                    .map_err(|e| JsValue::from_str(&e))
                    .and_then(|json| js_sys::JSON::parse(&json));
                let payload = match payload {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(error = %js_error_message(&e), "failed to convert event");
                        return;
                    }
                };
                let market = JsValue::from(JsMarket {
                    market: market.clone(),
                    handles: handles.clone(),
                });
                if let Err(e) = callback.call2(&JsValue::NULL, &payload, &market) {
                    tracing::error!(error = %js_error_message(&e), "market listener threw");
                }
            })
            .map_err(market_error)?;

        let mut handles = self.handles.borrow_mut();
        let handle = handles.next();
        handles.listeners.insert(handle, listener);
        Ok(handle)
    }

    pub fn off(&self, handle: u32) -> bool {
        let listener = self.handles.borrow_mut().listeners.remove(&handle);
        listener.is_some_and(|listener| self.market.off(listener))
    }

    /// Bind `{ element, event, attribute, product, default?, callback? }`.
    /// The callback receives the DOM event and the market.
    #[wasm_bindgen(js_name = subscribeElement)]
    pub fn subscribe_element(&self, subscription: JsValue) -> Result<u32, JsValue> {
        let element: web_sys::EventTarget = get_prop(&subscription, "element")?
            .dyn_into()
            .map_err(|_| JsValue::from_str("subscription.element is not an EventTarget"))?;
        let event = get_string_prop(&subscription, "event")?;
        let attribute = get_string_prop(&subscription, "attribute")?;
        let product = get_string_prop(&subscription, "product")?;

        let mut rule = Subscription::new(Rc::new(DomElement::new(element)), event, attribute, product);

        let default = get_prop(&subscription, "default")?;
        if !default.is_undefined() {
            rule = rule.with_default(js_to_json(&default)?);
        }

        let callback = get_prop(&subscription, "callback")?;
        if let Some(callback) = callback.dyn_ref::<js_sys::Function>().cloned() {
            let handles = self.handles.clone();
            rule = rule.with_callback(move |event, market| {
                let market = JsValue::from(JsMarket {
                    market: market.clone(),
                    handles: handles.clone(),
                });
                let dom_event = event
                    .native::<web_sys::Event>()
                    .map(|dom_event| JsValue::from(dom_event.clone()))
                    .unwrap_or_else(|| JsValue::from_str(&event.event));
                if let Err(e) = callback.call2(&JsValue::NULL, &dom_event, &market) {
                    tracing::error!(error = %js_error_message(&e), "subscription callback threw");
                }
            });
        }

        let id = self.market.subscribe_element(rule).map_err(market_error)?;
        let mut handles = self.handles.borrow_mut();
        let handle = handles.next();
        handles.subscriptions.insert(handle, id);
        Ok(handle)
    }

    #[wasm_bindgen(js_name = unsubscribeElement)]
    pub fn unsubscribe_element(&self, handle: u32) -> bool {
        let id = self.handles.borrow_mut().subscriptions.remove(&handle);
        id.is_some_and(|id| self.market.unsubscribe_element(id))
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    /// Queue `task`, a function returning a value or a Promise.
    #[wasm_bindgen(js_name = queuePush)]
    pub fn queue_push(&self, product: String, task: js_sys::Function) {
        self.market.queue().push(Task::new(product, move || {
            let started = task.call0(&JsValue::NULL);
            async move {
                let result = match started {
                    Ok(result) => result,
                    Err(e) => return Err(TaskError(js_error_message(&e))),
                };
                match JsFuture::from(js_sys::Promise::resolve(&result)).await {
                    Ok(_) => Ok(()),
                    Err(e) => Err(TaskError(js_error_message(&e))),
                }
            }
        }));
    }

    #[wasm_bindgen(js_name = queueRemove)]
    pub fn queue_remove(&self, product: &str) {
        self.market.queue().remove(product);
    }

    #[wasm_bindgen(js_name = queueCancel)]
    pub fn queue_cancel(&self) {
        self.market.queue().cancel();
    }

    /// Products of the queued tasks, in order.
    #[wasm_bindgen(js_name = queueList)]
    pub fn queue_list(&self) -> Vec<String> {
        self.market
            .queue()
            .list()
            .iter()
            .map(|task| task.product().to_string())
            .collect()
    }

    /// Run every queued task. Resolves when all settle, rejects on the first failure.
    #[wasm_bindgen(js_name = queueExecute)]
    pub fn queue_execute(&self) -> js_sys::Promise {
        let market = self.market.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            market
                .queue()
                .execute()
                .await
                .map(|_| JsValue::UNDEFINED)
                .map_err(market_error)
        })
    }
}

// ============================================================================
// Conversion helpers
// ============================================================================

fn market_error(err: market_core::MarketError) -> JsValue {
    JsValue::from_str(&format!("Market error: {}", err))
}

fn js_to_json(value: &JsValue) -> Result<Value, JsValue> {
    let json = js_sys::JSON::stringify(value)?
        .as_string()
        .ok_or_else(|| JsValue::from_str("value is not JSON-serializable"))?;
    serde_json::from_str(&json).map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))
}

fn json_to_js(value: &Value) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))?;
    js_sys::JSON::parse(&json)
}

fn js_to_products(value: &JsValue) -> Result<Products, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(Products::new());
    }
    let json = js_sys::JSON::stringify(value)?
        .as_string()
        .unwrap_or_default();
    products_from_json(&json).map_err(|e| JsValue::from_str(&e))
}

/// Own enumerable keys of a JS object, like `Object.keys`.
fn object_keys(value: &JsValue) -> Result<Vec<String>, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(Vec::new());
    }
    let object = value
        .dyn_ref::<js_sys::Object>()
        .ok_or_else(|| JsValue::from_str("products must be an object"))?;
    Ok(js_sys::Object::keys(object)
        .iter()
        .filter_map(|key| key.as_string())
        .collect())
}

/// A single product name or an array of them.
fn product_names(value: &JsValue) -> Result<Vec<String>, JsValue> {
    if let Some(product) = value.as_string() {
        return Ok(vec![product]);
    }
    let array = value
        .dyn_ref::<js_sys::Array>()
        .ok_or_else(|| JsValue::from_str("expected a product name or an array of names"))?;
    array
        .iter()
        .map(|product| {
            product
                .as_string()
                .ok_or_else(|| JsValue::from_str("product names must be strings"))
        })
        .collect()
}

/// Get a property from a JS object.
fn get_prop(obj: &JsValue, key: &str) -> Result<JsValue, JsValue> {
    js_sys::Reflect::get(obj, &key.into())
        .map_err(|_| JsValue::from_str(&format!("missing property: {}", key)))
}

/// Get a string property from a JS object.
fn get_string_prop(obj: &JsValue, key: &str) -> Result<String, JsValue> {
    get_prop(obj, key)?
        .as_string()
        .ok_or_else(|| JsValue::from_str(&format!("subscription.{} is not a string", key)))
}
