//! The market: a named, persisted product mapping with change events

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::binding::{Element, ElementEvent, ElementListener, ListenerToken};
use crate::binding::{Subscription, SubscriptionCallback, SubscriptionId};
use crate::bus::{event_name, EventBus, Listener, ListenerId};
use crate::error::{MarketError, MarketResult};
use crate::event::{EventDetails, MarketEvent, MarketEventKind, Products, RemovedProducts};
use crate::queue::Queue;
use crate::storage::{MemoryStorage, Storage};

/// A live element binding: enough to detach the exact listener later.
struct Binding {
    element: Rc<dyn Element>,
    event: String,
    token: ListenerToken,
}

#[derive(Default)]
struct MarketState {
    products: Products,
    destroyed: bool,
    next_subscription: u64,
    bindings: BTreeMap<SubscriptionId, Binding>,
    listeners: Vec<ListenerId>,
}

struct MarketInner {
    id: String,
    default_products: Products,
    storage: Rc<dyn Storage>,
    bus: EventBus,
    queue: Queue,
    state: RefCell<MarketState>,
}

impl Drop for MarketInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for id in state.listeners.drain(..) {
            self.bus.unsubscribe(id);
        }
        for binding in std::mem::take(&mut state.bindings).into_values() {
            binding
                .element
                .remove_event_listener(&binding.event, binding.token);
        }
    }
}

/// Named product store persisted as one JSON object under its id.
///
/// `Market` is a cheap handle; clones refer to the same store. All state is
/// single-threaded. No internal borrow is held while events are dispatched,
/// so listeners and binding callbacks may call back into the market.
///
/// # Example
///
/// ```rust
/// use market_core::{Market, MarketEventKind, MemoryStorage};
/// use serde_json::json;
///
/// let storage = MemoryStorage::new();
/// let market = Market::builder("prefs")
///     .default_product("theme", json!("light"))
///     .storage(storage.clone())
///     .build()
///     .unwrap();
///
/// market
///     .on(MarketEventKind::Set, |event, _market| {
///         assert_eq!(event.products()["theme"], "dark");
///     })
///     .unwrap();
///
/// market.set_product("theme", json!("dark")).unwrap();
/// assert_eq!(market.get("theme"), Some(json!("dark")));
/// ```
#[derive(Clone)]
pub struct Market {
    inner: Rc<MarketInner>,
}

impl Market {
    /// Create a market on the thread's global event bus.
    ///
    /// Loads any snapshot persisted under `id`, merges it over `defaults`
    /// and writes the result back before returning.
    pub fn new<S>(id: impl Into<String>, defaults: Products, storage: S) -> MarketResult<Self>
    where
        S: Storage + 'static,
    {
        Self::builder(id).defaults(defaults).storage(storage).build()
    }

    pub fn builder(id: impl Into<String>) -> MarketBuilder {
        MarketBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Products the market was seeded with.
    pub fn default_products(&self) -> &Products {
        &self.inner.default_products
    }

    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.borrow().destroyed
    }

    /// Number of live element bindings.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.borrow().bindings.len()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Value of one product, `None` if absent.
    pub fn get(&self, product: &str) -> Option<Value> {
        self.inner.state.borrow().products.get(product).cloned()
    }

    /// Copy of the whole product mapping.
    pub fn get_all(&self) -> Products {
        self.inner.state.borrow().products.clone()
    }

    pub fn has(&self, product: &str) -> bool {
        self.inner.state.borrow().products.contains_key(product)
    }

    /// True if every key of `products` is present.
    pub fn has_all(&self, products: &Products) -> bool {
        let state = self.inner.state.borrow();
        products.keys().all(|key| state.products.contains_key(key))
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Shallow-merge `products` into the market, persist, emit `set`.
    ///
    /// Nothing changes in memory if persisting fails.
    pub fn set(&self, products: Products) -> MarketResult<()> {
        self.ensure_live()?;

        let old_products = self.get_all();
        let mut merged = old_products.clone();
        merged.extend(products.clone());

        self.commit(merged.clone())?;
        self.emit(MarketEvent::new(
            self.id(),
            merged,
            EventDetails::Set {
                old_products,
                new_products: products,
            },
        ));
        Ok(())
    }

    /// Set a single product.
    pub fn set_product(&self, product: impl Into<String>, value: Value) -> MarketResult<()> {
        let mut products = Products::new();
        products.insert(product.into(), value);
        self.set(products)
    }

    /// Delete the named products, persist, emit `remove`.
    ///
    /// Absent keys are ignored and reported as `None` in the event's
    /// removed products.
    pub fn remove<I, K>(&self, products: I) -> MarketResult<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.ensure_live()?;

        let old_products = self.get_all();
        let mut remaining = old_products.clone();
        let mut removed_products = RemovedProducts::new();
        for product in products {
            let product = product.as_ref();
            let value = remaining.remove(product);
            if value.is_some() || !removed_products.contains_key(product) {
                removed_products.insert(product.to_string(), value);
            }
        }

        self.commit(remaining.clone())?;
        self.emit(MarketEvent::new(
            self.id(),
            remaining,
            EventDetails::Remove {
                old_products,
                removed_products,
            },
        ));
        Ok(())
    }

    /// Remove every product, persist the empty mapping, emit `clear`.
    pub fn clear(&self) -> MarketResult<()> {
        self.ensure_live()?;

        let old_products = self.get_all();
        self.commit(Products::new())?;
        self.emit(MarketEvent::new(
            self.id(),
            Products::new(),
            EventDetails::Clear { old_products },
        ));
        Ok(())
    }

    /// Tear the market down.
    ///
    /// Deletes the persisted record, detaches every element binding, cancels
    /// pending queue tasks and emits `destroy`. If the record cannot be
    /// deleted the error is returned and the market stays live. Listeners registered with
    /// [`Market::on`] receive that final event and are then unregistered.
    /// Every later mutation fails with [`MarketError::Destroyed`].
    pub fn destroy(&self) -> MarketResult<()> {
        self.ensure_live()?;

        // A failed removal leaves the market live with its bindings intact.
        self.inner.storage.remove_item(self.id())?;

        let bindings = std::mem::take(&mut self.inner.state.borrow_mut().bindings);
        for binding in bindings.into_values() {
            binding
                .element
                .remove_event_listener(&binding.event, binding.token);
        }

        self.inner.state.borrow_mut().destroyed = true;
        self.inner.queue.cancel();

        tracing::debug!(market = self.id(), "market destroyed");

        self.emit(
            MarketEvent::new(self.id(), self.get_all(), EventDetails::Destroy)
                .with_message(format!("market '{}' destroyed", self.id())),
        );

        let listeners = std::mem::take(&mut self.inner.state.borrow_mut().listeners);
        for id in listeners {
            self.inner.bus.unsubscribe(id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Run `callback` for every `kind` event published under this market's id.
    ///
    /// Delivery is by name on the market's bus, so another market with the
    /// same id on the same bus also triggers the callback.
    pub fn on<F>(&self, kind: MarketEventKind, callback: F) -> MarketResult<ListenerId>
    where
        F: Fn(&MarketEvent, &Market) + 'static,
    {
        self.ensure_live()?;

        let weak: Weak<MarketInner> = Rc::downgrade(&self.inner);
        let listener: Listener = Rc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                callback(event, &Market { inner });
            }
        });

        let id = self
            .inner
            .bus
            .subscribe(event_name(self.id(), kind), listener);
        self.inner.state.borrow_mut().listeners.push(id);
        Ok(id)
    }

    /// Unregister a listener added with [`Market::on`].
    pub fn off(&self, listener: ListenerId) -> bool {
        self.inner
            .state
            .borrow_mut()
            .listeners
            .retain(|id| *id != listener);
        self.inner.bus.unsubscribe(listener)
    }

    // ------------------------------------------------------------------
    // Element bindings
    // ------------------------------------------------------------------

    /// Bind an element attribute to a product.
    ///
    /// The element first receives the product's current value, or the
    /// subscription default when the product is absent. Afterwards, each time
    /// the element fires the configured event, the attribute is read off the
    /// event target and stored with [`Market::set`], then the subscription
    /// callback runs.
    pub fn subscribe_element(&self, subscription: Subscription) -> MarketResult<SubscriptionId> {
        self.ensure_live()?;

        let Subscription {
            element,
            event,
            attribute,
            product,
            default,
            callback,
        } = subscription;

        if let Some(value) = self.get(&product).or(default) {
            element.set_attribute(&attribute, &value)?;
        }

        let weak: Weak<MarketInner> = Rc::downgrade(&self.inner);
        let listener: ElementListener = Rc::new(move |element_event| {
            if let Some(inner) = weak.upgrade() {
                Market { inner }.store_element_value(
                    &product,
                    &attribute,
                    callback.as_ref(),
                    element_event,
                );
            }
        });
        let token = element.add_event_listener(&event, listener)?;

        let mut state = self.inner.state.borrow_mut();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.bindings.insert(
            id,
            Binding {
                element,
                event,
                token,
            },
        );
        Ok(id)
    }

    /// Detach a binding. Returns `false` if it is not live.
    pub fn unsubscribe_element(&self, subscription: SubscriptionId) -> bool {
        let binding = self.inner.state.borrow_mut().bindings.remove(&subscription);
        match binding {
            Some(binding) => {
                binding
                    .element
                    .remove_event_listener(&binding.event, binding.token);
                true
            }
            None => false,
        }
    }

    fn store_element_value(
        &self,
        product: &str,
        attribute: &str,
        callback: Option<&SubscriptionCallback>,
        event: &ElementEvent,
    ) {
        let value = event.target.get_attribute(attribute).unwrap_or(Value::Null);
        if let Err(e) = self.set_product(product, value) {
            tracing::error!(
                market = self.id(),
                product,
                event = %event.event,
                error = %e,
                "failed to store bound element value"
            );
            return;
        }

        if let Some(callback) = callback {
            callback(event, self);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_live(&self) -> MarketResult<()> {
        if self.is_destroyed() {
            return Err(MarketError::Destroyed(self.inner.id.clone()));
        }
        Ok(())
    }

    /// Persist `products`, then make them the in-memory state.
    fn commit(&self, products: Products) -> MarketResult<()> {
        self.save(&products)?;
        self.inner.state.borrow_mut().products = products;
        Ok(())
    }

    fn save(&self, products: &Products) -> MarketResult<()> {
        let snapshot = serde_json::to_string(products)?;
        self.inner.storage.set_item(self.id(), &snapshot)?;
        tracing::debug!(market = self.id(), bytes = snapshot.len(), "saved snapshot");
        Ok(())
    }

    /// Merge any persisted snapshot over the defaults and write it back.
    fn prepare(&self) -> MarketResult<()> {
        let mut products = self.inner.default_products.clone();

        match self.inner.storage.get_item(self.id())? {
            Some(raw) if !raw.is_empty() => {
                let persisted = parse_snapshot(self.id(), &raw)?;
                tracing::debug!(
                    market = self.id(),
                    persisted = persisted.len(),
                    "restoring snapshot"
                );
                products.extend(persisted);
            }
            _ => {
                tracing::debug!(market = self.id(), "no snapshot, seeding defaults");
            }
        }

        self.commit(products)
    }

    fn emit(&self, event: MarketEvent) {
        self.inner.bus.dispatch(&event);
    }
}

impl fmt::Debug for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Market")
            .field("id", &self.inner.id)
            .field("products", &state.products)
            .field("destroyed", &state.destroyed)
            .field("subscriptions", &state.bindings.len())
            .finish_non_exhaustive()
    }
}

fn parse_snapshot(market: &str, raw: &str) -> MarketResult<Products> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(products) => Ok(products),
        other => Err(MarketError::InvalidSnapshot {
            market: market.to_string(),
            found: json_type_name(&other).to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Configures and constructs a [`Market`].
pub struct MarketBuilder {
    id: String,
    defaults: Products,
    storage: Option<Rc<dyn Storage>>,
    bus: Option<EventBus>,
}

impl MarketBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            defaults: Products::new(),
            storage: None,
            bus: None,
        }
    }

    /// Replace the default products.
    pub fn defaults(mut self, defaults: Products) -> Self {
        self.defaults = defaults;
        self
    }

    /// Add one default product.
    pub fn default_product(mut self, product: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(product.into(), value);
        self
    }

    /// Storage backend. Defaults to a fresh [`MemoryStorage`].
    pub fn storage<S: Storage + 'static>(mut self, storage: S) -> Self {
        self.storage = Some(Rc::new(storage));
        self
    }

    /// Storage backend shared with other owners.
    pub fn shared_storage(mut self, storage: Rc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Event bus. Defaults to [`EventBus::global`].
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Build the market and load its persisted snapshot.
    pub fn build(self) -> MarketResult<Market> {
        let market = Market {
            inner: Rc::new(MarketInner {
                id: self.id,
                default_products: self.defaults,
                storage: self
                    .storage
                    .unwrap_or_else(|| Rc::new(MemoryStorage::new())),
                bus: self.bus.unwrap_or_else(EventBus::global),
                queue: Queue::new(),
                state: RefCell::new(MarketState::default()),
            }),
        };
        market.prepare()?;
        Ok(market)
    }
}
