//! Named-event publish/subscribe registry
//!
//! Markets publish on names of the form `"{market_id}__{kind}"`. The bus is an
//! explicit value so hosts can isolate markets from each other; the
//! thread-local [`EventBus::global`] instance plays the role of the browser's
//! window-wide event target and is what markets use unless told otherwise.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::event::{MarketEvent, MarketEventKind};

/// Separator between market id and event kind in bus names.
pub const EVENT_NAME_SEPARATOR: &str = "__";

/// Bus name for events of `kind` emitted by `market_id`.
pub fn event_name(market_id: &str, kind: MarketEventKind) -> String {
    format!("{}{}{}", market_id, EVENT_NAME_SEPARATOR, kind)
}

/// Callback invoked for every dispatched event of a name.
pub type Listener = Rc<dyn Fn(&MarketEvent)>;

/// Handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
}

/// Shared, single-threaded event registry. Clones refer to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

thread_local! {
    static GLOBAL_BUS: EventBus = EventBus::new();
}

impl EventBus {
    /// Create an isolated bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide bus for the current thread.
    pub fn global() -> Self {
        GLOBAL_BUS.with(|bus| bus.clone())
    }

    /// Register `listener` for events named `name`.
    pub fn subscribe(&self, name: impl Into<String>, listener: Listener) -> ListenerId {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .listeners
            .entry(name.into())
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        let mut removed = false;
        registry.listeners.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        removed
    }

    /// Deliver `event` to every listener of its name, in registration order.
    ///
    /// The listener list is snapshotted first; listeners added or removed
    /// during delivery take effect from the next dispatch. Returns the number
    /// of listeners invoked.
    pub fn dispatch(&self, event: &MarketEvent) -> usize {
        let listeners: Vec<Listener> = self
            .registry
            .borrow()
            .listeners
            .get(event.name())
            .map(|entries| entries.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default();

        tracing::trace!(event = event.name(), listeners = listeners.len(), "dispatch");

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Number of listeners registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.registry
            .borrow()
            .listeners
            .get(name)
            .map_or(0, Vec::len)
    }

    /// True if both handles share one registry.
    pub fn same_bus(&self, other: &EventBus) -> bool {
        Rc::ptr_eq(&self.registry, &other.registry)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        f.debug_struct("EventBus")
            .field("names", &registry.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventDetails, Products};
    use std::cell::Cell;

    fn clear_event(market: &str) -> MarketEvent {
        MarketEvent::new(
            market,
            Products::new(),
            EventDetails::Clear {
                old_products: Products::new(),
            },
        )
    }

    #[test]
    fn test_event_name() {
        assert_eq!(event_name("prefs", MarketEventKind::Set), "prefs__set");
        assert_eq!(event_name("a__b", MarketEventKind::Destroy), "a__b__destroy");
    }

    #[test]
    fn test_dispatch_by_name() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        bus.subscribe("prefs__clear", Rc::new(move |_| h.set(h.get() + 1)));

        assert_eq!(bus.dispatch(&clear_event("prefs")), 1);
        assert_eq!(bus.dispatch(&clear_event("other")), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe("prefs__clear", Rc::new(|_| {}));
        assert_eq!(bus.listener_count("prefs__clear"), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.listener_count("prefs__clear"), 0);
        assert_eq!(bus.dispatch(&clear_event("prefs")), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let bus = EventBus::new();
        let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let inner_bus = bus.clone();
        let inner_slot = slot.clone();
        let id = bus.subscribe(
            "prefs__clear",
            Rc::new(move |_| {
                if let Some(id) = inner_slot.get() {
                    inner_bus.unsubscribe(id);
                }
            }),
        );
        slot.set(Some(id));

        assert_eq!(bus.dispatch(&clear_event("prefs")), 1);
        assert_eq!(bus.dispatch(&clear_event("prefs")), 0);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(EventBus::global().same_bus(&EventBus::global()));
        assert!(!EventBus::new().same_bus(&EventBus::global()));
    }
}
