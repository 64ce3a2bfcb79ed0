//! Store behaviour tests for Market

use std::cell::RefCell;
use std::rc::Rc;

use market_core::{
    EventBus, Market, MarketError, MarketEvent, MarketEventKind, MemoryStorage, Products, Storage,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Helper to build a product mapping from a JSON object literal
fn products(value: Value) -> Products {
    value.as_object().cloned().expect("object literal")
}

/// Helper to create a market on its own bus
fn create_market(id: &str, storage: &MemoryStorage) -> Market {
    Market::builder(id)
        .storage(storage.clone())
        .bus(EventBus::new())
        .build()
        .unwrap()
}

/// Parse what the backend holds for `id`
fn persisted(storage: &MemoryStorage, id: &str) -> Option<Products> {
    storage
        .get_item(id)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

/// Record every event of `kind` the market emits
fn record(market: &Market, kind: MarketEventKind) -> Rc<RefCell<Vec<MarketEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    market
        .on(kind, move |event, _| sink.borrow_mut().push(event.clone()))
        .unwrap();
    events
}

#[test]
fn test_set_merges_later_wins() {
    let storage = MemoryStorage::new();
    let market = create_market("prefs", &storage);

    market.set(products(json!({"a": 1, "b": 2}))).unwrap();
    market.set(products(json!({"b": 3, "c": 4}))).unwrap();

    assert_eq!(market.get_all(), products(json!({"a": 1, "b": 3, "c": 4})));
}

#[test]
fn test_persisted_matches_memory_after_every_mutation() {
    let storage = MemoryStorage::new();
    let market = create_market("prefs", &storage);
    assert_eq!(persisted(&storage, "prefs"), Some(market.get_all()));

    market.set(products(json!({"theme": "dark", "size": 12}))).unwrap();
    assert_eq!(persisted(&storage, "prefs"), Some(market.get_all()));

    market.remove(["size"]).unwrap();
    assert_eq!(persisted(&storage, "prefs"), Some(market.get_all()));

    market.clear().unwrap();
    assert_eq!(persisted(&storage, "prefs"), Some(Products::new()));
}

#[test]
fn test_market_only_touches_its_own_key() {
    let storage = MemoryStorage::with_items([("other", "untouched")]);
    let market = create_market("prefs", &storage);

    market.set_product("a", json!(1)).unwrap();
    market.destroy().unwrap();

    assert_eq!(storage.get_item("other").unwrap().as_deref(), Some("untouched"));
    assert_eq!(storage.len(), 1);
}

#[test]
fn test_get_missing_product() {
    let storage = MemoryStorage::new();
    let market = create_market("prefs", &storage);
    assert_eq!(market.get("nothing"), None);
}

#[test]
fn test_remove_missing_product_is_harmless() {
    let storage = MemoryStorage::new();
    let market = create_market("prefs", &storage);
    market.set_product("a", json!(1)).unwrap();
    let removes = record(&market, MarketEventKind::Remove);

    market.remove(["x"]).unwrap();

    assert_eq!(market.get_all(), products(json!({"a": 1})));
    let events = removes.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].removed_products().unwrap().get("x"), Some(&None));
}

#[test]
fn test_set_event_payload() {
    let storage = MemoryStorage::new();
    let market = create_market("prefs", &storage);
    market.set_product("lang", json!("en")).unwrap();
    let sets = record(&market, MarketEventKind::Set);

    market.set_product("theme", json!("dark")).unwrap();

    let events = sets.borrow();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.name(), "prefs__set");
    assert_eq!(event.market_id(), "prefs");
    assert_eq!(event.old_products(), Some(&products(json!({"lang": "en"}))));
    assert_eq!(event.new_products(), Some(&products(json!({"theme": "dark"}))));
    assert_eq!(event.products(), &products(json!({"lang": "en", "theme": "dark"})));
    assert!(event.timestamp() > 0);
}

#[test]
fn test_clear_then_destroy() {
    let storage = MemoryStorage::new();
    let market = create_market("prefs", &storage);
    market.set(products(json!({"a": 1, "b": 2}))).unwrap();
    let clears = record(&market, MarketEventKind::Clear);
    let destroys = record(&market, MarketEventKind::Destroy);

    market.clear().unwrap();
    assert_eq!(market.get_all(), Products::new());
    assert_eq!(
        clears.borrow()[0].old_products(),
        Some(&products(json!({"a": 1, "b": 2})))
    );

    market.destroy().unwrap();
    assert!(storage.get_item("prefs").unwrap().is_none());
    assert!(market.is_destroyed());

    let destroys = destroys.borrow();
    assert_eq!(destroys.len(), 1);
    assert_eq!(destroys[0].message(), Some("market 'prefs' destroyed"));
}

#[test]
fn test_destroyed_market_fails_fast() {
    let storage = MemoryStorage::new();
    let market = create_market("prefs", &storage);
    market.set_product("a", json!(1)).unwrap();
    market.destroy().unwrap();

    assert!(matches!(
        market.set_product("b", json!(2)),
        Err(MarketError::Destroyed(id)) if id == "prefs"
    ));
    assert!(matches!(market.remove(["a"]), Err(MarketError::Destroyed(_))));
    assert!(matches!(market.clear(), Err(MarketError::Destroyed(_))));
    assert!(matches!(market.destroy(), Err(MarketError::Destroyed(_))));
    assert!(matches!(
        market.on(MarketEventKind::Set, |_, _| {}),
        Err(MarketError::Destroyed(_))
    ));

    // Reads keep the last state; nothing is written back
    assert_eq!(market.get("a"), Some(json!(1)));
    assert!(storage.get_item("prefs").unwrap().is_none());
}

#[test]
fn test_destroy_unregisters_listeners() {
    let bus = EventBus::new();
    let market = Market::builder("prefs").bus(bus.clone()).build().unwrap();
    market.on(MarketEventKind::Set, |_, _| {}).unwrap();
    market.on(MarketEventKind::Destroy, |_, _| {}).unwrap();

    market.destroy().unwrap();

    assert_eq!(bus.listener_count("prefs__set"), 0);
    assert_eq!(bus.listener_count("prefs__destroy"), 0);
}

#[test]
fn test_construction_seeding_persisted_wins() {
    let storage = MemoryStorage::with_items([("prefs", r#"{"theme":"dark","lang":"en"}"#)]);
    let market = Market::builder("prefs")
        .default_product("theme", json!("light"))
        .storage(storage.clone())
        .bus(EventBus::new())
        .build()
        .unwrap();

    assert_eq!(market.get_all(), products(json!({"theme": "dark", "lang": "en"})));
    assert_eq!(market.default_products(), &products(json!({"theme": "light"})));
    assert_eq!(persisted(&storage, "prefs"), Some(market.get_all()));
}

#[test]
fn test_construction_seeding_defaults_fill_gaps() {
    let storage = MemoryStorage::with_items([("prefs", r#"{"theme":"dark"}"#)]);
    let market = Market::new(
        "prefs",
        products(json!({"theme": "light", "lang": "en"})),
        storage.clone(),
    )
    .unwrap();

    assert_eq!(market.get_all(), products(json!({"theme": "dark", "lang": "en"})));
    assert_eq!(persisted(&storage, "prefs"), Some(market.get_all()));
}

#[test]
fn test_same_id_same_bus_cross_delivers() {
    let bus = EventBus::new();
    let first = Market::builder("shared")
        .storage(MemoryStorage::new())
        .bus(bus.clone())
        .build()
        .unwrap();
    let second = Market::builder("shared")
        .storage(MemoryStorage::new())
        .bus(bus)
        .build()
        .unwrap();
    let seen = record(&first, MarketEventKind::Set);

    second.set_product("a", json!(1)).unwrap();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_separate_buses_isolate_same_id() {
    let first = create_market("shared", &MemoryStorage::new());
    let second = create_market("shared", &MemoryStorage::new());
    let seen = record(&first, MarketEventKind::Set);

    second.set_product("a", json!(1)).unwrap();
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_listener_may_read_and_write_market() {
    let storage = MemoryStorage::new();
    let market = create_market("counter", &storage);

    market
        .on(MarketEventKind::Set, |event, market| {
            if event.new_products().unwrap().contains_key("count") {
                let count = market.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
                market.set_product("double", json!(count * 2)).unwrap();
            }
        })
        .unwrap();

    market.set_product("count", json!(21)).unwrap();
    assert_eq!(market.get("double"), Some(json!(42)));
    assert_eq!(persisted(&storage, "counter"), Some(market.get_all()));
}
