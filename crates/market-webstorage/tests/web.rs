//! Browser tests for web storage markets
//!
//! Run with `wasm-pack test --headless --firefox crates/market-webstorage`.

#![cfg(target_arch = "wasm32")]

use std::rc::Rc;

use market_core::{Element, Market, MarketEventKind, Products, Storage, Subscription};
use market_webstorage::{use_local_market, use_session_market, DomElement, StorageScope, WebStorage};
use serde_json::{json, Value};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;
use web_sys::{Event, EventTarget};

wasm_bindgen_test_configure!(run_in_browser);

fn products(value: Value) -> Products {
    value.as_object().cloned().unwrap()
}

fn persisted(storage: &WebStorage, id: &str) -> Option<Products> {
    storage
        .get_item(id)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

#[wasm_bindgen_test]
fn test_web_storage_round_trip() {
    let storage = WebStorage::local().unwrap();
    assert_eq!(storage.scope(), StorageScope::Local);

    storage.set_item("market-test-raw", "hello").unwrap();
    assert_eq!(storage.get_item("market-test-raw").unwrap().as_deref(), Some("hello"));

    storage.remove_item("market-test-raw").unwrap();
    assert!(storage.get_item("market-test-raw").unwrap().is_none());
}

#[wasm_bindgen_test]
fn test_local_market_merges_persisted_snapshot() {
    let storage = WebStorage::local().unwrap();
    storage
        .set_item("market-test-seed", r#"{"theme":"dark","lang":"en"}"#)
        .unwrap();

    let market = use_local_market("market-test-seed", products(json!({"theme": "light"}))).unwrap();
    assert_eq!(market.get_all(), products(json!({"theme": "dark", "lang": "en"})));
    assert_eq!(persisted(&storage, "market-test-seed"), Some(market.get_all()));

    market.destroy().unwrap();
    assert!(storage.get_item("market-test-seed").unwrap().is_none());
}

#[wasm_bindgen_test]
fn test_session_market_persists_mutations() {
    let storage = WebStorage::session().unwrap();
    let market = use_session_market("market-test-session", Products::new()).unwrap();

    market.set_product("step", json!(2)).unwrap();
    assert_eq!(persisted(&storage, "market-test-session"), Some(products(json!({"step": 2}))));

    market.clear().unwrap();
    assert_eq!(persisted(&storage, "market-test-session"), Some(Products::new()));
    market.destroy().unwrap();
}

#[wasm_bindgen_test]
fn test_dom_element_binding() {
    let market = Market::builder("market-test-binding").build().unwrap();
    let target = EventTarget::new().unwrap();
    let element = DomElement::new(target.clone());

    let id = market
        .subscribe_element(
            Subscription::new(Rc::new(element.clone()), "input", "value", "name")
                .with_default(json!("anonymous")),
        )
        .unwrap();

    // Initial sync wrote the default onto the target
    assert_eq!(element.get_attribute("value"), Some(json!("anonymous")));

    js_sys::Reflect::set(&target, &"value".into(), &JsValue::from_str("ada")).unwrap();
    target
        .dispatch_event(&Event::new("input").unwrap())
        .unwrap();
    assert_eq!(market.get("name"), Some(json!("ada")));

    assert!(market.unsubscribe_element(id));
    assert_eq!(element.listener_count(), 0);

    js_sys::Reflect::set(&target, &"value".into(), &JsValue::from_str("ignored")).unwrap();
    target
        .dispatch_event(&Event::new("input").unwrap())
        .unwrap();
    assert_eq!(market.get("name"), Some(json!("ada")));
}

#[wasm_bindgen_test]
fn test_dom_element_passes_dom_event() {
    let market = Market::builder("market-test-native").build().unwrap();
    let target = EventTarget::new().unwrap();
    let seen = Rc::new(std::cell::RefCell::new(None));

    let s = seen.clone();
    market
        .subscribe_element(
            Subscription::new(Rc::new(DomElement::new(target.clone())), "change", "value", "v")
                .with_callback(move |event, _| {
                    *s.borrow_mut() = event.native::<Event>().cloned();
                }),
        )
        .unwrap();

    let fired = Event::new("change").unwrap();
    target.dispatch_event(&fired).unwrap();

    let received = seen.borrow().clone().unwrap();
    assert_eq!(received.type_(), "change");
    assert_eq!(received.target(), Some(target));
}

#[wasm_bindgen_test]
fn test_events_reach_listeners() {
    let market = use_local_market("market-test-events", Products::new()).unwrap();
    let seen = Rc::new(std::cell::Cell::new(0));

    let s = seen.clone();
    market
        .on(MarketEventKind::Set, move |event, _| {
            assert_eq!(event.name(), "market-test-events__set");
            s.set(s.get() + 1);
        })
        .unwrap();

    market.set_product("a", json!(true)).unwrap();
    assert_eq!(seen.get(), 1);
    market.destroy().unwrap();
}
