//! Market event envelope
//!
//! Every mutation emits one [`MarketEvent`]. The kind-specific data lives in
//! [`EventDetails`]; the envelope exposes each field through a named accessor
//! and, for JavaScript consumers, serializes both as top-level properties and
//! under a nested `detail` object.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Product mapping owned by a market.
pub type Products = Map<String, Value>;

/// Products removed by a `remove` call. `None` marks a key that was not present.
pub type RemovedProducts = BTreeMap<String, Option<Value>>;

/// Kinds of events a market emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketEventKind {
    /// Emitted after every `set`
    Set,
    /// Emitted after every `remove`
    Remove,
    /// Emitted after every `clear`
    Clear,
    /// Emitted once when the market is destroyed
    Destroy,
}

impl MarketEventKind {
    pub const ALL: [MarketEventKind; 4] = [
        MarketEventKind::Set,
        MarketEventKind::Remove,
        MarketEventKind::Clear,
        MarketEventKind::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketEventKind::Set => "set",
            MarketEventKind::Remove => "remove",
            MarketEventKind::Clear => "clear",
            MarketEventKind::Destroy => "destroy",
        }
    }
}

impl fmt::Display for MarketEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(MarketEventKind::Set),
            "remove" => Ok(MarketEventKind::Remove),
            "clear" => Ok(MarketEventKind::Clear),
            "destroy" => Ok(MarketEventKind::Destroy),
            other => Err(format!(
                "unknown market event '{}', expected one of set, remove, clear, destroy",
                other
            )),
        }
    }
}

/// Kind-specific payload of a market event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetails {
    Set {
        old_products: Products,
        new_products: Products,
    },
    Remove {
        old_products: Products,
        removed_products: RemovedProducts,
    },
    Clear {
        old_products: Products,
    },
    Destroy,
}

impl EventDetails {
    pub fn kind(&self) -> MarketEventKind {
        match self {
            EventDetails::Set { .. } => MarketEventKind::Set,
            EventDetails::Remove { .. } => MarketEventKind::Remove,
            EventDetails::Clear { .. } => MarketEventKind::Clear,
            EventDetails::Destroy => MarketEventKind::Destroy,
        }
    }
}

/// Notification emitted around market mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketEvent {
    market_id: String,
    name: String,
    products: Products,
    details: EventDetails,
    message: Option<String>,
    timestamp: i64,
}

impl MarketEvent {
    /// Build an event for `market_id`, stamped with the current time.
    pub fn new(market_id: impl Into<String>, products: Products, details: EventDetails) -> Self {
        let market_id = market_id.into();
        let name = crate::bus::event_name(&market_id, details.kind());
        Self {
            market_id,
            name,
            products,
            details,
            message: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Attach a human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Override the creation timestamp (milliseconds since the Unix epoch).
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> MarketEventKind {
        self.details.kind()
    }

    /// Bus name, `"{market_id}__{kind}"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    /// Products after the mutation.
    pub fn products(&self) -> &Products {
        &self.products
    }

    pub fn old_products(&self) -> Option<&Products> {
        match &self.details {
            EventDetails::Set { old_products, .. }
            | EventDetails::Remove { old_products, .. }
            | EventDetails::Clear { old_products } => Some(old_products),
            EventDetails::Destroy => None,
        }
    }

    /// The partial mapping passed to `set`.
    pub fn new_products(&self) -> Option<&Products> {
        match &self.details {
            EventDetails::Set { new_products, .. } => Some(new_products),
            _ => None,
        }
    }

    pub fn removed_products(&self) -> Option<&RemovedProducts> {
        match &self.details {
            EventDetails::Remove {
                removed_products, ..
            } => Some(removed_products),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn details(&self) -> &EventDetails {
        &self.details
    }

    /// Details as a JSON object, the generic container consumers unwrap.
    pub fn detail(&self) -> Map<String, Value> {
        let mut detail = Map::new();
        detail.insert("products".into(), Value::Object(self.products.clone()));
        if let Some(old) = self.old_products() {
            detail.insert("oldProducts".into(), Value::Object(old.clone()));
        }
        if let Some(new) = self.new_products() {
            detail.insert("newProducts".into(), Value::Object(new.clone()));
        }
        if let Some(removed) = self.removed_products() {
            let removed = removed
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().unwrap_or(Value::Null)))
                .collect();
            detail.insert("removedProducts".into(), Value::Object(removed));
        }
        if let Some(message) = &self.message {
            detail.insert("message".into(), Value::String(message.clone()));
        }
        detail
    }
}

impl Serialize for MarketEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let detail = self.detail();
        let mut map = serializer.serialize_map(Some(detail.len() + 5))?;
        map.serialize_entry("type", &self.name)?;
        map.serialize_entry("kind", &self.kind())?;
        map.serialize_entry("marketId", &self.market_id)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        for (key, value) in &detail {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("detail", &detail)?;
        map.end()
    }
}
