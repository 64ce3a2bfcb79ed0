//! In-memory storage backend
//!
//! A HashMap-based implementation for testing and for hosts without browser
//! storage. Contents live as long as any clone of the handle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::traits::Storage;

/// In-memory key-value storage.
///
/// Clones share the same underlying map, so a test can hand one clone to a
/// market and inspect the persisted snapshot through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Rc<RefCell<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage that rejects writes once the total size of keys and
    /// values would exceed `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Rc::default(),
            quota: Some(quota),
        }
    }

    /// Create a storage pre-populated with the given items.
    pub fn with_items<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let storage = Self::new();
        storage
            .items
            .borrow_mut()
            .extend(items.into_iter().map(|(k, v)| (k.into(), v.into())));
        storage
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Total bytes used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.items
            .borrow()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        if let Some(limit) = self.quota {
            let existing = self
                .items
                .borrow()
                .get(key)
                .map(|v| key.len() + v.len())
                .unwrap_or(0);
            let needed = self.used_bytes() - existing + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }

        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}
