//! Storage trait definition

use crate::storage::error::StorageResult;

/// Minimal key-value persistence contract.
///
/// Mirrors the browser `Storage` interface (`getItem`, `setItem`,
/// `removeItem`). Methods take `&self` because the browser objects are shared
/// handles; implementations use interior mutability where needed.
pub trait Storage {
    /// Read the value stored under `key`, `None` if absent.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete `key`. Deleting an absent key is not an error.
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Check if a key is present.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get_item(key)?.is_some())
    }
}
