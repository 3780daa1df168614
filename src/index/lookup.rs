//! Index matches and primary-key lookup

use serde_json::Value;

use crate::storage::{StorageAddress, StorageResult};

/// Scan direction of an index traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Ascending key order
    #[default]
    Ascending,
    /// Descending key order
    Descending,
}

/// A candidate produced by an index scan
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    /// Index key of the candidate
    pub key: Value,
    /// Where the candidate document lives
    pub address: StorageAddress,
}

impl IndexMatch {
    /// Creates a new index match
    pub fn new(key: Value, address: StorageAddress) -> Self {
        Self { key, address }
    }
}

/// Handle naming one index of one collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexHandle {
    /// Owning collection
    pub collection: String,
    /// Index name (`_id` for the primary key)
    pub name: String,
}

impl IndexHandle {
    /// Handle of a collection's primary-key index
    pub fn primary_key(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: crate::storage::ID_FIELD.to_string(),
        }
    }
}

/// Point lookups into an index
pub trait IndexLookup {
    /// Finds the first entry for `key` scanning in `order`.
    ///
    /// With `exact` only an equal key matches; otherwise the first key at or
    /// past `key` in scan order is returned.
    fn find(
        &self,
        index: &IndexHandle,
        key: &Value,
        exact: bool,
        order: Order,
    ) -> StorageResult<Option<IndexMatch>>;
}
