//! Documents flowing through the query pipeline
//!
//! A document is a JSON object plus, when it was materialized from storage,
//! its originating address (row identity) and a pin on the source page.

use serde_json::{Map, Value};

use super::address::StorageAddress;
use super::page_cache::PagePin;

/// Identity field of every stored document
pub const ID_FIELD: &str = "_id";
/// Reference id marker of an embedded cross-collection reference
pub const REF_ID_FIELD: &str = "$id";
/// Referenced collection marker of an embedded reference
pub const REF_COLLECTION_FIELD: &str = "$ref";
/// Marker set on references whose target does not exist
pub const MISSING_FIELD: &str = "$missing";

/// A tree-shaped document value with optional row identity
#[derive(Debug, Clone, Default)]
pub struct Document {
    address: Option<StorageAddress>,
    fields: Map<String, Value>,
    pin: Option<PagePin>,
}

impl Document {
    /// Creates a detached document (no row identity, no page)
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            address: None,
            fields,
            pin: None,
        }
    }

    /// Creates a document materialized from storage
    pub fn loaded(address: StorageAddress, fields: Map<String, Value>, pin: PagePin) -> Self {
        Self {
            address: Some(address),
            fields,
            pin: Some(pin),
        }
    }

    /// Returns the originating storage address
    pub fn address(&self) -> Option<StorageAddress> {
        self.address
    }

    /// Returns the document fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns the document fields for in-place modification
    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Returns a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field value, returning the previous one
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    /// Returns the page pin, if the document still holds one
    pub fn pin(&self) -> Option<&PagePin> {
        self.pin.as_ref()
    }

    /// Whether the document still pins its source page
    pub fn is_pinned(&self) -> bool {
        self.pin.as_ref().is_some_and(|p| !p.is_released())
    }

    /// Drops the association with the cached source page.
    ///
    /// Must happen before that page is evicted from its snapshot.
    pub fn release(&mut self) {
        if let Some(pin) = self.pin.take() {
            pin.release();
        }
    }

    /// Consumes the document, returning its fields
    pub fn into_fields(mut self) -> Map<String, Value> {
        self.release();
        std::mem::take(&mut self.fields)
    }

    /// Consumes the document, returning it as a JSON object
    pub fn into_value(self) -> Value {
        Value::Object(self.into_fields())
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.fields == other.fields
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}
