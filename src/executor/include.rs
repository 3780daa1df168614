//! Reference resolution ("include")
//!
//! An embedded reference is a sub-document carrying `$id` and `$ref`. Resolving
//! it looks `$id` up in the primary key of the `$ref` collection and merges the
//! referenced document's fields (minus its `_id`) into the sub-document,
//! dropping `$ref`. Unresolvable references gain `$missing: true` and keep
//! their markers.

use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::debug;

use super::errors::{PipelineError, PipelineResult};
use crate::expression::DocumentPath;
use crate::index::{IndexHandle, IndexLookup, Order};
use crate::storage::{
    Document, DocumentLoader, LockMode, Snapshot, StorageError, Transaction, ID_FIELD, MISSING_FIELD,
    REF_COLLECTION_FIELD, REF_ID_FIELD,
};

/// Setup for the most recently referenced collection
struct ReferenceCache {
    snapshot: Rc<dyn Snapshot>,
    primary_key: Option<IndexHandle>,
    indexer: Rc<dyn IndexLookup>,
    loader: Rc<dyn DocumentLoader>,
}

impl ReferenceCache {
    fn open(snapshot: Rc<dyn Snapshot>) -> Self {
        Self {
            primary_key: snapshot.primary_key(),
            indexer: snapshot.indexer(),
            loader: snapshot.loader(),
            snapshot,
        }
    }

    fn collection(&self) -> &str {
        self.snapshot.collection()
    }
}

/// Resolves references along document paths.
///
/// Keeps a single cached snapshot keyed by the last referenced collection;
/// a reference to another collection replaces it.
pub struct IncludeResolver<'a> {
    tx: &'a dyn Transaction,
    cache: Option<ReferenceCache>,
}

impl<'a> IncludeResolver<'a> {
    /// Creates a resolver reading through `tx`
    pub fn new(tx: &'a dyn Transaction) -> Self {
        Self { tx, cache: None }
    }

    /// Collection currently cached, if any
    pub fn cached_collection(&self) -> Option<&str> {
        self.cache.as_ref().map(ReferenceCache::collection)
    }

    /// Resolves every reference `path` reaches in `document`
    pub fn resolve(&mut self, document: &mut Document, path: &DocumentPath) -> PipelineResult<()> {
        path.try_for_each_mut(document.fields_mut(), &mut |value: &mut Value| {
            self.resolve_value(value)
        })
    }

    fn resolve_value(&mut self, value: &mut Value) -> PipelineResult<()> {
        match value {
            Value::Object(reference) => self.resolve_reference(reference),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(reference) = item {
                        self.resolve_reference(reference)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn resolve_reference(&mut self, reference: &mut Map<String, Value>) -> PipelineResult<()> {
        let id = match reference.get(REF_ID_FIELD) {
            Some(id) if !id.is_null() => id.clone(),
            _ => return Ok(()),
        };
        let collection = match reference.get(REF_COLLECTION_FIELD) {
            Some(Value::String(name)) => name.clone(),
            _ => return Ok(()),
        };

        let cache = self.reference_cache(&collection)?;
        let found = match &cache.primary_key {
            Some(pk) => cache.indexer.find(pk, &id, true, Order::Ascending)?,
            None => None,
        };

        match found {
            Some(target) => {
                let referenced = cache.loader.load(target.address)?;
                reference.remove(REF_COLLECTION_FIELD);
                for (field, value) in referenced.into_fields() {
                    if field != ID_FIELD {
                        reference.insert(field, value);
                    }
                }
            }
            None => {
                reference.insert(MISSING_FIELD.to_string(), Value::Bool(true));
            }
        }
        Ok(())
    }

    fn reference_cache(&mut self, collection: &str) -> PipelineResult<&ReferenceCache> {
        let stale = self
            .cache
            .as_ref()
            .map_or(true, |cache| cache.collection() != collection);
        if stale {
            let snapshot = self
                .tx
                .create_snapshot(LockMode::Read, collection, false)
                .map_err(PipelineError::from)?;
            debug!(collection, "opened include snapshot");
            self.cache = Some(ReferenceCache::open(snapshot));
        }
        match &self.cache {
            Some(cache) => Ok(cache),
            None => Err(PipelineError::from(StorageError::read_failed(format!(
                "no include snapshot for '{}'",
                collection
            )))),
        }
    }
}

/// Resolves a list of include paths on every document of a stream
pub struct IncludeStage<'a, S> {
    inner: S,
    paths: &'a [DocumentPath],
    resolver: IncludeResolver<'a>,
    done: bool,
}

impl<'a, S> IncludeStage<'a, S>
where
    S: Iterator<Item = PipelineResult<Document>>,
{
    /// Wraps `inner`, resolving `paths` in order on each document
    pub fn new(inner: S, paths: &'a [DocumentPath], tx: &'a dyn Transaction) -> Self {
        Self {
            inner,
            paths,
            resolver: IncludeResolver::new(tx),
            done: false,
        }
    }

    fn include(&mut self, mut document: Document) -> PipelineResult<Document> {
        for path in self.paths {
            self.resolver.resolve(&mut document, path)?;
        }
        Ok(document)
    }
}

impl<'a, S> Iterator for IncludeStage<'a, S>
where
    S: Iterator<Item = PipelineResult<Document>>,
{
    type Item = PipelineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.inner.next()? {
            Ok(document) => self.include(document),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
