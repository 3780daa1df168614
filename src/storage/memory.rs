//! In-memory storage engine
//!
//! Implements every collaborator contract the pipeline consumes: documents
//! packed into fixed-size pages with global page ids, a primary-key index
//! per collection, per-collection snapshots with page caches, and a
//! transaction that records what the pipeline asked of it.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::trace;

use super::address::{PageId, StorageAddress};
use super::document::{Document, ID_FIELD};
use super::errors::{StorageError, StorageResult};
use super::page_cache::PageCache;
use super::snapshot::{DocumentLoader, LockMode, Snapshot, Transaction};
use crate::expression::Collation;
use crate::index::{IndexHandle, IndexLookup, IndexMatch, Order};

/// Default number of document slots per page
pub const DEFAULT_SLOTS_PER_PAGE: u16 = 4;

#[derive(Debug, Default)]
struct CollectionData {
    documents: BTreeMap<StorageAddress, Map<String, Value>>,
    /// Primary key entries in ascending key order
    primary: Vec<(Value, StorageAddress)>,
    /// Page being filled and its next free slot
    open_page: Option<(PageId, u16)>,
}

#[derive(Debug)]
struct Store {
    collections: BTreeMap<String, CollectionData>,
    next_page: PageId,
    slots_per_page: u16,
    collation: Collation,
}

impl Store {
    fn allocate(&mut self, collection: &str) -> StorageAddress {
        let slots_per_page = self.slots_per_page;
        let next_page = &mut self.next_page;
        let data = self.collections.entry(collection.to_string()).or_default();
        let (page_id, slot) = match data.open_page {
            Some((page_id, slot)) if slot < slots_per_page => (page_id, slot),
            _ => {
                let page_id = *next_page;
                *next_page += 1;
                (page_id, 0)
            }
        };
        data.open_page = Some((page_id, slot + 1));
        StorageAddress::new(page_id, slot)
    }
}

/// In-memory database of named collections
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    store: Rc<RefCell<Store>>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::with_slots_per_page(DEFAULT_SLOTS_PER_PAGE)
    }
}

impl MemoryDatabase {
    /// Creates an empty database with the default page size
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty database holding `slots` documents per page
    pub fn with_slots_per_page(slots: u16) -> Self {
        Self {
            store: Rc::new(RefCell::new(Store {
                collections: BTreeMap::new(),
                next_page: 1,
                slots_per_page: slots.max(1),
                collation: Collation::ordinal(),
            })),
        }
    }

    /// Creates a collection if it does not exist
    pub fn create_collection(&self, name: &str) {
        self.store
            .borrow_mut()
            .collections
            .entry(name.to_string())
            .or_default();
    }

    /// Whether a collection exists
    pub fn has_collection(&self, name: &str) -> bool {
        self.store.borrow().collections.contains_key(name)
    }

    /// Makes the next insert into `collection` start a fresh page
    pub fn seal_page(&self, collection: &str) {
        if let Some(data) = self.store.borrow_mut().collections.get_mut(collection) {
            data.open_page = None;
        }
    }

    /// Makes the next fresh page of any collection get `page_id`.
    ///
    /// Page ids are only unique within a snapshot, so two collections may
    /// reuse the same ids. Every open page is sealed first.
    pub fn start_pages_at(&self, page_id: PageId) {
        let mut store = self.store.borrow_mut();
        store.next_page = page_id;
        for data in store.collections.values_mut() {
            data.open_page = None;
        }
    }

    /// Stores a document. It must be an object with a unique `_id`.
    pub fn insert(&self, collection: &str, document: Value) -> StorageResult<StorageAddress> {
        let Value::Object(fields) = document else {
            return Err(StorageError::write_failed("document must be an object"));
        };
        let id = match fields.get(ID_FIELD) {
            Some(id) if !id.is_null() => id.clone(),
            _ => return Err(StorageError::write_failed("document has no _id")),
        };

        let mut store = self.store.borrow_mut();
        let collation = store.collation.clone();
        if let Some(data) = store.collections.get(collection) {
            if data.primary.iter().any(|(k, _)| collation.equals(k, &id)) {
                return Err(StorageError::write_failed(format!(
                    "duplicate _id {} in '{}'",
                    id, collection
                )));
            }
        }

        let address = store.allocate(collection);
        let data = store.collections.entry(collection.to_string()).or_default();
        let at = data
            .primary
            .partition_point(|(k, _)| collation.compare(k, &id).is_lt());
        data.primary.insert(at, (id, address));
        data.documents.insert(address, fields);
        Ok(address)
    }

    /// Primary-key scan of a collection in ascending key order
    pub fn scan(&self, collection: &str) -> Vec<IndexMatch> {
        self.store
            .borrow()
            .collections
            .get(collection)
            .map(|data| {
                data.primary
                    .iter()
                    .map(|(key, address)| IndexMatch::new(key.clone(), *address))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Starts a transaction
    pub fn begin(&self) -> MemoryTransaction {
        MemoryTransaction {
            store: Rc::clone(&self.store),
            snapshots: RefCell::new(Vec::new()),
            events: Rc::new(RefCell::new(Vec::new())),
            fail_safepoints: Cell::new(false),
        }
    }
}

/// What the pipeline asked of a [`MemoryTransaction`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    /// A snapshot was opened
    SnapshotOpened { collection: String, mode: LockMode },
    /// A document was materialized
    Loaded {
        collection: String,
        address: StorageAddress,
    },
    /// A page was evicted by the pipeline
    Evicted { collection: String, page_id: PageId },
    /// A safepoint was requested
    Safepoint { succeeded: bool },
    /// An unpinned page was trimmed by a safepoint
    Trimmed { collection: String, page_id: PageId },
    /// A lightweight pipe safepoint was requested
    PipeSafepoint,
}

type EventLog = Rc<RefCell<Vec<TransactionEvent>>>;

#[derive(Debug)]
struct CollectionReader {
    collection: String,
    exists: bool,
    store: Rc<RefCell<Store>>,
    cache: PageCache,
    events: EventLog,
}

impl DocumentLoader for CollectionReader {
    fn load(&self, address: StorageAddress) -> StorageResult<Document> {
        let fields = self
            .store
            .borrow()
            .collections
            .get(&self.collection)
            .and_then(|data| data.documents.get(&address))
            .cloned()
            .ok_or_else(|| StorageError::document_not_found(address))?;

        let pin = self.cache.pin(address.page_id);
        self.events.borrow_mut().push(TransactionEvent::Loaded {
            collection: self.collection.clone(),
            address,
        });
        Ok(Document::loaded(address, fields, pin))
    }
}

impl IndexLookup for CollectionReader {
    fn find(
        &self,
        index: &IndexHandle,
        key: &Value,
        exact: bool,
        order: Order,
    ) -> StorageResult<Option<IndexMatch>> {
        if index.collection != self.collection || index.name != ID_FIELD {
            return Err(StorageError::read_failed(format!(
                "unknown index {}.{}",
                index.collection, index.name
            )));
        }

        let store = self.store.borrow();
        let Some(data) = store.collections.get(&self.collection) else {
            return Ok(None);
        };
        let collation = &store.collation;
        let entries = &data.primary;

        let found = match (exact, order) {
            (true, Order::Ascending) => entries.iter().find(|(k, _)| collation.equals(k, key)),
            (true, Order::Descending) => {
                entries.iter().rev().find(|(k, _)| collation.equals(k, key))
            }
            (false, Order::Ascending) => entries
                .iter()
                .find(|(k, _)| !collation.compare(k, key).is_lt()),
            (false, Order::Descending) => entries
                .iter()
                .rev()
                .find(|(k, _)| !collation.compare(k, key).is_gt()),
        };
        Ok(found.map(|(k, address)| IndexMatch::new(k.clone(), *address)))
    }
}

#[derive(Debug)]
struct MemorySnapshot {
    reader: Rc<CollectionReader>,
}

impl Snapshot for MemorySnapshot {
    fn collection(&self) -> &str {
        &self.reader.collection
    }

    fn primary_key(&self) -> Option<IndexHandle> {
        self.reader
            .exists
            .then(|| IndexHandle::primary_key(self.reader.collection.clone()))
    }

    fn indexer(&self) -> Rc<dyn IndexLookup> {
        self.reader.clone()
    }

    fn loader(&self) -> Rc<dyn DocumentLoader> {
        self.reader.clone()
    }

    fn pin_count(&self, page_id: PageId) -> usize {
        self.reader.cache.pin_count(page_id)
    }

    fn evict(&self, page_id: PageId) -> StorageResult<bool> {
        let evicted = self.reader.cache.evict(page_id)?;
        if evicted {
            self.reader
                .events
                .borrow_mut()
                .push(TransactionEvent::Evicted {
                    collection: self.reader.collection.clone(),
                    page_id,
                });
        }
        Ok(evicted)
    }
}

/// Transaction over a [`MemoryDatabase`]
#[derive(Debug)]
pub struct MemoryTransaction {
    store: Rc<RefCell<Store>>,
    snapshots: RefCell<Vec<Rc<MemorySnapshot>>>,
    events: EventLog,
    fail_safepoints: Cell<bool>,
}

impl MemoryTransaction {
    /// Everything recorded so far
    pub fn events(&self) -> Vec<TransactionEvent> {
        self.events.borrow().clone()
    }

    /// Forgets recorded events
    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Makes every following `safepoint` call fail (or succeed again)
    pub fn fail_safepoints(&self, fail: bool) {
        self.fail_safepoints.set(fail);
    }

    /// Pages cached by a collection's snapshot
    pub fn cached_pages(&self, collection: &str) -> Vec<PageId> {
        self.find_snapshot(collection)
            .map(|s| s.reader.cache.cached_pages())
            .unwrap_or_default()
    }

    /// Live pins on a page of a collection's snapshot
    pub fn pin_count(&self, collection: &str, page_id: PageId) -> usize {
        self.find_snapshot(collection)
            .map(|s| s.reader.cache.pin_count(page_id))
            .unwrap_or(0)
    }

    fn find_snapshot(&self, collection: &str) -> Option<Rc<MemorySnapshot>> {
        self.snapshots
            .borrow()
            .iter()
            .find(|s| s.reader.collection == collection)
            .cloned()
    }
}

impl Transaction for MemoryTransaction {
    fn create_snapshot(
        &self,
        mode: LockMode,
        collection: &str,
        create_if_missing: bool,
    ) -> StorageResult<Rc<dyn Snapshot>> {
        if let Some(existing) = self.find_snapshot(collection) {
            return Ok(existing);
        }

        let exists = {
            let mut store = self.store.borrow_mut();
            if create_if_missing {
                store.collections.entry(collection.to_string()).or_default();
            }
            store.collections.contains_key(collection)
        };

        let snapshot = Rc::new(MemorySnapshot {
            reader: Rc::new(CollectionReader {
                collection: collection.to_string(),
                exists,
                store: Rc::clone(&self.store),
                cache: PageCache::new(collection),
                events: Rc::clone(&self.events),
            }),
        });
        self.snapshots.borrow_mut().push(Rc::clone(&snapshot));
        self.events
            .borrow_mut()
            .push(TransactionEvent::SnapshotOpened {
                collection: collection.to_string(),
                mode,
            });
        Ok(snapshot)
    }

    fn snapshots(&self) -> Vec<Rc<dyn Snapshot>> {
        self.snapshots
            .borrow()
            .iter()
            .map(|s| Rc::clone(s) as Rc<dyn Snapshot>)
            .collect()
    }

    fn safepoint(&self) -> StorageResult<()> {
        if self.fail_safepoints.get() {
            self.events
                .borrow_mut()
                .push(TransactionEvent::Safepoint { succeeded: false });
            return Err(StorageError::safepoint_failed("safepoint rejected"));
        }

        self.events
            .borrow_mut()
            .push(TransactionEvent::Safepoint { succeeded: true });
        for snapshot in self.snapshots.borrow().iter() {
            let cache = &snapshot.reader.cache;
            for page_id in cache.cached_pages() {
                if cache.pin_count(page_id) == 0 && cache.evict(page_id)? {
                    trace!(collection = %snapshot.reader.collection, page_id, "safepoint trimmed page");
                    self.events.borrow_mut().push(TransactionEvent::Trimmed {
                        collection: snapshot.reader.collection.clone(),
                        page_id,
                    });
                }
            }
        }
        Ok(())
    }

    fn safepoint_for_pipes(&self) {
        self.events
            .borrow_mut()
            .push(TransactionEvent::PipeSafepoint);
    }
}
