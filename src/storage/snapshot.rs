//! Transaction and snapshot collaborator contracts
//!
//! The pipeline reads through a transaction that owns one snapshot per
//! collection it touches. Its only write interaction with a snapshot is
//! evicting a fully consumed page.

use std::rc::Rc;

use super::address::{PageId, StorageAddress};
use super::document::Document;
use super::errors::StorageResult;
use crate::index::{IndexHandle, IndexLookup};

/// Lock requested when opening a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared read lock
    Read,
    /// Exclusive write lock
    Write,
}

/// Materializes documents by address
pub trait DocumentLoader {
    /// Loads the document at `address`, pinning its page in the snapshot
    fn load(&self, address: StorageAddress) -> StorageResult<Document>;
}

/// Transaction-scoped page cache of one collection
pub trait Snapshot {
    /// Collection this snapshot reads
    fn collection(&self) -> &str;

    /// Primary-key index, or `None` when the collection does not exist
    fn primary_key(&self) -> Option<IndexHandle>;

    /// Index lookup service for this collection
    fn indexer(&self) -> Rc<dyn IndexLookup>;

    /// Document loader for this collection
    fn loader(&self) -> Rc<dyn DocumentLoader>;

    /// Live documents still pinning a page (0 when not cached)
    fn pin_count(&self, page_id: PageId) -> usize;

    /// Removes a page's cache entry. Returns whether the page was cached.
    /// Evicting a pinned page is refused.
    fn evict(&self, page_id: PageId) -> StorageResult<bool>;
}

/// The active transaction as seen by the pipeline
pub trait Transaction {
    /// Opens (or reuses) the snapshot of a collection
    fn create_snapshot(
        &self,
        mode: LockMode,
        collection: &str,
        create_if_missing: bool,
    ) -> StorageResult<Rc<dyn Snapshot>>;

    /// Every snapshot opened so far in this transaction
    fn snapshots(&self) -> Vec<Rc<dyn Snapshot>>;

    /// Memory-pressure checkpoint. Best effort; callers may ignore failure.
    fn safepoint(&self) -> StorageResult<()>;

    /// Lightweight periodic checkpoint used during long scans
    fn safepoint_for_pipes(&self);
}
