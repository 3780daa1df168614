//! Storage collaborators of the query pipeline
//!
//! Addresses, documents and the page cache they pin, plus the transaction
//! and snapshot contracts the pipeline reads through. Page layout and the
//! lock manager live outside this crate; [`MemoryDatabase`] is a complete
//! in-memory implementation of the contracts.
//!
//! # Invariants
//!
//! - A document is released before its source page is evicted
//! - Eviction refuses pages that live documents still pin

mod address;
mod checksum;
mod document;
mod errors;
mod memory;
mod page_cache;
mod snapshot;

pub use address::{PageId, StorageAddress};
pub use checksum::{compute_checksum, verify_checksum};
pub use document::{Document, ID_FIELD, MISSING_FIELD, REF_COLLECTION_FIELD, REF_ID_FIELD};
pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use memory::{MemoryDatabase, MemoryTransaction, TransactionEvent};
pub use page_cache::{PageCache, PagePin};
pub use snapshot::{DocumentLoader, LockMode, Snapshot, Transaction};
