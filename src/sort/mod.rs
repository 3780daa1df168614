//! External sort service
//!
//! Sorting is only reached when a query requests a global order. Entries are
//! `(key, address)` pairs, so documents never travel through the sorter.
//! When the in-memory budget fills, the buffered run is sorted and spilled to
//! a checksummed container on disk; draining merges every container with the
//! remaining in-memory run.

mod container;
mod entry;
mod errors;
mod service;

pub use container::{ContainerReader, SortContainer};
pub use entry::{SortEntry, SortOrder};
pub use errors::{SortError, SortErrorCode, SortResult};
pub use service::{SortService, SortedEntries};
