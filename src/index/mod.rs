//! Index collaborator types
//!
//! The pipeline never walks index structures itself. It consumes a candidate
//! sequence of [`IndexMatch`] values produced by an index scan, and performs
//! primary-key point lookups through [`IndexLookup`] while resolving
//! references.

mod lookup;

pub use lookup::{IndexHandle, IndexLookup, IndexMatch, Order};
