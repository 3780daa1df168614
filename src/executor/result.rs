//! Result types for query execution

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;

use crate::storage::Document;

/// Counters shared between the stages of one pipeline pass
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    scanned: Rc<Cell<usize>>,
    pages_evicted: Rc<Cell<usize>>,
}

impl ScanStats {
    /// Candidates materialized so far
    pub fn scanned(&self) -> usize {
        self.scanned.get()
    }

    /// Pages evicted so far
    pub fn pages_evicted(&self) -> usize {
        self.pages_evicted.get()
    }

    pub(crate) fn record_scan(&self) -> usize {
        let scanned = self.scanned.get() + 1;
        self.scanned.set(scanned);
        scanned
    }

    pub(crate) fn record_eviction(&self) {
        self.pages_evicted.set(self.pages_evicted.get() + 1);
    }
}

/// Result of query execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Documents in result order
    pub documents: Vec<Document>,
    /// Number of candidates materialized
    pub scanned_count: usize,
    /// Number of documents returned
    pub returned_count: usize,
    /// Number of pages evicted during the scan
    pub pages_evicted: usize,
}

impl ExecutionResult {
    /// Creates an empty result
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn collect(documents: Vec<Document>, stats: &ScanStats) -> Self {
        Self {
            returned_count: documents.len(),
            scanned_count: stats.scanned(),
            pages_evicted: stats.pages_evicted(),
            documents,
        }
    }

    /// Returns true if no documents matched
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns the number of results
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns an iterator over the documents
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    /// Consumes the result, returning the documents as JSON objects
    pub fn into_values(self) -> Vec<Value> {
        self.documents.into_iter().map(Document::into_value).collect()
    }
}
