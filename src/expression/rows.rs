//! Cached, replayable view over a whole result set
//!
//! Aggregate projections evaluate once over every row. The row set keeps the
//! rows it was built from and indexes them by row identity so an expression
//! can walk them as many times as it needs.

use std::collections::HashMap;
use std::rc::Rc;

use crate::storage::{Document, StorageAddress};

/// Replayable row view keyed by storage address
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    rows: Rc<Vec<Document>>,
    by_address: Rc<HashMap<StorageAddress, usize>>,
}

impl RowSet {
    /// Builds a row set from documents in result order
    pub fn from_documents(rows: Vec<Document>) -> Self {
        let by_address = rows
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| doc.address().map(|a| (a, i)))
            .collect();
        Self {
            rows: Rc::new(rows),
            by_address: Rc::new(by_address),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the view is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at a position in result order
    pub fn get(&self, index: usize) -> Option<&Document> {
        self.rows.get(index)
    }

    /// Row with the given identity
    pub fn find(&self, address: StorageAddress) -> Option<&Document> {
        self.by_address.get(&address).and_then(|&i| self.rows.get(i))
    }

    /// Iterates rows in result order; may be called any number of times
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.rows.iter()
    }
}
