//! Sort entries and their ordering

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expression::Collation;
use crate::planner::SortDirection;
use crate::storage::StorageAddress;

/// Unit streamed through the sorter: a key plus the row it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortEntry {
    /// Sort key
    pub key: Value,
    /// Row identity used to re-materialize the document
    pub address: StorageAddress,
}

impl SortEntry {
    /// Creates a new entry
    pub fn new(key: Value, address: StorageAddress) -> Self {
        Self { key, address }
    }
}

/// Ordering of sort entries.
///
/// Keys compare under the collation in the requested direction. Equal keys
/// fall back to ascending storage address regardless of direction, so the
/// output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    /// Requested direction
    pub direction: SortDirection,
    /// Collation for key comparison
    pub collation: Collation,
}

impl SortOrder {
    /// Creates an order
    pub fn new(direction: SortDirection, collation: Collation) -> Self {
        Self {
            direction,
            collation,
        }
    }

    /// Compares two entries
    pub fn compare(&self, a: &SortEntry, b: &SortEntry) -> Ordering {
        let keys = self.collation.compare(&a.key, &b.key);
        let keys = match self.direction {
            SortDirection::Asc => keys,
            SortDirection::Desc => keys.reverse(),
        };
        keys.then_with(|| a.address.cmp(&b.address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(key: Value, page: u32) -> SortEntry {
        SortEntry::new(key, StorageAddress::new(page, 0))
    }

    #[test]
    fn test_direction() {
        let asc = SortOrder::new(SortDirection::Asc, Collation::ordinal());
        let desc = SortOrder::new(SortDirection::Desc, Collation::ordinal());
        let a = entry(json!(1), 5);
        let b = entry(json!(2), 1);
        assert_eq!(asc.compare(&a, &b), Ordering::Less);
        assert_eq!(desc.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_tie_break_by_address_in_both_directions() {
        let a = entry(json!("x"), 1);
        let b = entry(json!("x"), 2);
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let order = SortOrder::new(direction, Collation::ordinal());
            assert_eq!(order.compare(&a, &b), Ordering::Less);
        }
    }
}
