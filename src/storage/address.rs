//! Storage addresses
//!
//! A document's data block is located by the logical page that holds it and
//! the slot inside that page. The address doubles as row identity: the
//! external sorter carries it instead of the whole document.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical page identifier
pub type PageId = u32;

/// Location of a document data block: `(page, slot)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageAddress {
    /// Page holding the data block
    pub page_id: PageId,
    /// Slot index inside the page
    pub slot: u16,
}

impl StorageAddress {
    /// Creates a new address
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_orders_by_page_then_slot() {
        let a = StorageAddress::new(1, 9);
        let b = StorageAddress::new(2, 0);
        let c = StorageAddress::new(2, 1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_address_display() {
        assert_eq!(StorageAddress::new(12, 3).to_string(), "12:3");
    }
}
