//! Snapshot page cache
//!
//! Every document materialized through a snapshot pins the page its data
//! block came from. A page may only leave the cache once nothing pins it:
//! documents must be released before their page is evicted.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::address::PageId;
use super::errors::{StorageError, StorageResult};

#[derive(Debug)]
struct PageEntry {
    page_id: PageId,
    pins: Cell<usize>,
}

impl PageEntry {
    fn unpin(&self) {
        self.pins.set(self.pins.get().saturating_sub(1));
    }
}

#[derive(Debug)]
struct PinState {
    page: Rc<PageEntry>,
    released: Cell<bool>,
}

impl Drop for PinState {
    fn drop(&mut self) {
        if !self.released.get() {
            self.page.unpin();
        }
    }
}

/// A document's association with a cached page.
///
/// Clones share the same pin; releasing any clone releases it for all.
#[derive(Debug, Clone)]
pub struct PagePin {
    state: Rc<PinState>,
}

impl PagePin {
    /// Page this pin holds
    pub fn page_id(&self) -> PageId {
        self.state.page.page_id
    }

    /// Drops the association with the page. Idempotent.
    pub fn release(&self) {
        if !self.state.released.replace(true) {
            self.state.page.unpin();
        }
    }

    /// Whether the pin has been released
    pub fn is_released(&self) -> bool {
        self.state.released.get()
    }
}

/// Pages cached by one snapshot, with pin counts
#[derive(Debug)]
pub struct PageCache {
    collection: String,
    pages: RefCell<HashMap<PageId, Rc<PageEntry>>>,
}

impl PageCache {
    /// Creates an empty cache for a collection
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            pages: RefCell::new(HashMap::new()),
        }
    }

    /// Caches the page if needed and returns a new pin on it
    pub fn pin(&self, page_id: PageId) -> PagePin {
        let mut pages = self.pages.borrow_mut();
        let page = pages
            .entry(page_id)
            .or_insert_with(|| {
                Rc::new(PageEntry {
                    page_id,
                    pins: Cell::new(0),
                })
            })
            .clone();
        page.pins.set(page.pins.get() + 1);
        PagePin {
            state: Rc::new(PinState {
                page,
                released: Cell::new(false),
            }),
        }
    }

    /// Whether the page is currently cached
    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.pages.borrow().contains_key(&page_id)
    }

    /// Number of live pins on a page (0 when not cached)
    pub fn pin_count(&self, page_id: PageId) -> usize {
        self.pages
            .borrow()
            .get(&page_id)
            .map(|p| p.pins.get())
            .unwrap_or(0)
    }

    /// Cached page ids in ascending order
    pub fn cached_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<_> = self.pages.borrow().keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    /// Removes a page from the cache.
    ///
    /// Returns `Ok(false)` when the page was not cached. Evicting a page that
    /// a live document still pins is refused.
    pub fn evict(&self, page_id: PageId) -> StorageResult<bool> {
        let mut pages = self.pages.borrow_mut();
        let pins = match pages.get(&page_id) {
            Some(page) => page.pins.get(),
            None => return Ok(false),
        };
        if pins > 0 {
            return Err(StorageError::page_pinned(&self.collection, page_id, pins));
        }
        pages.remove(&page_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_counts() {
        let cache = PageCache::new("users");
        let a = cache.pin(1);
        let b = cache.pin(1);
        assert_eq!(cache.pin_count(1), 2);

        a.release();
        assert_eq!(cache.pin_count(1), 1);
        drop(b);
        assert_eq!(cache.pin_count(1), 0);
        assert!(cache.is_cached(1));
    }

    #[test]
    fn test_release_is_idempotent() {
        let cache = PageCache::new("users");
        let pin = cache.pin(4);
        let clone = pin.clone();
        pin.release();
        clone.release();
        drop(pin);
        drop(clone);
        assert_eq!(cache.pin_count(4), 0);
    }

    #[test]
    fn test_evict_refuses_pinned_page() {
        let cache = PageCache::new("users");
        let pin = cache.pin(2);

        let err = cache.evict(2).unwrap_err();
        assert!(err.is_fatal());

        pin.release();
        assert!(cache.evict(2).unwrap());
        assert!(!cache.is_cached(2));
        assert!(!cache.evict(2).unwrap());
    }

    #[test]
    fn test_cached_pages_sorted() {
        let cache = PageCache::new("users");
        let _p = [cache.pin(9), cache.pin(3), cache.pin(5)];
        assert_eq!(cache.cached_pages(), vec![3, 5, 9]);
    }
}
