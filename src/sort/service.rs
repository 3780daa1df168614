//! Disk-spilling sort service
//!
//! Protocol: stream entries in with [`SortService::insert`], then call
//! [`SortService::sort`] once to obtain the globally sorted, lazily merged
//! sequence. Containers live as long as the service or the sorted sequence
//! that took them over; dropping either releases every container file.

use std::mem;
use std::path::PathBuf;

use tracing::{debug, trace};

use super::container::{ContainerReader, SortContainer};
use super::entry::{SortEntry, SortOrder};
use super::errors::{SortError, SortResult};
use crate::config::SortConfig;

/// External sorter over `(key, address)` entries
#[derive(Debug)]
pub struct SortService {
    order: SortOrder,
    budget: usize,
    spill_dir: Option<PathBuf>,
    buffer: Vec<SortEntry>,
    containers: Vec<SortContainer>,
    inserted: usize,
}

impl SortService {
    /// Creates an empty sorter
    pub fn new(order: SortOrder, config: &SortConfig) -> Self {
        Self {
            order,
            budget: config.budget(),
            spill_dir: config.spill_dir.clone(),
            buffer: Vec::new(),
            containers: Vec::new(),
            inserted: 0,
        }
    }

    /// Streams entries into the sorter, spilling a sorted container each time
    /// the in-memory budget fills up.
    ///
    /// The first failing item stops the insert and is returned.
    pub fn insert<I, E>(&mut self, entries: I) -> Result<(), E>
    where
        I: IntoIterator<Item = Result<SortEntry, E>>,
        E: From<SortError>,
    {
        for entry in entries {
            self.buffer.push(entry?);
            self.inserted += 1;
            if self.buffer.len() >= self.budget {
                self.spill()?;
            }
        }
        Ok(())
    }

    /// Entries inserted so far
    pub fn len(&self) -> usize {
        self.inserted
    }

    /// Whether nothing was inserted
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Containers currently spilled to disk
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    fn spill(&mut self) -> SortResult<()> {
        let order = &self.order;
        self.buffer.sort_by(|a, b| order.compare(a, b));
        let container = SortContainer::spill(self.spill_dir.as_deref(), &self.buffer)?;
        debug!(
            entries = container.len(),
            containers = self.containers.len() + 1,
            "spilled sort container"
        );
        self.buffer.clear();
        self.containers.push(container);
        Ok(())
    }

    /// Produces the merged, globally sorted sequence.
    ///
    /// Ownership of the containers moves to the returned sequence.
    pub fn sort(mut self) -> SortResult<SortedEntries> {
        let order = self.order.clone();
        let mut memory = mem::take(&mut self.buffer);
        memory.sort_by(|a, b| order.compare(a, b));
        let containers = mem::take(&mut self.containers);

        let mut sources = Vec::with_capacity(containers.len() + 1);
        sources.push(MergeSource::Memory(memory.into_iter()));
        for container in &containers {
            sources.push(MergeSource::Container(container.open()?));
        }

        trace!(
            entries = self.inserted,
            containers = containers.len(),
            "sort drain started"
        );
        Ok(SortedEntries {
            order,
            sources,
            heads: Vec::new(),
            primed: false,
            finished: false,
            containers,
        })
    }
}

impl Drop for SortService {
    fn drop(&mut self) {
        if !self.containers.is_empty() {
            debug!(
                containers = self.containers.len(),
                "releasing unsorted sort containers"
            );
        }
    }
}

#[derive(Debug)]
enum MergeSource {
    Memory(std::vec::IntoIter<SortEntry>),
    Container(ContainerReader),
}

impl MergeSource {
    fn next_entry(&mut self) -> SortResult<Option<SortEntry>> {
        match self {
            MergeSource::Memory(entries) => Ok(entries.next()),
            MergeSource::Container(reader) => reader.next_entry(),
        }
    }
}

/// Globally sorted, lazily merged output of a [`SortService`].
///
/// Owns the spilled containers; they are deleted when this is dropped,
/// whether or not it was drained.
#[derive(Debug)]
pub struct SortedEntries {
    order: SortOrder,
    sources: Vec<MergeSource>,
    heads: Vec<Option<SortEntry>>,
    primed: bool,
    finished: bool,
    containers: Vec<SortContainer>,
}

impl SortedEntries {
    /// Containers still held on disk
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    fn prime(&mut self) -> SortResult<()> {
        self.primed = true;
        self.heads = Vec::with_capacity(self.sources.len());
        for source in &mut self.sources {
            self.heads.push(source.next_entry()?);
        }
        Ok(())
    }

    fn next_sorted(&mut self) -> SortResult<Option<SortEntry>> {
        if !self.primed {
            self.prime()?;
        }

        let mut best: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            if let Some(entry) = head {
                let better = match best.and_then(|b| self.heads[b].as_ref()) {
                    Some(current) => self.order.compare(entry, current).is_lt(),
                    None => true,
                };
                if better {
                    best = Some(i);
                }
            }
        }

        let Some(i) = best else {
            return Ok(None);
        };
        let next = self.sources[i].next_entry()?;
        Ok(mem::replace(&mut self.heads[i], next))
    }
}

impl Iterator for SortedEntries {
    type Item = SortResult<SortEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_sorted() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for SortedEntries {
    fn drop(&mut self) {
        if !self.containers.is_empty() {
            debug!(containers = self.containers.len(), "releasing sort containers");
        }
    }
}
