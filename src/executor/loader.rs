//! Candidate loaders
//!
//! Both loaders materialize index matches into documents, resolve pre-filter
//! includes, apply the predicates and evict consumed pages as the scan moves
//! on. They differ in pagination:
//!
//! - [`FullLoader`] yields every passing document. Used when a global order
//!   must be established before offset/limit can apply.
//! - [`BoundedLoader`] applies offset/limit inline and stops scanning as soon
//!   as the limit is met.

use tracing::{debug, trace};

use super::errors::PipelineResult;
use super::filters::PredicateFilter;
use super::include::IncludeResolver;
use super::result::ScanStats;
use crate::config::PipelineConfig;
use crate::index::IndexMatch;
use crate::planner::QueryPlan;
use crate::storage::{Document, DocumentLoader, PageId, PagePin, StorageResult, Transaction};

/// Collaborators and settings of one scan
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    /// Active transaction
    pub tx: &'a dyn Transaction,
    /// Loader of the queried collection
    pub loader: &'a dyn DocumentLoader,
    /// Plan being executed
    pub plan: &'a QueryPlan,
    /// Pipeline settings
    pub config: &'a PipelineConfig,
}

/// Page of the previous candidate and the pins of the documents loaded from it
#[derive(Debug, Default)]
struct PageTracker {
    current: Option<PageId>,
    pins: Vec<PagePin>,
}

impl PageTracker {
    /// Records a loaded document's page.
    ///
    /// When the page differs from the previous one, every document loaded
    /// from the previous page is released and that page is evicted from all
    /// snapshots of the transaction. A snapshot where something outside the
    /// scan still pins the page keeps it.
    fn advance(
        &mut self,
        tx: &dyn Transaction,
        page_id: PageId,
        pin: Option<&PagePin>,
        stats: &ScanStats,
    ) -> StorageResult<()> {
        if let Some(previous) = self.current.filter(|p| *p != page_id) {
            for pin in self.pins.drain(..) {
                pin.release();
            }
            for snapshot in tx.snapshots() {
                let pins = snapshot.pin_count(previous);
                if pins > 0 {
                    trace!(
                        collection = snapshot.collection(),
                        page_id = previous,
                        pins,
                        "page still pinned; kept"
                    );
                    continue;
                }
                if snapshot.evict(previous)? {
                    stats.record_eviction();
                    trace!(collection = snapshot.collection(), page_id = previous, "evicted page");
                }
            }
        }
        self.current = Some(page_id);
        if let Some(pin) = pin {
            self.pins.push(pin.clone());
        }
        Ok(())
    }
}

/// Scan state shared by both loaders
struct DocumentSource<'a, I> {
    candidates: I,
    ctx: ScanContext<'a>,
    includes: IncludeResolver<'a>,
    tracker: PageTracker,
    stats: ScanStats,
    finished: bool,
}

impl<'a, I> DocumentSource<'a, I>
where
    I: Iterator<Item = IndexMatch>,
{
    fn new(candidates: I, ctx: ScanContext<'a>, stats: ScanStats) -> Self {
        Self {
            candidates,
            ctx,
            includes: IncludeResolver::new(ctx.tx),
            tracker: PageTracker::default(),
            stats,
            finished: false,
        }
    }

    /// Next candidate that survives includes and predicates
    fn next_match(&mut self) -> PipelineResult<Option<Document>> {
        while let Some(candidate) = self.candidates.next() {
            let mut document = self.ctx.loader.load(candidate.address)?;
            let scanned = self.stats.record_scan();
            self.tracker.advance(
                self.ctx.tx,
                candidate.address.page_id,
                document.pin(),
                &self.stats,
            )?;

            let interval = self.ctx.config.pipe_safepoint_interval;
            if interval > 0 && scanned % interval == 0 {
                self.ctx.tx.safepoint_for_pipes();
            }

            for path in &self.ctx.plan.include_before {
                self.includes.resolve(&mut document, path)?;
            }
            let passed = PredicateFilter::apply_all(
                document,
                &self.ctx.plan.filters,
                &self.ctx.config.collation,
            )?;
            if let Some(document) = passed {
                return Ok(Some(document));
            }
        }
        self.finish();
        Ok(None)
    }

    /// Ends the scan with a best-effort safepoint. Runs once.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        // Failure only means memory stays higher than it could be
        if let Err(e) = self.ctx.tx.safepoint() {
            debug!(error = %e, "safepoint after scan failed; ignored");
        }
    }
}

/// Loader for queries with a global order: no pagination, no early exit
pub struct FullLoader<'a, I> {
    source: DocumentSource<'a, I>,
    done: bool,
}

impl<'a, I> FullLoader<'a, I>
where
    I: Iterator<Item = IndexMatch>,
{
    /// Creates a loader over `candidates`
    pub fn new(candidates: I, ctx: ScanContext<'a>, stats: ScanStats) -> Self {
        Self {
            source: DocumentSource::new(candidates, ctx, stats),
            done: false,
        }
    }
}

impl<'a, I> Iterator for FullLoader<'a, I>
where
    I: Iterator<Item = IndexMatch>,
{
    type Item = PipelineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.next_match() {
            Ok(Some(document)) => Some(Ok(document)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Loader for unordered queries: offset/limit applied inline
pub struct BoundedLoader<'a, I> {
    source: DocumentSource<'a, I>,
    skip: usize,
    take: usize,
    done: bool,
}

impl<'a, I> BoundedLoader<'a, I>
where
    I: Iterator<Item = IndexMatch>,
{
    /// Creates a loader honoring the plan's offset and limit
    pub fn new(candidates: I, ctx: ScanContext<'a>, stats: ScanStats) -> Self {
        Self {
            skip: ctx.plan.offset,
            take: ctx.plan.effective_limit(),
            source: DocumentSource::new(candidates, ctx, stats),
            done: false,
        }
    }
}

impl<'a, I> Iterator for BoundedLoader<'a, I>
where
    I: Iterator<Item = IndexMatch>,
{
    type Item = PipelineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.take == 0 {
            self.done = true;
            self.source.finish();
            return None;
        }

        loop {
            match self.source.next_match() {
                Ok(Some(document)) => {
                    if self.skip > 0 {
                        self.skip -= 1;
                        continue;
                    }
                    self.take -= 1;
                    if self.take == 0 {
                        self.source.finish();
                    }
                    return Some(Ok(document));
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Comparison, ExpressionError, FnExpression};
    use crate::storage::{LockMode, MemoryDatabase, MemoryTransaction, TransactionEvent};
    use serde_json::{json, Value};

    fn database(count: i64) -> MemoryDatabase {
        let db = MemoryDatabase::with_slots_per_page(2);
        for id in 1..=count {
            db.insert("items", json!({"_id": id, "even": id % 2 == 0}))
                .unwrap();
        }
        db
    }

    fn ids(documents: Vec<PipelineResult<Document>>) -> Vec<i64> {
        documents
            .into_iter()
            .map(|d| d.unwrap().get("_id").and_then(Value::as_i64).unwrap())
            .collect()
    }

    fn loaded(tx: &MemoryTransaction) -> usize {
        tx.events()
            .iter()
            .filter(|e| matches!(e, TransactionEvent::Loaded { .. }))
            .count()
    }

    #[test]
    fn test_full_loader_ignores_pagination() {
        let db = database(5);
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "items", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("items").offset(1).limit(1);
        let ctx = ScanContext { tx: &tx, loader: loader.as_ref(), plan: &plan, config: &config };

        let out = FullLoader::new(db.scan("items").into_iter(), ctx, ScanStats::default());
        assert_eq!(ids(out.collect()), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_bounded_loader_stops_at_limit() {
        let db = database(10);
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "items", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("items")
            .filter(Comparison::eq("even", json!(true)))
            .offset(1)
            .limit(2);
        let ctx = ScanContext { tx: &tx, loader: loader.as_ref(), plan: &plan, config: &config };
        let stats = ScanStats::default();

        let out = BoundedLoader::new(db.scan("items").into_iter(), ctx, stats.clone());
        assert_eq!(ids(out.collect()), vec![4, 6]);
        // 1..=6 scanned: 2 skipped, 4 and 6 taken, odd ids filtered
        assert_eq!(stats.scanned(), 6);
        assert_eq!(loaded(&tx), 6);
    }

    #[test]
    fn test_zero_limit_touches_nothing() {
        let db = database(4);
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "items", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("items").limit(0);
        let ctx = ScanContext { tx: &tx, loader: loader.as_ref(), plan: &plan, config: &config };

        let out: Vec<_> = BoundedLoader::new(db.scan("items").into_iter(), ctx, ScanStats::default()).collect();
        assert!(out.is_empty());
        assert_eq!(loaded(&tx), 0);
    }

    #[test]
    fn test_empty_candidates_skip_eviction() {
        let db = database(0);
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "items", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("items");
        let ctx = ScanContext { tx: &tx, loader: loader.as_ref(), plan: &plan, config: &config };

        let out: Vec<_> = BoundedLoader::new(std::iter::empty(), ctx, ScanStats::default()).collect();
        assert!(out.is_empty());
        assert!(!tx
            .events()
            .iter()
            .any(|e| matches!(e, TransactionEvent::Evicted { .. })));
    }

    #[test]
    fn test_pipe_safepoint_interval() {
        let db = database(7);
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "items", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default().with_pipe_safepoint_interval(3);
        let plan = QueryPlan::new("items");
        let ctx = ScanContext { tx: &tx, loader: loader.as_ref(), plan: &plan, config: &config };

        let _: Vec<_> = FullLoader::new(db.scan("items").into_iter(), ctx, ScanStats::default()).collect();
        let pipe_safepoints = tx
            .events()
            .iter()
            .filter(|e| matches!(e, TransactionEvent::PipeSafepoint))
            .count();
        assert_eq!(pipe_safepoints, 2);
    }

    #[test]
    fn test_safepoint_requested_once_at_exhaustion() {
        let db = database(3);
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "items", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("items");
        let ctx = ScanContext { tx: &tx, loader: loader.as_ref(), plan: &plan, config: &config };

        let mut out = FullLoader::new(db.scan("items").into_iter(), ctx, ScanStats::default());
        while out.next().is_some() {}
        assert!(out.next().is_none());

        let safepoints: Vec<_> = tx
            .events()
            .into_iter()
            .filter(|e| matches!(e, TransactionEvent::Safepoint { .. }))
            .collect();
        assert_eq!(safepoints, vec![TransactionEvent::Safepoint { succeeded: true }]);
    }

    #[test]
    fn test_safepoint_when_limit_reached() {
        let db = database(6);
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "items", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("items").limit(2);
        let ctx = ScanContext { tx: &tx, loader: loader.as_ref(), plan: &plan, config: &config };

        let mut out = BoundedLoader::new(db.scan("items").into_iter(), ctx, ScanStats::default());
        let first: Vec<_> = out.by_ref().take(2).collect();
        assert_eq!(ids(first), vec![1, 2]);
        drop(out);

        let safepoints: Vec<_> = tx
            .events()
            .into_iter()
            .filter(|e| matches!(e, TransactionEvent::Safepoint { .. }))
            .collect();
        assert_eq!(safepoints, vec![TransactionEvent::Safepoint { succeeded: true }]);
        assert_eq!(loaded(&tx), 2);
    }

    #[test]
    fn test_error_fuses_stream() {
        let db = database(4);
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "items", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("items").filter(FnExpression::new("fails_on_2", |d, _| {
            match d.get("_id").and_then(Value::as_i64) {
                Some(2) => Err(ExpressionError::Evaluation("bad row".into())),
                _ => Ok(json!(true)),
            }
        }));
        let ctx = ScanContext { tx: &tx, loader: loader.as_ref(), plan: &plan, config: &config };

        let mut out = BoundedLoader::new(db.scan("items").into_iter(), ctx, ScanStats::default());
        assert!(out.next().unwrap().is_ok());
        assert!(out.next().unwrap().is_err());
        assert!(out.next().is_none());
    }
}
