//! Query pipeline assembly
//!
//! Execution flow:
//!
//! ```text
//! ordered:    FullLoader -> OrderBy (skip/take) -> include_after -> projection
//! unordered:  BoundedLoader (skip/take inline) -> include_after -> projection
//! ```
//!
//! Every stage is a lazy iterator; nothing runs until the caller pulls.
//! Dropping the stream at any point releases what the stages hold,
//! including spilled sort containers.

use tracing::debug;

use super::errors::PipelineResult;
use super::include::IncludeStage;
use super::loader::{BoundedLoader, FullLoader, ScanContext};
use super::order::OrderBy;
use super::projector::{Select, SelectAll};
use super::result::{ExecutionResult, ScanStats};
use crate::config::PipelineConfig;
use crate::index::IndexMatch;
use crate::planner::{Projection, QueryPlan};
use crate::storage::{Document, DocumentLoader, Transaction};

/// Lazy stream of result documents. The first error ends it.
pub type DocumentStream<'a> = Box<dyn Iterator<Item = PipelineResult<Document>> + 'a>;

/// Turns index matches into query results
#[derive(Clone, Copy)]
pub struct QueryPipeline<'a> {
    tx: &'a dyn Transaction,
    loader: &'a dyn DocumentLoader,
    config: &'a PipelineConfig,
}

impl<'a> QueryPipeline<'a> {
    /// Creates a pipeline reading the queried collection through `loader`
    pub fn new(
        tx: &'a dyn Transaction,
        loader: &'a dyn DocumentLoader,
        config: &'a PipelineConfig,
    ) -> Self {
        Self { tx, loader, config }
    }

    /// Builds the lazy result stream of `plan` over `candidates`.
    ///
    /// Candidates must already be in key order when the plan relies on index
    /// order; a plan with a sort specification reorders them itself.
    pub fn pipe<I>(&self, candidates: I, plan: &'a QueryPlan) -> DocumentStream<'a>
    where
        I: IntoIterator<Item = IndexMatch>,
        I::IntoIter: 'a,
    {
        self.stream(candidates.into_iter(), plan, ScanStats::default())
    }

    /// Runs `plan` to completion, collecting documents and scan counters
    pub fn execute<I>(&self, candidates: I, plan: &'a QueryPlan) -> PipelineResult<ExecutionResult>
    where
        I: IntoIterator<Item = IndexMatch>,
        I::IntoIter: 'a,
    {
        let stats = ScanStats::default();
        let documents = self
            .stream(candidates.into_iter(), plan, stats.clone())
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(ExecutionResult::collect(documents, &stats))
    }

    fn stream<I>(&self, candidates: I, plan: &'a QueryPlan, stats: ScanStats) -> DocumentStream<'a>
    where
        I: Iterator<Item = IndexMatch> + 'a,
    {
        let ctx = ScanContext {
            tx: self.tx,
            loader: self.loader,
            plan,
            config: self.config,
        };

        debug!(
            collection = %plan.collection,
            ordered = plan.has_global_order(),
            offset = plan.offset,
            limit = ?plan.limit,
            "building query pipeline"
        );

        let loaded: DocumentStream<'a> = match &plan.sort {
            Some(sort) => Box::new(OrderBy::new(
                FullLoader::new(candidates, ctx, stats),
                sort,
                plan.offset,
                plan.effective_limit(),
                self.loader,
                self.config,
            )),
            None => Box::new(BoundedLoader::new(candidates, ctx, stats)),
        };

        let included: DocumentStream<'a> = if plan.include_after.is_empty() {
            loaded
        } else {
            Box::new(IncludeStage::new(loaded, &plan.include_after, self.tx))
        };

        let collation = &self.config.collation;
        match &plan.projection {
            Projection::Identity => included,
            Projection::PerDocument(expression) => {
                Box::new(Select::new(included, expression.as_ref(), collation))
            }
            Projection::Aggregate(expression) => {
                Box::new(SelectAll::new(included, expression.as_ref(), collation))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Comparison, DocumentPath, RowCount};
    use crate::planner::SortSpec;
    use crate::storage::{LockMode, MemoryDatabase};
    use serde_json::{json, Value};

    fn database() -> MemoryDatabase {
        let db = MemoryDatabase::with_slots_per_page(3);
        for (id, city, age) in [
            (1, "Oslo", 31),
            (2, "Lima", 25),
            (3, "Oslo", 47),
            (4, "Pune", 19),
            (5, "Oslo", 25),
        ] {
            db.insert("people", json!({"_id": id, "city": city, "age": age}))
                .unwrap();
        }
        db
    }

    fn ids(values: Vec<Value>) -> Vec<i64> {
        values.iter().map(|v| v["_id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_unordered_shape() {
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "people", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("people")
            .filter(Comparison::eq("city", json!("Oslo")))
            .offset(1);

        let pipeline = QueryPipeline::new(&tx, loader.as_ref(), &config);
        let result = pipeline.execute(db.scan("people"), &plan).unwrap();
        assert_eq!(ids(result.into_values()), vec![3, 5]);
    }

    #[test]
    fn test_ordered_shape() {
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "people", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("people")
            .order_by(SortSpec::desc(DocumentPath::field("age")))
            .limit(3);

        let pipeline = QueryPipeline::new(&tx, loader.as_ref(), &config);
        let result = pipeline.execute(db.scan("people"), &plan).unwrap();
        assert_eq!(result.scanned_count, 5);
        assert_eq!(result.returned_count, 3);
        assert_eq!(ids(result.into_values()), vec![3, 1, 2]);
    }

    #[test]
    fn test_projection_applies_last() {
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "people", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("people")
            .filter(Comparison::lt("age", json!(30)))
            .select_all(RowCount);

        let pipeline = QueryPipeline::new(&tx, loader.as_ref(), &config);
        let out: Vec<_> = pipeline
            .pipe(db.scan("people"), &plan)
            .map(|d| d.unwrap().into_value())
            .collect();
        assert_eq!(out, vec![json!({"count": 3})]);
    }

    #[test]
    fn test_nothing_runs_until_pulled() {
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "people", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let plan = QueryPlan::new("people");
        tx.clear_events();

        let pipeline = QueryPipeline::new(&tx, loader.as_ref(), &config);
        let stream = pipeline.pipe(db.scan("people"), &plan);
        assert!(tx.events().is_empty());
        drop(stream);
    }
}
