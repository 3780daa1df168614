//! ORDER BY through the external sort service
//!
//! On first poll the whole input is drained: each document yields a sort key
//! and its address, then is dropped. The sorted entries are paginated and each
//! surviving entry is re-materialized through the document loader. The sort
//! service (and every container it spilled) is released as soon as the stage
//! stops needing it, or when the stage is dropped.

use std::mem;

use tracing::debug;

use super::errors::{PipelineError, PipelineResult};
use crate::config::PipelineConfig;
use crate::planner::SortSpec;
use crate::sort::{SortEntry, SortOrder, SortService, SortedEntries};
use crate::storage::{Document, DocumentLoader};

enum OrderState<'a, S> {
    Pending {
        input: S,
        sort: &'a SortSpec,
        config: &'a PipelineConfig,
    },
    Draining(SortedEntries),
    Done,
}

/// Sorted, paginated, re-materialized document stream
pub struct OrderBy<'a, S> {
    state: OrderState<'a, S>,
    loader: &'a dyn DocumentLoader,
    offset: usize,
    take: usize,
}

impl<'a, S> OrderBy<'a, S>
where
    S: Iterator<Item = PipelineResult<Document>>,
{
    /// Sorts `input` by `sort`, then applies `skip(offset).take(limit)`
    pub fn new(
        input: S,
        sort: &'a SortSpec,
        offset: usize,
        limit: usize,
        loader: &'a dyn DocumentLoader,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            state: OrderState::Pending {
                input,
                sort,
                config,
            },
            loader,
            offset,
            take: limit,
        }
    }

    fn start(
        &mut self,
        input: S,
        sort: &SortSpec,
        config: &PipelineConfig,
    ) -> PipelineResult<SortedEntries> {
        let order = SortOrder::new(sort.direction, config.collation.clone());
        let mut sorter = SortService::new(order, &config.sort);

        let entries = input.map(|item| -> PipelineResult<SortEntry> {
            let document = item?;
            let address = document.address().ok_or(PipelineError::Unaddressed)?;
            let key = sort.expression.eval_scalar(&document, &config.collation)?;
            Ok(SortEntry::new(key, address))
        });
        sorter.insert(entries)?;
        debug!(
            entries = sorter.len(),
            containers = sorter.container_count(),
            "sort input complete"
        );

        let mut sorted = sorter.sort()?;
        for _ in 0..self.offset {
            match sorted.next() {
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }
        Ok(sorted)
    }

    fn next_document(&mut self) -> PipelineResult<Option<Document>> {
        if let OrderState::Pending { .. } = self.state {
            if let OrderState::Pending {
                input,
                sort,
                config,
            } = mem::replace(&mut self.state, OrderState::Done)
            {
                let sorted = self.start(input, sort, config)?;
                self.state = OrderState::Draining(sorted);
            }
        }

        if self.take == 0 {
            self.state = OrderState::Done;
            return Ok(None);
        }
        let OrderState::Draining(sorted) = &mut self.state else {
            return Ok(None);
        };
        match sorted.next() {
            Some(Ok(entry)) => {
                self.take -= 1;
                Ok(Some(self.loader.load(entry.address)?))
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                self.state = OrderState::Done;
                Ok(None)
            }
        }
    }
}

impl<'a, S> Iterator for OrderBy<'a, S>
where
    S: Iterator<Item = PipelineResult<Document>>,
{
    type Item = PipelineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_document() {
            Ok(Some(document)) => Some(Ok(document)),
            Ok(None) => None,
            Err(e) => {
                // Releases the sorter and its containers
                self.state = OrderState::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortConfig;
    use crate::expression::{DocumentPath, ExpressionError, FnExpression};
    use crate::storage::{LockMode, MemoryDatabase, Snapshot, Transaction};
    use serde_json::{json, Value};
    use std::rc::Rc;
    use tempfile::TempDir;

    fn database() -> MemoryDatabase {
        let db = MemoryDatabase::with_slots_per_page(2);
        for (id, score) in [(1, 30), (2, 10), (3, 50), (4, 20), (5, 40)] {
            db.insert("scores", json!({"_id": id, "score": score})).unwrap();
        }
        db
    }

    fn input(db: &MemoryDatabase, snapshot: &Rc<dyn Snapshot>) -> Vec<PipelineResult<Document>> {
        let loader = snapshot.loader();
        db.scan("scores")
            .into_iter()
            .map(|m| loader.load(m.address).map_err(PipelineError::from))
            .collect()
    }

    fn scores(out: impl Iterator<Item = PipelineResult<Document>>) -> Vec<i64> {
        out.map(|d| d.unwrap().get("score").and_then(Value::as_i64).unwrap())
            .collect()
    }

    fn files_in(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[test]
    fn test_sort_then_paginate() {
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "scores", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let sort = SortSpec::desc(DocumentPath::field("score"));

        let out = OrderBy::new(input(&db, &snapshot).into_iter(), &sort, 1, 3, loader.as_ref(), &config);
        assert_eq!(scores(out), vec![40, 30, 20]);
    }

    #[test]
    fn test_unbounded_ascending() {
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "scores", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let sort = SortSpec::asc(DocumentPath::field("score"));

        let out = OrderBy::new(input(&db, &snapshot).into_iter(), &sort, 0, usize::MAX, loader.as_ref(), &config);
        assert_eq!(scores(out), vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_early_drop_releases_containers() {
        let dir = TempDir::new().unwrap();
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "scores", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default().with_sort(SortConfig::spill_to(dir.path(), 2));
        let sort = SortSpec::asc(DocumentPath::field("score"));

        let mut out = OrderBy::new(input(&db, &snapshot).into_iter(), &sort, 0, usize::MAX, loader.as_ref(), &config);
        let first = out.next().unwrap().unwrap();
        assert_eq!(first.get("score"), Some(&json!(10)));
        assert_eq!(files_in(&dir), 2);

        drop(out);
        assert_eq!(files_in(&dir), 0);
    }

    #[test]
    fn test_limit_reached_releases_containers() {
        let dir = TempDir::new().unwrap();
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "scores", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default().with_sort(SortConfig::spill_to(dir.path(), 2));
        let sort = SortSpec::asc(DocumentPath::field("score"));

        let mut out = OrderBy::new(input(&db, &snapshot).into_iter(), &sort, 0, 1, loader.as_ref(), &config);
        assert!(out.next().unwrap().is_ok());
        assert!(out.next().is_none());
        assert_eq!(files_in(&dir), 0);
    }

    #[test]
    fn test_key_failure_propagates_and_releases() {
        let dir = TempDir::new().unwrap();
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "scores", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default().with_sort(SortConfig::spill_to(dir.path(), 1));
        let sort = SortSpec::asc(FnExpression::new("key", |d, _| {
            match d.get("_id").and_then(Value::as_i64) {
                Some(4) => Err(ExpressionError::Evaluation("no key".into())),
                _ => Ok(d.get("score").cloned().unwrap_or(Value::Null)),
            }
        }));

        let mut out = OrderBy::new(input(&db, &snapshot).into_iter(), &sort, 0, usize::MAX, loader.as_ref(), &config);
        assert!(matches!(out.next(), Some(Err(PipelineError::Expression(_)))));
        assert!(out.next().is_none());
        assert_eq!(files_in(&dir), 0);
    }

    #[test]
    fn test_unaddressed_document_rejected() {
        let db = database();
        let tx = db.begin();
        let snapshot = tx.create_snapshot(LockMode::Read, "scores", false).unwrap();
        let loader = snapshot.loader();
        let config = PipelineConfig::default();
        let sort = SortSpec::asc(DocumentPath::field("score"));
        let detached = vec![Ok(Document::default())];

        let mut out = OrderBy::new(detached.into_iter(), &sort, 0, usize::MAX, loader.as_ref(), &config);
        assert!(matches!(out.next(), Some(Err(PipelineError::Unaddressed))));
    }
}
