//! Query plan consumed by the execution pipeline
//!
//! The planner decides the index scan and builds this plan; the pipeline
//! reads it and never changes it.

use crate::expression::{DocumentPath, Expression};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order
    #[default]
    Asc,
    /// Descending order
    Desc,
}

/// ORDER BY specification
#[derive(Debug)]
pub struct SortSpec {
    /// Expression producing the sort key
    pub expression: Box<dyn Expression>,
    /// Direction of the order
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending sort on an expression
    pub fn asc(expression: impl Expression + 'static) -> Self {
        Self {
            expression: Box::new(expression),
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort on an expression
    pub fn desc(expression: impl Expression + 'static) -> Self {
        Self {
            expression: Box::new(expression),
            direction: SortDirection::Desc,
        }
    }
}

/// How the final document sequence becomes the query's output
#[derive(Debug, Default)]
pub enum Projection {
    /// `$`: documents pass through unchanged
    #[default]
    Identity,
    /// One output row per input document
    PerDocument(Box<dyn Expression>),
    /// A single evaluation over the whole result set
    Aggregate(Box<dyn Expression>),
}

/// Query plan
#[derive(Debug, Default)]
pub struct QueryPlan {
    /// Collection being queried
    pub collection: String,
    /// References resolved before filtering, in order
    pub include_before: Vec<DocumentPath>,
    /// Predicates; all must pass, evaluated in order
    pub filters: Vec<Box<dyn Expression>>,
    /// Global order, if any
    pub sort: Option<SortSpec>,
    /// Rows to skip
    pub offset: usize,
    /// Maximum rows to return; `None` is unbounded
    pub limit: Option<usize>,
    /// References resolved after filtering, sorting and pagination
    pub include_after: Vec<DocumentPath>,
    /// Output shaping
    pub projection: Projection,
}

impl QueryPlan {
    /// Creates an empty plan over a collection
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    /// Adds a predicate
    pub fn filter(mut self, predicate: impl Expression + 'static) -> Self {
        self.filters.push(Box::new(predicate));
        self
    }

    /// Sets the global order
    pub fn order_by(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resolves a reference path before filtering
    pub fn include_before(mut self, path: DocumentPath) -> Self {
        self.include_before.push(path);
        self
    }

    /// Resolves a reference path on the final bounded result
    pub fn include_after(mut self, path: DocumentPath) -> Self {
        self.include_after.push(path);
        self
    }

    /// Projects each document through an expression
    pub fn select(mut self, expression: impl Expression + 'static) -> Self {
        self.projection = Projection::PerDocument(Box::new(expression));
        self
    }

    /// Projects the whole result set through one aggregate evaluation
    pub fn select_all(mut self, expression: impl Expression + 'static) -> Self {
        self.projection = Projection::Aggregate(Box::new(expression));
        self
    }

    /// Whether results must be globally sorted before pagination
    pub fn has_global_order(&self) -> bool {
        self.sort.is_some()
    }

    /// Limit as a count, `usize::MAX` when unbounded
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(usize::MAX)
    }
}
