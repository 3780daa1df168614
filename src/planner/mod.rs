//! Query plan types
//!
//! Planning itself (index choice, predicate ordering) is outside this crate.
//! The pipeline consumes a [`QueryPlan`]: include paths, predicates, an
//! optional sort, offset/limit and a projection.

mod plan;

pub use plan::{Projection, QueryPlan, SortDirection, SortSpec};
