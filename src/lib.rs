//! docpipe - streaming query execution for an embedded document store
//!
//! Index matches go in, query results come out: reference resolution,
//! predicate filtering, disk-spilling ORDER BY, pagination and projection,
//! with page-cache eviction coordinated with the active transaction.

pub mod config;
pub mod executor;
pub mod expression;
pub mod index;
pub mod planner;
pub mod sort;
pub mod storage;

pub use config::{PipelineConfig, SortConfig};
pub use executor::{DocumentStream, ExecutionResult, PipelineError, PipelineResult, QueryPipeline};
pub use planner::QueryPlan;
