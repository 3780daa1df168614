//! Query execution pipeline
//!
//! Turns a stream of index matches into the final result set of a query.
//!
//! # Execution Flow
//!
//! 1. Materialize candidates through the document loader
//! 2. Resolve pre-filter includes
//! 3. Apply predicates in order, first failure wins
//! 4. Paginate inline (unordered) or sort externally then paginate (ordered)
//! 5. Resolve post-filter includes on the bounded result
//! 6. Project
//!
//! Pages are evicted as the scan leaves them, after the documents loaded
//! from them have been released.

mod errors;
mod filters;
mod include;
mod loader;
mod order;
mod pipeline;
mod projector;
mod result;

pub use errors::{PipelineError, PipelineResult};
pub use filters::PredicateFilter;
pub use include::{IncludeResolver, IncludeStage};
pub use loader::{BoundedLoader, FullLoader, ScanContext};
pub use order::OrderBy;
pub use pipeline::{DocumentStream, QueryPipeline};
pub use projector::{Select, SelectAll};
pub use result::{ExecutionResult, ScanStats};
