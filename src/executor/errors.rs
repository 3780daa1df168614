//! Pipeline error types
//!
//! Faults from the expression evaluator, the storage engine and the sort
//! service pass through unchanged. Non-matches (filtered documents, missing
//! references) are never errors.

use thiserror::Error;

use crate::expression::ExpressionError;
use crate::sort::SortError;
use crate::storage::StorageError;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Faults that terminate a result stream
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Expression evaluation failed at execution time
    #[error("Expression evaluation failed: {0}")]
    Expression(#[from] ExpressionError),

    /// Loading, lookup or eviction failed
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// The external sort failed
    #[error("{0}")]
    Sort(#[from] SortError),

    /// A document without row identity reached the sort stage
    #[error("Cannot sort a document that has no storage address")]
    Unaddressed,
}

impl PipelineError {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Expression(_) => "PIPELINE_EXPRESSION_FAILED",
            PipelineError::Storage(e) => e.code().code(),
            PipelineError::Sort(e) => e.code().code(),
            PipelineError::Unaddressed => "PIPELINE_UNADDRESSED_DOCUMENT",
        }
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Storage(e) => e.is_fatal(),
            PipelineError::Sort(e) => e.is_fatal(),
            _ => false,
        }
    }
}
