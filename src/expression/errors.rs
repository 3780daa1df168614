//! Expression evaluation errors

use thiserror::Error;

/// Result type for expression evaluation
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Faults raised while evaluating an expression at execution time
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

impl ExpressionError {
    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ExpressionError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
