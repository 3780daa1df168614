//! Predicate filtering for query execution
//!
//! A predicate passes a document only when it evaluates to boolean `true`.
//! Any other result is a non-match, not an error.

use serde_json::Value;

use crate::expression::{Collation, Expression, ExpressionResult};
use crate::storage::Document;

/// Evaluates predicates against documents
pub struct PredicateFilter;

impl PredicateFilter {
    /// Returns the document if the predicate holds, `None` otherwise
    pub fn apply(
        document: Document,
        predicate: &dyn Expression,
        collation: &Collation,
    ) -> ExpressionResult<Option<Document>> {
        match predicate.eval_scalar(&document, collation)? {
            Value::Bool(true) => Ok(Some(document)),
            _ => Ok(None),
        }
    }

    /// Applies predicates in order, stopping at the first non-match
    pub fn apply_all(
        document: Document,
        predicates: &[Box<dyn Expression>],
        collation: &Collation,
    ) -> ExpressionResult<Option<Document>> {
        let mut document = document;
        for predicate in predicates {
            match Self::apply(document, predicate.as_ref(), collation)? {
                Some(passed) => document = passed,
                None => return Ok(None),
            }
        }
        Ok(Some(document))
    }
}
