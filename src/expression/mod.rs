//! Expression evaluation contract
//!
//! The pipeline treats expressions as opaque: a function of a document and a
//! collation producing a value, or, for whole-recordset projections, a lazy
//! sequence of values computed over a [`RowSet`]. The expression grammar lives
//! elsewhere; this module carries the contract, collation-aware comparison,
//! document paths, and a handful of built-in expressions.

mod builtins;
mod collation;
mod errors;
mod path;
mod rows;

use std::fmt;

use serde_json::Value;

use crate::storage::Document;

pub use builtins::{CompareOp, Comparison, FnExpression, Literal, ObjectExpression, RowCount};
pub use collation::Collation;
pub use errors::{ExpressionError, ExpressionResult};
pub use path::DocumentPath;
pub use rows::RowSet;

/// Lazy sequence of values produced by an expression
pub type ValueStream<'a> = Box<dyn Iterator<Item = ExpressionResult<Value>> + 'a>;

/// An executable expression
pub trait Expression: fmt::Debug {
    /// Evaluates against one document
    fn eval_scalar(&self, document: &Document, collation: &Collation) -> ExpressionResult<Value>;

    /// Evaluates over a whole result set.
    ///
    /// The default yields one scalar per row.
    fn eval_sequence<'a>(
        &'a self,
        rows: &RowSet,
        collation: &'a Collation,
    ) -> ExpressionResult<ValueStream<'a>> {
        let rows = rows.clone();
        Ok(Box::new((0..rows.len()).filter_map(move |i| {
            rows.get(i).map(|doc| self.eval_scalar(doc, collation))
        })))
    }

    /// Field name used when a scalar result is wrapped into a document
    fn default_field_name(&self) -> String {
        "expr".to_string()
    }
}
