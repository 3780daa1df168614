//! Projection of the final document sequence
//!
//! Values that are documents become output rows as they are; any other value
//! is wrapped in a one-field document named after the expression.

use serde_json::{Map, Value};

use super::errors::PipelineResult;
use crate::expression::{Collation, Expression, RowSet, ValueStream};
use crate::storage::Document;

fn into_row(value: Value, expression: &dyn Expression) -> Document {
    match value {
        Value::Object(fields) => Document::new(fields),
        scalar => {
            let mut fields = Map::new();
            fields.insert(expression.default_field_name(), scalar);
            Document::new(fields)
        }
    }
}

/// One output row per input document
pub struct Select<'a, S> {
    inner: S,
    expression: &'a dyn Expression,
    collation: &'a Collation,
    done: bool,
}

impl<'a, S> Select<'a, S>
where
    S: Iterator<Item = PipelineResult<Document>>,
{
    /// Projects each document of `inner` through `expression`
    pub fn new(inner: S, expression: &'a dyn Expression, collation: &'a Collation) -> Self {
        Self {
            inner,
            expression,
            collation,
            done: false,
        }
    }
}

impl<'a, S> Iterator for Select<'a, S>
where
    S: Iterator<Item = PipelineResult<Document>>,
{
    type Item = PipelineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.inner.next()?.and_then(|document| {
            let value = self.expression.eval_scalar(&document, self.collation)?;
            Ok(into_row(value, self.expression))
        });
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

enum AggregateState<'a, S> {
    Pending(S),
    Streaming(ValueStream<'a>),
    Done,
}

/// A single evaluation over the whole result set
pub struct SelectAll<'a, S> {
    state: AggregateState<'a, S>,
    expression: &'a dyn Expression,
    collation: &'a Collation,
}

impl<'a, S> SelectAll<'a, S>
where
    S: Iterator<Item = PipelineResult<Document>>,
{
    /// Evaluates `expression` once over every document of `inner`
    pub fn new(inner: S, expression: &'a dyn Expression, collation: &'a Collation) -> Self {
        Self {
            state: AggregateState::Pending(inner),
            expression,
            collation,
        }
    }

    fn next_row(&mut self) -> PipelineResult<Option<Document>> {
        if let AggregateState::Pending(_) = self.state {
            if let AggregateState::Pending(inner) =
                std::mem::replace(&mut self.state, AggregateState::Done)
            {
                let rows = RowSet::from_documents(inner.collect::<PipelineResult<Vec<_>>>()?);
                let values = self.expression.eval_sequence(&rows, self.collation)?;
                self.state = AggregateState::Streaming(values);
            }
        }

        let AggregateState::Streaming(values) = &mut self.state else {
            return Ok(None);
        };
        match values.next() {
            Some(value) => Ok(Some(into_row(value?, self.expression))),
            None => {
                self.state = AggregateState::Done;
                Ok(None)
            }
        }
    }
}

impl<'a, S> Iterator for SelectAll<'a, S>
where
    S: Iterator<Item = PipelineResult<Document>>,
{
    type Item = PipelineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.state = AggregateState::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{DocumentPath, Literal, ObjectExpression, RowCount};
    use serde_json::json;

    fn rows(values: Vec<Value>) -> std::vec::IntoIter<PipelineResult<Document>> {
        values
            .into_iter()
            .map(|v| Ok(Document::new(v.as_object().cloned().unwrap())))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn values(out: impl Iterator<Item = PipelineResult<Document>>) -> Vec<Value> {
        out.map(|d| d.unwrap().into_value()).collect()
    }

    #[test]
    fn test_scalar_wrapped_in_default_field() {
        let collation = Collation::ordinal();
        let expression = DocumentPath::field("name");
        let out = Select::new(rows(vec![json!({"name": "Ada"}), json!({})]), &expression, &collation);
        assert_eq!(values(out), vec![json!({"name": "Ada"}), json!({"name": null})]);
    }

    #[test]
    fn test_document_value_yielded_directly() {
        let collation = Collation::ordinal();
        let expression = ObjectExpression::new()
            .field("who", DocumentPath::field("name"))
            .field("kind", Literal(json!("user")));
        let out = Select::new(rows(vec![json!({"name": "Ada", "age": 36})]), &expression, &collation);
        assert_eq!(values(out), vec![json!({"who": "Ada", "kind": "user"})]);
    }

    #[test]
    fn test_aggregate_count_yields_one_row() {
        let collation = Collation::ordinal();
        let input = rows(vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
        let out = SelectAll::new(input, &RowCount, &collation);
        assert_eq!(values(out), vec![json!({"count": 3})]);
    }

    #[test]
    fn test_aggregate_over_empty_input() {
        let collation = Collation::ordinal();
        let out = SelectAll::new(rows(Vec::new()), &RowCount, &collation);
        assert_eq!(values(out), vec![json!({"count": 0})]);
    }

    #[test]
    fn test_aggregate_default_is_per_row() {
        let collation = Collation::ordinal();
        let expression = DocumentPath::field("n");
        let out = SelectAll::new(rows(vec![json!({"n": 1}), json!({"n": 2})]), &expression, &collation);
        assert_eq!(values(out), vec![json!({"n": 1}), json!({"n": 2})]);
    }
}
