//! Built-in expressions
//!
//! Small, grammar-free expressions for plans built in code: literals,
//! field comparisons, object construction, row counting, and a closure
//! adapter for anything else.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

use super::collation::Collation;
use super::errors::ExpressionResult;
use super::path::DocumentPath;
use super::rows::RowSet;
use super::{Expression, ValueStream};
use crate::storage::Document;

/// A constant value
#[derive(Debug, Clone, PartialEq)]
pub struct Literal(pub Value);

impl Expression for Literal {
    fn eval_scalar(&self, _document: &Document, _collation: &Collation) -> ExpressionResult<Value> {
        Ok(self.0.clone())
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// field = value
    Eq,
    /// field != value
    Ne,
    /// field > value
    Gt,
    /// field >= value
    Gte,
    /// field < value
    Lt,
    /// field <= value
    Lte,
}

impl CompareOp {
    /// Operator symbol for display
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

/// Boolean comparison of a document path against a constant.
///
/// Missing or null fields never match. Range operators only compare values
/// of the same type; no coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Path of the compared field
    pub path: DocumentPath,
    /// Operator
    pub op: CompareOp,
    /// Right-hand constant
    pub value: Value,
}

impl Comparison {
    /// Creates a comparison
    pub fn new(path: DocumentPath, op: CompareOp, value: Value) -> Self {
        Self { path, op, value }
    }

    /// `field = value` on a top-level field
    pub fn eq(field: &str, value: Value) -> Self {
        Self::new(DocumentPath::field(field), CompareOp::Eq, value)
    }

    /// `field != value` on a top-level field
    pub fn ne(field: &str, value: Value) -> Self {
        Self::new(DocumentPath::field(field), CompareOp::Ne, value)
    }

    /// `field > value` on a top-level field
    pub fn gt(field: &str, value: Value) -> Self {
        Self::new(DocumentPath::field(field), CompareOp::Gt, value)
    }

    /// `field >= value` on a top-level field
    pub fn gte(field: &str, value: Value) -> Self {
        Self::new(DocumentPath::field(field), CompareOp::Gte, value)
    }

    /// `field < value` on a top-level field
    pub fn lt(field: &str, value: Value) -> Self {
        Self::new(DocumentPath::field(field), CompareOp::Lt, value)
    }

    /// `field <= value` on a top-level field
    pub fn lte(field: &str, value: Value) -> Self {
        Self::new(DocumentPath::field(field), CompareOp::Lte, value)
    }

    fn matches(&self, actual: &Value, collation: &Collation) -> bool {
        if actual.is_null() {
            return false;
        }
        match self.op {
            CompareOp::Eq => collation.equals(actual, &self.value),
            CompareOp::Ne => !collation.equals(actual, &self.value),
            op => {
                let comparable = matches!(
                    (actual, &self.value),
                    (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
                );
                if !comparable {
                    return false;
                }
                let ord = collation.compare(actual, &self.value);
                match op {
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                    CompareOp::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                }
            }
        }
    }
}

impl Expression for Comparison {
    fn eval_scalar(&self, document: &Document, collation: &Collation) -> ExpressionResult<Value> {
        let matched = self
            .path
            .values(document.fields())
            .iter()
            .any(|actual| self.matches(actual, collation));
        Ok(Value::Bool(matched))
    }

    fn default_field_name(&self) -> String {
        self.path.default_field_name()
    }
}

/// Builds a document out of named sub-expressions
#[derive(Debug, Default)]
pub struct ObjectExpression {
    fields: Vec<(String, Box<dyn Expression>)>,
}

impl ObjectExpression {
    /// Creates an empty object expression
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an output field
    pub fn field(mut self, name: impl Into<String>, expression: impl Expression + 'static) -> Self {
        self.fields.push((name.into(), Box::new(expression)));
        self
    }
}

impl Expression for ObjectExpression {
    fn eval_scalar(&self, document: &Document, collation: &Collation) -> ExpressionResult<Value> {
        let mut out = Map::new();
        for (name, expression) in &self.fields {
            out.insert(name.clone(), expression.eval_scalar(document, collation)?);
        }
        Ok(Value::Object(out))
    }
}

/// Number of rows: `1` per document, the row total over a whole result set
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCount;

impl Expression for RowCount {
    fn eval_scalar(&self, _document: &Document, _collation: &Collation) -> ExpressionResult<Value> {
        Ok(Value::from(1))
    }

    fn eval_sequence<'a>(
        &'a self,
        rows: &RowSet,
        _collation: &'a Collation,
    ) -> ExpressionResult<ValueStream<'a>> {
        Ok(Box::new(std::iter::once(Ok(Value::from(rows.len())))))
    }

    fn default_field_name(&self) -> String {
        "count".to_string()
    }
}

type EvalFn = dyn Fn(&Document, &Collation) -> ExpressionResult<Value>;

/// Adapts a closure into an expression
pub struct FnExpression {
    name: String,
    eval: Box<EvalFn>,
}

impl FnExpression {
    /// Creates a closure expression; `name` is its default field name
    pub fn new<F>(name: impl Into<String>, eval: F) -> Self
    where
        F: Fn(&Document, &Collation) -> ExpressionResult<Value> + 'static,
    {
        Self {
            name: name.into(),
            eval: Box::new(eval),
        }
    }
}

impl fmt::Debug for FnExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExpression").field("name", &self.name).finish()
    }
}

impl Expression for FnExpression {
    fn eval_scalar(&self, document: &Document, collation: &Collation) -> ExpressionResult<Value> {
        (self.eval)(document, collation)
    }

    fn default_field_name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::new(value.as_object().cloned().unwrap())
    }

    fn eval(expr: &dyn Expression, value: Value) -> Value {
        expr.eval_scalar(&doc(value), &Collation::ordinal()).unwrap()
    }

    #[test]
    fn test_equality_no_coercion() {
        assert_eq!(eval(&Comparison::eq("value", json!(123)), json!({"value": 123})), json!(true));
        assert_eq!(eval(&Comparison::eq("value", json!("123")), json!({"value": 123})), json!(false));
    }

    #[test]
    fn test_range_predicates() {
        let d = json!({"age": 25});
        assert_eq!(eval(&Comparison::gte("age", json!(18)), d.clone()), json!(true));
        assert_eq!(eval(&Comparison::lte("age", json!(30)), d.clone()), json!(true));
        assert_eq!(eval(&Comparison::gt("age", json!(25)), d.clone()), json!(false));
        assert_eq!(eval(&Comparison::lt("age", json!(25)), d.clone()), json!(false));
        assert_eq!(eval(&Comparison::gt("age", json!("20")), d), json!(false));
    }

    #[test]
    fn test_missing_and_null_never_match() {
        assert_eq!(eval(&Comparison::eq("age", json!(30)), json!({"name": "x"})), json!(false));
        assert_eq!(eval(&Comparison::ne("name", json!("x")), json!({"name": null})), json!(false));
    }

    #[test]
    fn test_collation_applies_to_equality() {
        let expr = Comparison::eq("name", json!("ALICE"));
        let d = doc(json!({"name": "alice"}));
        assert_eq!(expr.eval_scalar(&d, &Collation::ordinal()).unwrap(), json!(false));
        assert_eq!(expr.eval_scalar(&d, &Collation::ignore_case()).unwrap(), json!(true));
    }

    #[test]
    fn test_comparison_over_array_path() {
        let expr = Comparison::new(
            DocumentPath::parse("tags[*]").unwrap(),
            CompareOp::Eq,
            json!("red"),
        );
        assert_eq!(eval(&expr, json!({"tags": ["blue", "red"]})), json!(true));
    }

    #[test]
    fn test_object_expression() {
        let expr = ObjectExpression::new()
            .field("who", DocumentPath::field("name"))
            .field("kind", Literal(json!("user")));
        assert_eq!(
            eval(&expr, json!({"name": "Bob", "age": 3})),
            json!({"who": "Bob", "kind": "user"})
        );
    }

    #[test]
    fn test_row_count_over_rows() {
        let rows = RowSet::from_documents(vec![Document::default(), Document::default()]);
        let collation = Collation::ordinal();
        let values: Vec<_> = RowCount
            .eval_sequence(&rows, &collation)
            .unwrap()
            .collect::<ExpressionResult<_>>()
            .unwrap();
        assert_eq!(values, vec![json!(2)]);
    }

    #[test]
    fn test_default_sequence_is_per_row() {
        let rows = RowSet::from_documents(vec![doc(json!({"n": 1})), doc(json!({"n": 2}))]);
        let collation = Collation::ordinal();
        let path = DocumentPath::field("n");
        let values: Vec<_> = path
            .eval_sequence(&rows, &collation)
            .unwrap()
            .collect::<ExpressionResult<_>>()
            .unwrap();
        assert_eq!(values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_fn_expression() {
        let expr = FnExpression::new("double", |d, _| {
            Ok(json!(d.get("n").and_then(Value::as_i64).unwrap_or(0) * 2))
        });
        assert_eq!(eval(&expr, json!({"n": 21})), json!(42));
        assert_eq!(expr.default_field_name(), "double");
    }
}
