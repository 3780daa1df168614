//! Document paths
//!
//! Syntax: `$` (root), `$.a.b`, `a.b`, `items[*]`, `$.items[*].product`.
//! A path evaluates to zero or more values; `[*]` fans out over array
//! elements. Paths can also be walked mutably, which reference resolution
//! uses to rewrite sub-documents in place.

use std::fmt;

use serde_json::{Map, Value};

use super::collation::Collation;
use super::errors::{ExpressionError, ExpressionResult};
use super::Expression;
use crate::storage::Document;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    EachItem,
}

/// A parsed dotted path into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    source: String,
    segments: Vec<Segment>,
}

impl DocumentPath {
    /// The root path `$`
    pub fn root() -> Self {
        Self {
            source: "$".to_string(),
            segments: Vec::new(),
        }
    }

    /// Path to a single top-level field
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source: format!("$.{}", name),
            segments: vec![Segment::Field(name)],
        }
    }

    /// Parses a path expression
    pub fn parse(path: &str) -> ExpressionResult<Self> {
        let trimmed = path.trim();
        let body = match trimmed.strip_prefix('$') {
            Some("") => return Ok(Self::root()),
            Some(rest) => rest.strip_prefix('.').ok_or_else(|| {
                ExpressionError::invalid_path(path, "expected '.' after '$'")
            })?,
            None => trimmed,
        };

        let mut segments = Vec::new();
        for part in body.split('.') {
            let (name, mut suffix) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(ExpressionError::invalid_path(path, "empty field name"));
            }
            segments.push(Segment::Field(name.to_string()));
            while !suffix.is_empty() {
                suffix = suffix.strip_prefix("[*]").ok_or_else(|| {
                    ExpressionError::invalid_path(path, "only '[*]' array access is supported")
                })?;
                segments.push(Segment::EachItem);
            }
        }

        Ok(Self {
            source: format!("$.{}", body),
            segments,
        })
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the last field segment, if any
    pub fn last_field(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::EachItem => None,
        })
    }

    /// Every value the path reaches in `fields`
    pub fn values(&self, fields: &Map<String, Value>) -> Vec<Value> {
        let mut out = Vec::new();
        match self.segments.split_first() {
            None => out.push(Value::Object(fields.clone())),
            Some((Segment::Field(name), rest)) => {
                if let Some(value) = fields.get(name) {
                    collect(value, rest, &mut out);
                }
            }
            Some((Segment::EachItem, _)) => {}
        }
        out
    }

    /// First value the path reaches, if any
    pub fn first(&self, fields: &Map<String, Value>) -> Option<Value> {
        self.values(fields).into_iter().next()
    }

    /// Visits every value the path reaches, mutably
    pub fn try_for_each_mut<E>(
        &self,
        fields: &mut Map<String, Value>,
        f: &mut dyn FnMut(&mut Value) -> Result<(), E>,
    ) -> Result<(), E> {
        match self.segments.split_first() {
            None => {
                let mut root = Value::Object(std::mem::take(fields));
                let result = f(&mut root);
                if let Value::Object(map) = root {
                    *fields = map;
                }
                result
            }
            Some((Segment::Field(name), rest)) => match fields.get_mut(name) {
                Some(value) => visit_mut(value, rest, f),
                None => Ok(()),
            },
            Some((Segment::EachItem, _)) => Ok(()),
        }
    }
}

fn collect(value: &Value, segments: &[Segment], out: &mut Vec<Value>) {
    match segments.split_first() {
        None => out.push(value.clone()),
        Some((Segment::Field(name), rest)) => {
            if let Some(child) = value.get(name.as_str()) {
                collect(child, rest, out);
            }
        }
        Some((Segment::EachItem, rest)) => {
            if let Value::Array(items) = value {
                for item in items {
                    collect(item, rest, out);
                }
            }
        }
    }
}

fn visit_mut<E>(
    value: &mut Value,
    segments: &[Segment],
    f: &mut dyn FnMut(&mut Value) -> Result<(), E>,
) -> Result<(), E> {
    match segments.split_first() {
        None => f(value),
        Some((Segment::Field(name), rest)) => match value {
            Value::Object(map) => match map.get_mut(name) {
                Some(child) => visit_mut(child, rest, f),
                None => Ok(()),
            },
            _ => Ok(()),
        },
        Some((Segment::EachItem, rest)) => match value {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    visit_mut(item, rest, f)?;
                }
                Ok(())
            }
            _ => Ok(()),
        },
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Expression for DocumentPath {
    fn eval_scalar(&self, document: &Document, _collation: &Collation) -> ExpressionResult<Value> {
        Ok(self.first(document.fields()).unwrap_or(Value::Null))
    }

    fn default_field_name(&self) -> String {
        self.last_field().unwrap_or("expr").to_string()
    }
}
