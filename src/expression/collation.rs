//! Collation-aware value comparison
//!
//! Ordering rules:
//! - null < bool < number < string < array < object
//! - same types compare naturally; strings honor the collation's case rule
//! - arrays compare element-wise, then by length
//! - objects compare key/value pairs in key order, then by size

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Rule set used for comparing values during filtering and sorting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collation {
    /// Compare strings without regard to case
    pub ignore_case: bool,
}

impl Collation {
    /// Ordinal, case-sensitive collation
    pub fn ordinal() -> Self {
        Self { ignore_case: false }
    }

    /// Case-insensitive collation
    pub fn ignore_case() -> Self {
        Self { ignore_case: true }
    }

    /// Whether two values are equal under this collation
    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Total order over JSON values under this collation
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let a_type = type_order(a);
        let b_type = type_order(b);
        if a_type != b_type {
            return a_type.cmp(&b_type);
        }

        match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
            (Value::String(x), Value::String(y)) => self.compare_strings(x, y),
            (Value::Array(x), Value::Array(y)) => {
                for (l, r) in x.iter().zip(y.iter()) {
                    let ord = self.compare(l, r);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.len().cmp(&y.len())
            }
            (Value::Object(x), Value::Object(y)) => {
                for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                    let ord = lk.cmp(rk).then_with(|| self.compare(lv, rv));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.len().cmp(&y.len())
            }
            _ => Ordering::Equal,
        }
    }

    fn compare_strings(&self, a: &str, b: &str) -> Ordering {
        if self.ignore_case {
            a.chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase))
        } else {
            a.cmp(b)
        }
    }
}

fn type_order(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x.cmp(&y);
    }
    // i64 against a u64 above i64::MAX
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_u64()) {
        return signed_cmp_unsigned(x, y);
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_i64()) {
        return signed_cmp_unsigned(y, x).reverse();
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    x.total_cmp(&y)
}

fn signed_cmp_unsigned(x: i64, y: u64) -> Ordering {
    if x < 0 {
        Ordering::Less
    } else {
        (x as u64).cmp(&y)
    }
}
