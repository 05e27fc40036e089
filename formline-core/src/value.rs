//! Dynamic Form Values
//!
//! Controls hold values of dynamic shape: a leaf control holds a scalar, a
//! group holds a keyed record of its children's values, an array holds an
//! ordered list. `Value` is the single type flowing through the control
//! graph.
//!
//! # Emptiness
//!
//! A control is *dirty* when its value is outside the "empty" set:
//!
//! - booleans are never empty (both `true` and `false` count as input)
//! - numbers are empty only when non-finite (`0` is a real input, `NaN` and
//!   infinities are not)
//! - `Null` and the empty string are empty
//! - lists and records are never empty (their children decide dirtiness)

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A dynamically shaped form value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value. Covers both "no value yet" and explicit clearing.
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Record(IndexMap<String, Value>),
}

impl Value {
    /// Returns the record fields if this value is a record.
    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the list items if this value is a list.
    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the string slice if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number if this value is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean if this value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// JavaScript-style truthiness, used by the `required_true` validator.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Record(_) => true,
        }
    }
}

/// The dirty rule: `true` when the value is outside the empty set.
pub fn is_not_empty(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => n.is_finite(),
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::List(_) | Value::Record(_) => true,
    }
}

/// Ordering between two values of the same comparable kind.
///
/// Numbers compare numerically, strings lexicographically. Any other pairing
/// (including NaN against anything) has no defined order and yields `None`;
/// min/max validators treat such values as passing.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Value::Record(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_are_never_empty() {
        assert!(is_not_empty(&Value::Bool(true)));
        assert!(is_not_empty(&Value::Bool(false)));
    }

    #[test]
    fn zero_is_not_empty() {
        assert!(is_not_empty(&Value::Number(0.0)));
        assert!(is_not_empty(&Value::Number(-3.5)));
    }

    #[test]
    fn nan_and_infinities_are_empty() {
        assert!(!is_not_empty(&Value::Number(f64::NAN)));
        assert!(!is_not_empty(&Value::Number(f64::INFINITY)));
        assert!(!is_not_empty(&Value::Number(f64::NEG_INFINITY)));
    }

    #[test]
    fn null_and_empty_string_are_empty() {
        assert!(!is_not_empty(&Value::Null));
        assert!(!is_not_empty(&Value::String(String::new())));
        assert!(is_not_empty(&Value::from("x")));
    }

    #[test]
    fn compare_numbers_and_strings() {
        assert_eq!(
            compare(&Value::from(1.0), &Value::from(2.0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare(&Value::from("b"), &Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(compare(&Value::from(1.0), &Value::from("a")), None);
        assert_eq!(compare(&Value::Number(f64::NAN), &Value::from(1.0)), None);
    }

    #[test]
    fn serializes_untagged() {
        let value = Value::Record(indexmap::indexmap! {
            "name".to_owned() => Value::from("ada"),
            "age".to_owned() => Value::from(36),
        });
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"name":"ada","age":36.0}"#);

        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }
}
