//! Validation Error Values
//!
//! Validation failures are data, never panics: a control's error stream
//! carries `Option<ControlError>`, where `None` means valid. Composite
//! controls aggregate their children's errors into sparse keyed/indexed
//! records — only failing children appear.
//!
//! Contract violations (unknown field names, out-of-range indices, a record
//! value handed to an array) are the opposite: caller bugs that panic loudly
//! at the call site instead of flowing through the error streams.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::value::Value;

/// A single validator failure: the validator's name plus optional details.
#[derive(Clone, Debug, PartialEq, Serialize, Error)]
#[error("validation failed: {validator_name}")]
pub struct ValidationFailure {
    pub validator_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IndexMap<String, Value>>,
}

impl ValidationFailure {
    /// A failure with no details.
    pub fn new(validator_name: impl Into<String>) -> Self {
        Self {
            validator_name: validator_name.into(),
            details: None,
        }
    }

    /// A failure carrying a details record.
    pub fn with_details(
        validator_name: impl Into<String>,
        details: IndexMap<String, Value>,
    ) -> Self {
        Self {
            validator_name: validator_name.into(),
            details: Some(details),
        }
    }
}

/// A control's error value.
///
/// Leaf controls produce `Failure`; groups and arrays produce sparse
/// `Fields`/`Items` records whose entries are their failing children's own
/// errors (recursively nested for nested composites).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlError {
    Failure(ValidationFailure),
    Fields(IndexMap<String, ControlError>),
    Items(#[serde(serialize_with = "serialize_items")] BTreeMap<usize, ControlError>),
}

impl ControlError {
    /// A leaf failure with no details.
    pub fn failure(validator_name: impl Into<String>) -> Self {
        ControlError::Failure(ValidationFailure::new(validator_name))
    }

    /// A leaf failure with a details record.
    pub fn failure_with_details(
        validator_name: impl Into<String>,
        details: IndexMap<String, Value>,
    ) -> Self {
        ControlError::Failure(ValidationFailure::with_details(validator_name, details))
    }

    /// Returns the leaf failure if this error is one.
    pub fn as_failure(&self) -> Option<&ValidationFailure> {
        match self {
            ControlError::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns the per-field record if this error aggregates a group.
    pub fn as_fields(&self) -> Option<&IndexMap<String, ControlError>> {
        match self {
            ControlError::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the per-index record if this error aggregates an array.
    pub fn as_items(&self) -> Option<&BTreeMap<usize, ControlError>> {
        match self {
            ControlError::Items(items) => Some(items),
            _ => None,
        }
    }
}

// JSON object keys must be strings; indices are stringified on the way out.
fn serialize_items<S>(items: &BTreeMap<usize, ControlError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(items.len()))?;
    for (index, error) in items {
        map.serialize_entry(&index.to_string(), error)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display() {
        let failure = ValidationFailure::new("required");
        assert_eq!(failure.to_string(), "validation failed: required");
    }

    #[test]
    fn serializes_nested_errors_as_sparse_records() {
        let error = ControlError::Fields(indexmap::indexmap! {
            "age".to_owned() => ControlError::failure_with_details(
                "min",
                indexmap::indexmap! {
                    "actual_value".to_owned() => Value::from(17),
                    "min_value".to_owned() => Value::from(18),
                },
            ),
            "tags".to_owned() => ControlError::Items(
                [(1usize, ControlError::failure("required"))].into_iter().collect(),
            ),
        });

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "age": {
                    "validator_name": "min",
                    "details": { "actual_value": 17.0, "min_value": 18.0 }
                },
                "tags": { "1": { "validator_name": "required" } }
            })
        );
    }
}
