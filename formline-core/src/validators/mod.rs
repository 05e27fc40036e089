//! Built-in Validators
//!
//! Each constructor returns a [`SyncValidator`] ready to hand to a
//! [`FormControl`]. Validators read the live control, so rules like
//! `required` can key off the dirty flag rather than re-deriving emptiness.
//!
//! Except for `required`/`required_true`, every validator passes on an empty
//! (non-dirty) control: emptiness is `required`'s job, and stacking the two
//! keeps each failure attributable to exactly one rule. Validators also pass
//! on values of a kind they cannot judge (a `min` on a record, a `pattern`
//! on a number never fires) instead of guessing.
//!
//! Failure details use snake_case keys, e.g. `min` fails with
//! `{actual_value, min_value}`.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::controls::{AbstractControl, ControlError, FormControl, SyncValidator};
use crate::value::{compare, Value};
use std::cmp::Ordering;

/// Fails with `required` while the control is empty.
pub fn required() -> SyncValidator {
    Arc::new(|control: &FormControl| {
        if control.dirty() {
            None
        } else {
            Some(ControlError::failure("required"))
        }
    })
}

/// Fails with `required_true` unless the value is truthy. The checkbox rule:
/// `false` is a real input, but not an acceptable one.
pub fn required_true() -> SyncValidator {
    Arc::new(|control: &FormControl| {
        if control.value().is_truthy() {
            None
        } else {
            Some(ControlError::failure("required_true"))
        }
    })
}

// The WHATWG email production, plus the SMTP length limits the grammar
// alone does not capture (254 octets total, 64 for the local part).
fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email pattern compiles")
    })
}

fn is_valid_email(candidate: &str) -> bool {
    if candidate.len() > 254 {
        return false;
    }
    let Some((local, _domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.len() > 64 {
        return false;
    }
    email_regex().is_match(candidate)
}

/// Fails with `email` when a non-empty value is not a plausible address.
pub fn email() -> SyncValidator {
    Arc::new(|control: &FormControl| {
        if !control.dirty() {
            return None;
        }

        let value = control.value();
        let valid = value.as_str().is_some_and(is_valid_email);
        if valid {
            None
        } else {
            Some(ControlError::failure("email"))
        }
    })
}

/// Fails with `min` when the value orders below `limit`.
///
/// Details: `{actual_value, min_value}`.
pub fn min(limit: impl Into<Value>) -> SyncValidator {
    let limit = limit.into();
    Arc::new(move |control: &FormControl| {
        if !control.dirty() {
            return None;
        }

        let value = control.value();
        if compare(&value, &limit) == Some(Ordering::Less) {
            Some(ControlError::failure_with_details(
                "min",
                indexmap::indexmap! {
                    "actual_value".to_owned() => value,
                    "min_value".to_owned() => limit.clone(),
                },
            ))
        } else {
            None
        }
    })
}

/// Fails with `max` when the value orders above `limit`.
///
/// Details: `{actual_value, max_value}`.
pub fn max(limit: impl Into<Value>) -> SyncValidator {
    let limit = limit.into();
    Arc::new(move |control: &FormControl| {
        if !control.dirty() {
            return None;
        }

        let value = control.value();
        if compare(&value, &limit) == Some(Ordering::Greater) {
            Some(ControlError::failure_with_details(
                "max",
                indexmap::indexmap! {
                    "actual_value".to_owned() => value,
                    "max_value".to_owned() => limit.clone(),
                },
            ))
        } else {
            None
        }
    })
}

// Length of a value, where length makes sense: characters for strings,
// items for lists.
fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::List(items) => Some(items.len()),
        _ => None,
    }
}

/// Fails with `min_length` when a string or list is shorter than `min`.
///
/// Details: `{actual_length, min_length}`.
pub fn min_length(min: usize) -> SyncValidator {
    Arc::new(move |control: &FormControl| {
        if !control.dirty() {
            return None;
        }

        match length_of(&control.value()) {
            Some(length) if length < min => Some(ControlError::failure_with_details(
                "min_length",
                indexmap::indexmap! {
                    "actual_length".to_owned() => Value::from(length as i64),
                    "min_length".to_owned() => Value::from(min as i64),
                },
            )),
            _ => None,
        }
    })
}

/// Fails with `max_length` when a string or list is longer than `max`.
///
/// Details: `{actual_length, max_length}`.
pub fn max_length(max: usize) -> SyncValidator {
    Arc::new(move |control: &FormControl| {
        match length_of(&control.value()) {
            Some(length) if length > max => Some(ControlError::failure_with_details(
                "max_length",
                indexmap::indexmap! {
                    "actual_length".to_owned() => Value::from(length as i64),
                    "max_length".to_owned() => Value::from(max as i64),
                },
            )),
            _ => None,
        }
    })
}

/// Fails with `pattern` when a non-empty string does not match `regex`.
///
/// Details: `{pattern, actual_value}`.
pub fn pattern(regex: Regex) -> SyncValidator {
    Arc::new(move |control: &FormControl| {
        if !control.dirty() {
            return None;
        }

        let value = control.value();
        match value.as_str() {
            Some(s) if !regex.is_match(s) => Some(ControlError::failure_with_details(
                "pattern",
                indexmap::indexmap! {
                    "pattern".to_owned() => Value::from(regex.as_str()),
                    "actual_value".to_owned() => value.clone(),
                },
            )),
            _ => None,
        }
    })
}

/// Platform-reported constraint state for an input element, mirroring the
/// flags a DOM `ValidityState` exposes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeValidity {
    pub valid: bool,
    pub bad_input: bool,
    pub custom_error: bool,
    pub pattern_mismatch: bool,
    pub range_overflow: bool,
    pub range_underflow: bool,
    pub step_mismatch: bool,
    pub too_long: bool,
    pub too_short: bool,
    pub type_mismatch: bool,
    pub value_missing: bool,
}

impl NativeValidity {
    fn raised_flags(&self) -> IndexMap<String, Value> {
        let flags = [
            ("bad_input", self.bad_input),
            ("custom_error", self.custom_error),
            ("pattern_mismatch", self.pattern_mismatch),
            ("range_overflow", self.range_overflow),
            ("range_underflow", self.range_underflow),
            ("step_mismatch", self.step_mismatch),
            ("too_long", self.too_long),
            ("too_short", self.too_short),
            ("type_mismatch", self.type_mismatch),
            ("value_missing", self.value_missing),
        ];

        flags
            .into_iter()
            .filter(|(_, raised)| *raised)
            .map(|(name, _)| (name.to_owned(), Value::Bool(true)))
            .collect()
    }
}

/// Bridges platform constraint validation into the validator chain.
///
/// `read` fetches the current [`NativeValidity`] from whatever rendering
/// adapter hosts the control; `None` (no element attached) passes. A failure
/// carries the raised flags as details.
pub fn native(
    read: impl Fn() -> Option<NativeValidity> + Send + Sync + 'static,
) -> SyncValidator {
    Arc::new(move |_: &FormControl| match read() {
        Some(validity) if !validity.valid => Some(ControlError::failure_with_details(
            "native",
            validity.raised_flags(),
        )),
        _ => None,
    })
}
