//! Formline Core
//!
//! This crate provides the core runtime for the Formline reactive form
//! library. It implements:
//!
//! - Observable value cells with subscription handles and tick batching
//! - The control tree: leaf controls, keyed groups, ordered arrays
//! - Synchronous and asynchronous validation with first-failure and
//!   first-settled semantics
//! - A declarative builder for whole form trees
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamically shaped value type controls carry
//! - `observable`: cells, subscriptions, and once-per-tick batching
//! - `controls`: the three control kinds and their shared contract
//! - `builder`: declarative construction of control trees
//! - `validators`: the built-in validation rules
//!
//! # Example
//!
//! ```rust
//! use formline_core::builder::{build, ControlInit};
//! use formline_core::validators::{email, min, required};
//! use formline_core::{AbstractControl, Value};
//!
//! let form = build(ControlInit::group([
//!     ("email", ControlInit::validated("", vec![required(), email()])),
//!     ("age", ControlInit::validated(17, vec![min(18)])),
//! ]));
//!
//! assert!(!form.valid());
//!
//! form.set_value(Value::Record(indexmap::indexmap! {
//!     "email".to_owned() => Value::from("ada@example.com"),
//!     "age".to_owned() => Value::from(20),
//! }));
//!
//! assert!(form.valid());
//! assert_eq!(form.error(), None);
//! ```

pub mod builder;
pub mod controls;
pub mod observable;
pub mod validators;
pub mod value;

pub use controls::{
    AbstractControl, AsyncValidator, ControlError, ControlHandle, ControlId, ControlState,
    FormArray, FormControl, FormGroup, SyncValidator, ValidationFailure,
};
pub use observable::{ObservableCell, Subscription, SubscriptionSet};
pub use value::Value;
