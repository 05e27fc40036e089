//! Control Tree
//!
//! The three control kinds and the contract they share. [`FormControl`] is
//! the leaf that stores a value; [`FormGroup`] composes a fixed keyed record
//! of children; [`FormArray`] composes a dynamic ordered list. All three
//! implement [`AbstractControl`], so composites nest freely through
//! [`ControlHandle`].

mod abstract_control;
mod array;
mod control;
mod error;
mod group;

pub use abstract_control::{AbstractControl, ControlHandle, ControlId, ControlState};
pub use array::FormArray;
pub use control::{AsyncValidator, FormControl, SyncValidator};
pub use error::{ControlError, ValidationFailure};
pub use group::FormGroup;
