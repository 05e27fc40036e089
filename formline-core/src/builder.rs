//! Declarative Form Construction
//!
//! [`ControlInit`] describes a control tree as data: leaves carry an initial
//! value (plus optional validator lists), composites nest further inits, and
//! an already-built control can be spliced in as-is. [`build`] walks the
//! description once and returns the root handle.
//!
//! ```
//! use formline_core::builder::{build, ControlInit};
//! use formline_core::validators::required;
//! use formline_core::AbstractControl;
//!
//! let form = build(ControlInit::group([
//!     ("name", ControlInit::validated("", vec![required()])),
//!     ("tags", ControlInit::array([ControlInit::value("rust")])),
//! ]));
//! assert!(!form.valid());
//! ```

use indexmap::IndexMap;

use crate::controls::{
    AsyncValidator, ControlHandle, FormArray, FormControl, FormGroup, SyncValidator,
};
use crate::value::Value;
use std::sync::Arc;

/// A declarative description of one control in a form tree.
pub enum ControlInit {
    /// A leaf with an initial value and optional validator lists.
    Leaf {
        value: Value,
        validators: Vec<SyncValidator>,
        async_validators: Vec<AsyncValidator>,
    },
    /// An existing control spliced into the tree unchanged.
    Existing(ControlHandle),
    /// A keyed group of child descriptions.
    Group(IndexMap<String, ControlInit>),
    /// An ordered list of child descriptions.
    Array(Vec<ControlInit>),
}

impl ControlInit {
    /// A leaf with no validators.
    pub fn value(initial: impl Into<Value>) -> Self {
        Self::full(initial, Vec::new(), Vec::new())
    }

    /// A leaf with synchronous validators.
    pub fn validated(initial: impl Into<Value>, validators: Vec<SyncValidator>) -> Self {
        Self::full(initial, validators, Vec::new())
    }

    /// A leaf with both validator lists.
    pub fn full(
        initial: impl Into<Value>,
        validators: Vec<SyncValidator>,
        async_validators: Vec<AsyncValidator>,
    ) -> Self {
        ControlInit::Leaf {
            value: initial.into(),
            validators,
            async_validators,
        }
    }

    /// Splices an already-built control into the tree.
    pub fn control(handle: ControlHandle) -> Self {
        ControlInit::Existing(handle)
    }

    /// A group over named child descriptions.
    pub fn group<K>(fields: impl IntoIterator<Item = (K, ControlInit)>) -> Self
    where
        K: Into<String>,
    {
        ControlInit::Group(
            fields
                .into_iter()
                .map(|(name, init)| (name.into(), init))
                .collect(),
        )
    }

    /// An array over ordered child descriptions.
    pub fn array(items: impl IntoIterator<Item = ControlInit>) -> Self {
        ControlInit::Array(items.into_iter().collect())
    }
}

/// Builds a leaf control. Typed counterpart of [`ControlInit::full`].
pub fn create_control(
    initial: impl Into<Value>,
    validators: Vec<SyncValidator>,
    async_validators: Vec<AsyncValidator>,
) -> FormControl {
    FormControl::with_validators(initial, validators, async_validators)
}

/// Builds a group over named child descriptions.
pub fn create_group<K>(fields: impl IntoIterator<Item = (K, ControlInit)>) -> FormGroup
where
    K: Into<String>,
{
    FormGroup::new(
        fields
            .into_iter()
            .map(|(name, init)| (name.into(), build(init)))
            .collect(),
    )
}

/// Builds an array over ordered child descriptions.
pub fn create_array(items: impl IntoIterator<Item = ControlInit>) -> FormArray {
    FormArray::new(items.into_iter().map(build).collect())
}

/// Builds the control tree a description denotes and returns its root.
pub fn build(init: ControlInit) -> ControlHandle {
    match init {
        ControlInit::Leaf {
            value,
            validators,
            async_validators,
        } => Arc::new(FormControl::with_validators(
            value,
            validators,
            async_validators,
        )),
        ControlInit::Existing(handle) => handle,
        ControlInit::Group(fields) => Arc::new(FormGroup::new(
            fields
                .into_iter()
                .map(|(name, child)| (name, build(child)))
                .collect(),
        )),
        ControlInit::Array(items) => {
            Arc::new(FormArray::new(items.into_iter().map(build).collect()))
        }
    }
}
