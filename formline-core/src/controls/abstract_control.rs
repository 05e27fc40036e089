//! Abstract Control Contract
//!
//! Every control — leaf, group, or array — satisfies [`AbstractControl`]:
//! five observable cells (value, dirty, touched, valid, error), a batched
//! state snapshot stream, the mutation operations, and lifecycle teardown.
//!
//! Snapshot reads and stream emissions come from the same cells, so the pull
//! and push views of a control can never disagree.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::controls::error::ControlError;
use crate::observable::ObservableCell;
use crate::value::Value;

/// Unique identity for a control.
///
/// Identity survives cloning (clones share state) and backs identity-based
/// array removal and once-per-tick snapshot deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(u64);

impl ControlId {
    /// Generates a new unique control id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ControlId {
    fn default() -> Self {
        Self::new()
    }
}

/// Combined control state, emitted at most once per tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ControlState {
    pub value: Value,
    pub dirty: bool,
    pub touched: bool,
    pub valid: bool,
    pub error: Option<ControlError>,
}

/// The capability set every control exposes to adapters and parents.
pub trait AbstractControl: Send + Sync {
    /// Stable identity of this control.
    fn id(&self) -> ControlId;

    /// The value stream.
    fn value_changes(&self) -> &ObservableCell<Value>;

    /// The dirty stream. Dirty means the value is outside the empty set.
    fn dirty_changes(&self) -> &ObservableCell<bool>;

    /// The touched stream.
    fn touched_changes(&self) -> &ObservableCell<bool>;

    /// The valid stream. Valid iff the error stream holds `None`.
    fn valid_changes(&self) -> &ObservableCell<bool>;

    /// The error stream.
    fn error_changes(&self) -> &ObservableCell<Option<ControlError>>;

    /// The batched state snapshot stream (one emission per tick).
    fn state_changes(&self) -> &ObservableCell<ControlState>;

    /// Replaces the current value.
    ///
    /// Composites distribute the value to their children; see the concrete
    /// types for their shape contracts.
    fn set_value(&self, value: Value);

    /// Resets to the stored initial value.
    ///
    /// A provided value permanently replaces the stored initial first.
    fn reset(&self, initial: Option<Value>);

    /// Marks the control (and, for composites, its children) as touched.
    fn mark_as_touched(&self);

    /// Clears the touched flag.
    fn mark_as_untouched(&self);

    /// Tears the control down: completes every owned stream and drops every
    /// internally held subscription. Idempotent. Never destroys children.
    fn destroy(&self);

    // --- snapshot reads -------------------------------------------------

    /// Current value.
    fn value(&self) -> Value {
        self.value_changes().get()
    }

    /// Current dirty flag.
    fn dirty(&self) -> bool {
        self.dirty_changes().get()
    }

    /// Current touched flag.
    fn touched(&self) -> bool {
        self.touched_changes().get()
    }

    /// Current valid flag.
    fn valid(&self) -> bool {
        self.valid_changes().get()
    }

    /// Current error value.
    fn error(&self) -> Option<ControlError> {
        self.error_changes().get()
    }

    /// Current combined state.
    fn state(&self) -> ControlState {
        self.state_changes().get()
    }
}

/// Shared handle type controls are composed through.
pub type ControlHandle = Arc<dyn AbstractControl>;
