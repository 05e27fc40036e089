//! Form Array
//!
//! A `FormArray` composes an ordered, *dynamic* list of child controls. Rows
//! can be added and removed at runtime, which makes the array reactive on two
//! levels: to each child's cells, and to the shape of the child list itself.
//! Every structural change drops the old child listeners wholesale and
//! re-subscribes to the current list, so a removed child can never reach the
//! array again.
//!
//! The derived cells mirror [`FormGroup`](crate::controls::group::FormGroup):
//! value is the positional list of child values, dirty/touched/valid are the
//! AND over children, and the error is a sparse index-to-error record. An
//! empty array is the neutral element: value `[]`, not dirty, not touched,
//! valid, no error.
//!
//! Ownership is shallow here too: `destroy()` drops the listeners and
//! completes the array's own streams, never the children's.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::controls::abstract_control::{
    AbstractControl, ControlHandle, ControlId, ControlState,
};
use crate::controls::error::ControlError;
use crate::observable::{tick, ObservableCell, SubscriptionSet};
use crate::value::Value;

struct ArrayInner {
    id: ControlId,
    controls: RwLock<Vec<ControlHandle>>,
    value: ObservableCell<Value>,
    dirty: ObservableCell<bool>,
    touched: ObservableCell<bool>,
    valid: ObservableCell<bool>,
    error: ObservableCell<Option<ControlError>>,
    state: ObservableCell<ControlState>,
    subscriptions: SubscriptionSet,
    destroyed: AtomicBool,
}

/// A composite control over an ordered, growable list of children. `Clone`
/// shares state.
pub struct FormArray {
    inner: Arc<ArrayInner>,
}

impl FormArray {
    /// Creates an array over the given children. An empty list is fine.
    pub fn new(controls: Vec<ControlHandle>) -> Self {
        let value = compute_value(&controls);
        let dirty = compute_all(&controls, |c| c.dirty());
        let touched = compute_all(&controls, |c| c.touched());
        let valid = compute_valid(&controls);
        let error = compute_error(&controls);

        let inner = Arc::new(ArrayInner {
            id: ControlId::new(),
            value: ObservableCell::new(value.clone()),
            dirty: ObservableCell::new(dirty),
            touched: ObservableCell::new(touched),
            valid: ObservableCell::new(valid),
            error: ObservableCell::new(error.clone()),
            state: ObservableCell::new(ControlState {
                value,
                dirty,
                touched,
                valid,
                error,
            }),
            controls: RwLock::new(controls),
            subscriptions: SubscriptionSet::new(),
            destroyed: AtomicBool::new(false),
        });

        let array = Self { inner };
        array.resubscribe();
        array
    }

    /// A snapshot of the current child list.
    pub fn controls(&self) -> Vec<ControlHandle> {
        self.inner.controls.read().clone()
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.inner.controls.read().len()
    }

    /// Whether the array has no children.
    pub fn is_empty(&self) -> bool {
        self.inner.controls.read().is_empty()
    }

    /// The child at `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of bounds.
    pub fn control_at(&self, index: usize) -> ControlHandle {
        self.try_control_at(index)
            .unwrap_or_else(|| panic!("form array index {index} out of bounds"))
    }

    /// The child at `index`, or `None` when out of bounds.
    pub fn try_control_at(&self, index: usize) -> Option<ControlHandle> {
        self.inner.controls.read().get(index).cloned()
    }

    /// Inserts `control` at `position`, or appends when `position` is `None`.
    ///
    /// # Panics
    ///
    /// Panics when `position` exceeds the current length.
    pub fn add_control(&self, control: ControlHandle, position: Option<usize>) {
        if self.is_destroyed() {
            return;
        }

        {
            let mut controls = self.inner.controls.write();
            let index = position.unwrap_or(controls.len());
            if index > controls.len() {
                panic!(
                    "form array insert position {index} out of bounds (len {})",
                    controls.len()
                );
            }
            controls.insert(index, control);
        }

        self.on_shape_changed();
    }

    /// Removes the child at `index`. The child itself is not destroyed.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of bounds.
    pub fn remove_control_at(&self, index: usize) {
        if self.is_destroyed() {
            return;
        }

        {
            let mut controls = self.inner.controls.write();
            if index >= controls.len() {
                panic!(
                    "form array index {index} out of bounds (len {})",
                    controls.len()
                );
            }
            controls.remove(index);
        }

        self.on_shape_changed();
    }

    /// Removes the child with the given identity. A miss is a no-op: callers
    /// removing a row that a concurrent edit already removed should not blow
    /// up.
    pub fn remove_control(&self, id: ControlId) {
        if self.is_destroyed() {
            return;
        }

        let removed = {
            let mut controls = self.inner.controls.write();
            let before = controls.len();
            controls.retain(|control| control.id() != id);
            controls.len() != before
        };

        if removed {
            self.on_shape_changed();
        }
    }

    fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Re-derives everything after a structural change. The old listener set
    /// is dropped wholesale, so departed children go silent immediately.
    fn on_shape_changed(&self) {
        self.resubscribe();
        tick::batch(|| {
            self.recompute_value();
            self.recompute_dirty();
            self.recompute_touched();
            self.recompute_valid();
            self.recompute_error();
            self.schedule_snapshot();
        });
    }

    fn resubscribe(&self) {
        self.inner.subscriptions.clear();

        for child in self.inner.controls.read().iter() {
            let subs = &self.inner.subscriptions;

            subs.add(child.value_changes().subscribe(with_array(
                &self.inner,
                |array| array.recompute_value(),
            )));
            subs.add(child.dirty_changes().subscribe(with_array(
                &self.inner,
                |array| array.recompute_dirty(),
            )));
            subs.add(child.touched_changes().subscribe(with_array(
                &self.inner,
                |array| array.recompute_touched(),
            )));
            subs.add(child.valid_changes().subscribe(with_array(
                &self.inner,
                |array| array.recompute_valid(),
            )));
            subs.add(child.error_changes().subscribe(with_array(
                &self.inner,
                |array| array.recompute_error(),
            )));
        }
    }

    fn recompute_value(&self) {
        let value = compute_value(&self.inner.controls.read());
        if self.inner.value.set_if_changed(value) {
            self.schedule_snapshot();
        }
    }

    fn recompute_dirty(&self) {
        let dirty = compute_all(&self.inner.controls.read(), |c| c.dirty());
        if self.inner.dirty.set_if_changed(dirty) {
            self.schedule_snapshot();
        }
    }

    fn recompute_touched(&self) {
        let touched = compute_all(&self.inner.controls.read(), |c| c.touched());
        if self.inner.touched.set_if_changed(touched) {
            self.schedule_snapshot();
        }
    }

    fn recompute_valid(&self) {
        let valid = compute_valid(&self.inner.controls.read());
        if self.inner.valid.set_if_changed(valid) {
            self.schedule_snapshot();
        }
    }

    fn recompute_error(&self) {
        let error = compute_error(&self.inner.controls.read());
        if self.inner.error.set_if_changed(error) {
            self.schedule_snapshot();
        }
    }

    fn schedule_snapshot(&self) {
        let weak = Arc::downgrade(&self.inner);
        tick::schedule(self.inner.id.raw(), move || {
            if let Some(inner) = weak.upgrade() {
                if !inner.destroyed.load(Ordering::SeqCst) {
                    inner.state.set(ControlState {
                        value: inner.value.get(),
                        dirty: inner.dirty.get(),
                        touched: inner.touched.get(),
                        valid: inner.valid.get(),
                        error: inner.error.get(),
                    });
                }
            }
        });
    }
}

/// Child listener that upgrades a weak array reference before recomputing.
fn with_array<T>(
    inner: &Arc<ArrayInner>,
    recompute: fn(&FormArray),
) -> impl Fn(&T) + Send + Sync + 'static {
    let weak: Weak<ArrayInner> = Arc::downgrade(inner);
    move |_: &T| {
        if let Some(inner) = weak.upgrade() {
            recompute(&FormArray { inner });
        }
    }
}

fn compute_value(controls: &[ControlHandle]) -> Value {
    Value::List(controls.iter().map(|control| control.value()).collect())
}

// Empty arrays read as pristine: not dirty, not touched.
fn compute_all(controls: &[ControlHandle], flag: impl Fn(&dyn AbstractControl) -> bool) -> bool {
    !controls.is_empty() && controls.iter().all(|control| flag(control.as_ref()))
}

fn compute_valid(controls: &[ControlHandle]) -> bool {
    controls.iter().all(|control| control.valid())
}

fn compute_error(controls: &[ControlHandle]) -> Option<ControlError> {
    let failing: BTreeMap<usize, ControlError> = controls
        .iter()
        .enumerate()
        .filter_map(|(index, control)| control.error().map(|error| (index, error)))
        .collect();

    if failing.is_empty() {
        None
    } else {
        Some(ControlError::Items(failing))
    }
}

impl AbstractControl for FormArray {
    fn id(&self) -> ControlId {
        self.inner.id
    }

    fn value_changes(&self) -> &ObservableCell<Value> {
        &self.inner.value
    }

    fn dirty_changes(&self) -> &ObservableCell<bool> {
        &self.inner.dirty
    }

    fn touched_changes(&self) -> &ObservableCell<bool> {
        &self.inner.touched
    }

    fn valid_changes(&self) -> &ObservableCell<bool> {
        &self.inner.valid
    }

    fn error_changes(&self) -> &ObservableCell<Option<ControlError>> {
        &self.inner.error
    }

    fn state_changes(&self) -> &ObservableCell<ControlState> {
        &self.inner.state
    }

    /// Patches children positionally: item `i` goes to child `i`. A shorter
    /// list patches a prefix and leaves the remaining children untouched.
    ///
    /// # Panics
    ///
    /// Panics when `value` is not a list or holds more items than there are
    /// children.
    fn set_value(&self, value: Value) {
        if self.is_destroyed() {
            return;
        }

        let Value::List(items) = value else {
            panic!("form array expects a list value, got {value:?}");
        };

        let controls = self.controls();
        if items.len() > controls.len() {
            panic!(
                "form array value has {} items but only {} children",
                items.len(),
                controls.len()
            );
        }

        tick::batch(|| {
            for (item, control) in items.into_iter().zip(controls.iter()) {
                control.set_value(item);
            }
        });
    }

    /// Resets every child to its own initial value.
    ///
    /// # Panics
    ///
    /// Panics when `initial` is `Some`: the array's shape is dynamic, so a
    /// remembered array-level initial value has no stable meaning. Reset the
    /// children individually instead.
    fn reset(&self, initial: Option<Value>) {
        if self.is_destroyed() {
            return;
        }

        if initial.is_some() {
            panic!("form array cannot store an initial value; reset children individually");
        }

        tick::batch(|| {
            for control in self.controls() {
                control.reset(None);
            }
        });
    }

    fn mark_as_touched(&self) {
        if self.is_destroyed() {
            return;
        }

        tick::batch(|| {
            for control in self.controls() {
                control.mark_as_touched();
            }
        });
    }

    fn mark_as_untouched(&self) {
        if self.is_destroyed() {
            return;
        }

        tick::batch(|| {
            for control in self.controls() {
                control.mark_as_untouched();
            }
        });
    }

    fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(array = self.inner.id.raw(), "destroying array");

        self.inner.subscriptions.clear();

        self.inner.value.complete();
        self.inner.dirty.complete();
        self.inner.touched.complete();
        self.inner.valid.complete();
        self.inner.error.complete();
        self.inner.state.complete();
    }
}

impl Clone for FormArray {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for FormArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormArray")
            .field("id", &self.inner.id)
            .field("len", &self.len())
            .field("valid", &self.valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::control::{FormControl, SyncValidator};
    use std::sync::atomic::AtomicI32;

    fn min_one() -> SyncValidator {
        Arc::new(|control: &FormControl| match control.value() {
            Value::Number(n) if n >= 1.0 => None,
            _ => Some(ControlError::failure("min")),
        })
    }

    fn leaf(value: impl Into<Value>) -> ControlHandle {
        Arc::new(FormControl::new(value))
    }

    #[test]
    fn empty_array_is_the_neutral_element() {
        let array = FormArray::new(Vec::new());

        assert_eq!(array.value(), Value::List(Vec::new()));
        assert!(!array.dirty());
        assert!(!array.touched());
        assert!(array.valid());
        assert_eq!(array.error(), None);
    }

    #[test]
    fn value_lists_children_positionally() {
        let array = FormArray::new(vec![leaf(1), leaf("two")]);
        assert_eq!(
            array.value(),
            Value::List(vec![Value::from(1), Value::from("two")])
        );
    }

    #[test]
    fn child_changes_propagate() {
        let child = Arc::new(FormControl::with_validators(0, vec![min_one()], Vec::new()));
        let array = FormArray::new(vec![child.clone() as ControlHandle]);

        assert!(!array.valid());

        child.set_value(Value::from(5));
        assert!(array.valid());
        assert_eq!(array.value(), Value::List(vec![Value::from(5)]));
    }

    #[test]
    fn error_is_sparse_by_index() {
        let failing = Arc::new(FormControl::with_validators(0, vec![min_one()], Vec::new()));
        let array = FormArray::new(vec![leaf(3), failing as ControlHandle, leaf(7)]);

        let error = array.error().unwrap();
        let items = error.as_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.get(&1), Some(&ControlError::failure("min")));
    }

    #[test]
    fn add_control_appends_and_inserts() {
        let array = FormArray::new(vec![leaf("a"), leaf("c")]);

        array.add_control(leaf("d"), None);
        array.add_control(leaf("b"), Some(1));

        assert_eq!(
            array.value(),
            Value::List(vec![
                Value::from("a"),
                Value::from("b"),
                Value::from("c"),
                Value::from("d"),
            ])
        );
    }

    #[test]
    #[should_panic(expected = "insert position")]
    fn add_control_past_the_end_panics() {
        let array = FormArray::new(vec![leaf("a")]);
        array.add_control(leaf("b"), Some(2));
    }

    #[test]
    fn remove_control_at_reindexes_errors() {
        let failing = Arc::new(FormControl::with_validators(0, vec![min_one()], Vec::new()));
        let array = FormArray::new(vec![leaf(3), failing as ControlHandle]);

        array.remove_control_at(0);

        assert!(!array.valid());
        let error = array.error().unwrap();
        let items = error.as_items().unwrap();
        assert_eq!(items.get(&0), Some(&ControlError::failure("min")));
        assert_eq!(items.get(&1), None);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn remove_control_at_out_of_bounds_panics() {
        let array = FormArray::new(vec![leaf("a")]);
        array.remove_control_at(1);
    }

    #[test]
    fn remove_control_by_id_is_silent_on_miss() {
        let child = leaf("a");
        let array = FormArray::new(vec![child.clone()]);

        array.remove_control(ControlId::new()); // no such child
        assert_eq!(array.len(), 1);

        array.remove_control(child.id());
        assert_eq!(array.len(), 0);
        assert_eq!(array.value(), Value::List(Vec::new()));
    }

    #[test]
    fn removed_child_goes_silent() {
        let child = Arc::new(FormControl::new("before"));
        let array = FormArray::new(vec![child.clone() as ControlHandle]);

        let emissions = Arc::new(AtomicI32::new(0));
        let emissions_clone = emissions.clone();
        let _sub = array.value_changes().subscribe(move |_| {
            emissions_clone.fetch_add(1, Ordering::SeqCst);
        });

        array.remove_control_at(0);
        let after_removal = emissions.load(Ordering::SeqCst);

        // The departed child still works, but the array no longer listens.
        child.set_value(Value::from("after"));
        assert_eq!(emissions.load(Ordering::SeqCst), after_removal);
        assert_eq!(array.value(), Value::List(Vec::new()));
    }

    #[test]
    fn set_value_patches_a_prefix() {
        let array = FormArray::new(vec![leaf(1), leaf(2), leaf(3)]);

        array.set_value(Value::List(vec![Value::from(10), Value::from(20)]));
        assert_eq!(
            array.value(),
            Value::List(vec![Value::from(10), Value::from(20), Value::from(3)])
        );
    }

    #[test]
    #[should_panic(expected = "items but only")]
    fn set_value_longer_than_children_panics() {
        let array = FormArray::new(vec![leaf(1)]);
        array.set_value(Value::List(vec![Value::from(1), Value::from(2)]));
    }

    #[test]
    #[should_panic(expected = "expects a list")]
    fn set_value_non_list_panics() {
        let array = FormArray::new(vec![leaf(1)]);
        array.set_value(Value::from(1));
    }

    #[test]
    fn reset_restores_each_child() {
        let array = FormArray::new(vec![leaf("a"), leaf("b")]);

        array.set_value(Value::List(vec![Value::from("x"), Value::from("y")]));
        array.reset(None);

        assert_eq!(
            array.value(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    #[should_panic(expected = "cannot store an initial value")]
    fn reset_with_value_panics() {
        let array = FormArray::new(vec![leaf("a")]);
        array.reset(Some(Value::List(vec![Value::from("z")])));
    }

    #[test]
    fn touched_cascades() {
        let child = leaf("a");
        let array = FormArray::new(vec![child.clone()]);

        array.mark_as_touched();
        assert!(child.touched());
        assert!(array.touched());

        array.mark_as_untouched();
        assert!(!child.touched());
        assert!(!array.touched());
    }

    #[test]
    fn one_snapshot_per_structural_change() {
        let array = FormArray::new(vec![leaf(1)]);

        let snapshots = Arc::new(AtomicI32::new(0));
        let snapshots_clone = snapshots.clone();
        let _sub = array.state_changes().subscribe(move |_| {
            snapshots_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Value, dirty, valid, and error may all shift; one snapshot.
        let failing = Arc::new(FormControl::with_validators(0, vec![min_one()], Vec::new()));
        array.add_control(failing, None);
        assert_eq!(snapshots.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destroy_keeps_children_alive() {
        let child = Arc::new(FormControl::new("x"));
        let array = FormArray::new(vec![child.clone() as ControlHandle]);

        array.destroy();
        array.destroy(); // idempotent

        child.set_value(Value::from("after"));
        assert_eq!(child.value(), Value::from("after"));
        assert!(!child.value_changes().is_completed());
        assert!(array.value_changes().is_completed());
    }

    #[test]
    fn destroyed_array_stops_mutating_children() {
        let child = Arc::new(FormControl::new("x"));
        let array = FormArray::new(vec![child.clone() as ControlHandle]);

        array.destroy();

        array.mark_as_touched();
        assert!(!child.touched());

        child.mark_as_touched();
        array.mark_as_untouched();
        assert!(child.touched());
    }
}
