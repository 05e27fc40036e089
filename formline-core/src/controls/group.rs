//! Form Group
//!
//! A `FormGroup` composes a fixed, named set of child controls into one
//! control whose value is a keyed record. The key set is immutable for the
//! group's life; dynamic shapes belong to `FormArray`.
//!
//! A group stores no value of its own. Its value, dirty, touched, valid, and
//! error cells are derived from its children: the value zips field names
//! with child values, dirty/touched/valid are the AND over direct children,
//! and the error is a sparse record of the failing children only.
//!
//! # Ownership
//!
//! The group owns its *subscriptions* to the children, never the children
//! themselves: `destroy()` drops the listeners and completes the group's own
//! streams, and the children keep working (they may be shared or reused
//! elsewhere). Child listeners hold only weak back-references, so children
//! never keep a dropped group alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::controls::abstract_control::{
    AbstractControl, ControlHandle, ControlId, ControlState,
};
use crate::controls::error::ControlError;
use crate::observable::{tick, ObservableCell, SubscriptionSet};
use crate::value::Value;

struct GroupInner {
    id: ControlId,
    controls: IndexMap<String, ControlHandle>,
    initial_value: RwLock<Value>,
    value: ObservableCell<Value>,
    dirty: ObservableCell<bool>,
    touched: ObservableCell<bool>,
    valid: ObservableCell<bool>,
    error: ObservableCell<Option<ControlError>>,
    state: ObservableCell<ControlState>,
    subscriptions: SubscriptionSet,
    destroyed: AtomicBool,
}

/// A composite control over a fixed key-to-control mapping. `Clone` shares
/// state.
pub struct FormGroup {
    inner: Arc<GroupInner>,
}

impl FormGroup {
    /// Creates a group over the given children.
    ///
    /// The group's initial value (the record of the children's current
    /// values) becomes its remembered reset target.
    pub fn new(controls: IndexMap<String, ControlHandle>) -> Self {
        let value = compute_value(&controls);
        let dirty = compute_all(&controls, |c| c.dirty());
        let touched = compute_all(&controls, |c| c.touched());
        let valid = compute_all(&controls, |c| c.valid());
        let error = compute_error(&controls);

        let inner = Arc::new(GroupInner {
            id: ControlId::new(),
            initial_value: RwLock::new(value.clone()),
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
            controls,
            subscriptions: SubscriptionSet::new(),
            destroyed: AtomicBool::new(false),
        });

        let group = Self { inner };
        group.subscribe_to_children();
        group
    }

    /// The child mapping, in declaration order.
    pub fn controls(&self) -> &IndexMap<String, ControlHandle> {
        &self.inner.controls
    }

    /// The child named `name`.
    ///
    /// # Panics
    ///
    /// Panics when no child carries that name; asking for an unknown field
    /// is a caller bug, not a validation failure.
    pub fn control(&self, name: &str) -> ControlHandle {
        self.try_control(name)
            .unwrap_or_else(|| panic!("form group has no control named `{name}`"))
    }

    /// The child named `name`, or `None` when absent.
    pub fn try_control(&self, name: &str) -> Option<ControlHandle> {
        self.inner.controls.get(name).cloned()
    }

    /// Applies a partial patch: only keys present in `value` are forwarded.
    ///
    /// `set_value` delegates here; the two are intentionally identical (there
    /// is no strict full-replace operation).
    ///
    /// # Panics
    ///
    /// Panics when `value` is not a record or names an unknown field.
    pub fn patch_value(&self, value: Value) {
        if self.is_destroyed() {
            return;
        }

        let Value::Record(fields) = value else {
            panic!("form group expects a record value, got {value:?}");
        };

        tick::batch(|| {
            for (name, field_value) in fields {
                self.control(&name).set_value(field_value);
            }
        });
    }

    fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    fn subscribe_to_children(&self) {
        for child in self.inner.controls.values() {
            let subs = &self.inner.subscriptions;

            subs.add(child.value_changes().subscribe(with_group(
                &self.inner,
                |group| group.recompute_value(),
            )));
            subs.add(child.dirty_changes().subscribe(with_group(
                &self.inner,
                |group| group.recompute_dirty(),
            )));
            subs.add(child.touched_changes().subscribe(with_group(
                &self.inner,
                |group| group.recompute_touched(),
            )));
            subs.add(child.valid_changes().subscribe(with_group(
                &self.inner,
                |group| group.recompute_valid(),
            )));
            subs.add(child.error_changes().subscribe(with_group(
                &self.inner,
                |group| group.recompute_error(),
            )));
        }
    }

    fn recompute_value(&self) {
        let value = compute_value(&self.inner.controls);
        if self.inner.value.set_if_changed(value) {
            self.schedule_snapshot();
        }
    }

    fn recompute_dirty(&self) {
        let dirty = compute_all(&self.inner.controls, |c| c.dirty());
        if self.inner.dirty.set_if_changed(dirty) {
            self.schedule_snapshot();
        }
    }

    fn recompute_touched(&self) {
        let touched = compute_all(&self.inner.controls, |c| c.touched());
        if self.inner.touched.set_if_changed(touched) {
            self.schedule_snapshot();
        }
    }

    fn recompute_valid(&self) {
        let valid = compute_all(&self.inner.controls, |c| c.valid());
        if self.inner.valid.set_if_changed(valid) {
            self.schedule_snapshot();
        }
    }

    fn recompute_error(&self) {
        let error = compute_error(&self.inner.controls);
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

/// Child listener that upgrades a weak group reference before recomputing.
fn with_group<T>(
    inner: &Arc<GroupInner>,
    recompute: fn(&FormGroup),
) -> impl Fn(&T) + Send + Sync + 'static {
    let weak: Weak<GroupInner> = Arc::downgrade(inner);
    move |_: &T| {
        if let Some(inner) = weak.upgrade() {
            recompute(&FormGroup { inner });
        }
    }
}

fn compute_value(controls: &IndexMap<String, ControlHandle>) -> Value {
    Value::Record(
        controls
            .iter()
            .map(|(name, control)| (name.clone(), control.value()))
            .collect(),
    )
}

fn compute_all(
    controls: &IndexMap<String, ControlHandle>,
    flag: impl Fn(&dyn AbstractControl) -> bool,
) -> bool {
    controls.values().all(|control| flag(control.as_ref()))
}

fn compute_error(controls: &IndexMap<String, ControlHandle>) -> Option<ControlError> {
    let failing: IndexMap<String, ControlError> = controls
        .iter()
        .filter_map(|(name, control)| control.error().map(|error| (name.clone(), error)))
        .collect();

    if failing.is_empty() {
        None
    } else {
        Some(ControlError::Fields(failing))
    }
}

impl AbstractControl for FormGroup {
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

    /// Identical to [`FormGroup::patch_value`]: a partial patch. Omitted
    /// fields keep their current values.
    fn set_value(&self, value: Value) {
        self.patch_value(value);
    }

    fn reset(&self, initial: Option<Value>) {
        if self.is_destroyed() {
            return;
        }

        if let Some(initial) = initial {
            if !matches!(initial, Value::Record(_)) {
                panic!("form group reset expects a record value, got {initial:?}");
            }
            *self.inner.initial_value.write() = initial;
        }

        let Value::Record(fields) = self.inner.initial_value.read().clone() else {
            unreachable!("group initial value is always a record");
        };

        tick::batch(|| {
            for (name, field_value) in fields {
                self.control(&name).reset(Some(field_value));
            }
        });
    }

    fn mark_as_touched(&self) {
        if self.is_destroyed() {
            return;
        }

        tick::batch(|| {
            for control in self.inner.controls.values() {
                control.mark_as_touched();
            }
        });
    }

    fn mark_as_untouched(&self) {
        if self.is_destroyed() {
            return;
        }

        tick::batch(|| {
            for control in self.inner.controls.values() {
                control.mark_as_untouched();
            }
        });
    }

    fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(group = self.inner.id.raw(), "destroying group");

        // Drop child listeners only; the children are not ours to destroy.
        self.inner.subscriptions.clear();

        self.inner.value.complete();
        self.inner.dirty.complete();
        self.inner.touched.complete();
        self.inner.valid.complete();
        self.inner.error.complete();
        self.inner.state.complete();
    }
}

impl Clone for FormGroup {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for FormGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormGroup")
            .field("id", &self.inner.id)
            .field("fields", &self.inner.controls.keys().collect::<Vec<_>>())
            .field("valid", &self.valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::control::{FormControl, SyncValidator};
    use std::sync::atomic::AtomicI32;

    fn required() -> SyncValidator {
        Arc::new(|control: &FormControl| {
            if control.dirty() {
                None
            } else {
                Some(ControlError::failure("required"))
            }
        })
    }

    fn group_of(pairs: Vec<(&str, ControlHandle)>) -> FormGroup {
        FormGroup::new(
            pairs
                .into_iter()
                .map(|(name, control)| (name.to_owned(), control))
                .collect(),
        )
    }

    #[test]
    fn value_zips_children() {
        let group = group_of(vec![
            ("name", Arc::new(FormControl::new("ada"))),
            ("age", Arc::new(FormControl::new(36))),
        ]);

        assert_eq!(
            group.value(),
            Value::Record(indexmap::indexmap! {
                "name".to_owned() => Value::from("ada"),
                "age".to_owned() => Value::from(36),
            })
        );
    }

    #[test]
    fn validity_is_and_over_children() {
        let valid_child = Arc::new(FormControl::new("x"));
        let invalid_child = Arc::new(FormControl::with_validators(
            "",
            vec![required()],
            Vec::new(),
        ));

        let group = group_of(vec![("a", valid_child.clone()), ("b", invalid_child)]);
        assert!(!group.valid());

        let all_valid = group_of(vec![
            ("a", valid_child),
            ("b", Arc::new(FormControl::new("y"))),
        ]);
        assert!(all_valid.valid());
    }

    #[test]
    fn error_is_a_sparse_record_of_failing_children() {
        let group = group_of(vec![
            ("a", Arc::new(FormControl::new("x"))),
            (
                "b",
                Arc::new(FormControl::with_validators("", vec![required()], Vec::new())),
            ),
        ]);

        let error = group.error().unwrap();
        let fields = error.as_fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("b"), Some(&ControlError::failure("required")));
        assert!(!fields.contains_key("a"));
    }

    #[test]
    fn child_changes_propagate_synchronously() {
        let child = Arc::new(FormControl::with_validators("", vec![required()], Vec::new()));
        let group = group_of(vec![("field", child.clone())]);

        assert!(!group.valid());

        child.set_value(Value::from("filled"));
        assert!(group.valid());
        assert_eq!(group.error(), None);
        assert_eq!(
            group.value(),
            Value::Record(indexmap::indexmap! {
                "field".to_owned() => Value::from("filled"),
            })
        );
    }

    #[test]
    fn set_value_is_a_partial_patch() {
        let group = group_of(vec![
            ("a", Arc::new(FormControl::new("one"))),
            ("b", Arc::new(FormControl::new("two"))),
        ]);

        group.set_value(Value::Record(indexmap::indexmap! {
            "a".to_owned() => Value::from("changed"),
        }));

        assert_eq!(
            group.value(),
            Value::Record(indexmap::indexmap! {
                "a".to_owned() => Value::from("changed"),
                "b".to_owned() => Value::from("two"),
            })
        );
    }

    #[test]
    #[should_panic(expected = "no control named")]
    fn unknown_field_panics() {
        let group = group_of(vec![("a", Arc::new(FormControl::new("one")))]);
        group.set_value(Value::Record(indexmap::indexmap! {
            "missing".to_owned() => Value::from(1),
        }));
    }

    #[test]
    #[should_panic(expected = "expects a record")]
    fn non_record_value_panics() {
        let group = group_of(vec![("a", Arc::new(FormControl::new("one")))]);
        group.set_value(Value::from(5));
    }

    #[test]
    fn reset_distributes_initial_values() {
        let group = group_of(vec![
            ("a", Arc::new(FormControl::new("one"))),
            ("b", Arc::new(FormControl::new("two"))),
        ]);

        group.set_value(Value::Record(indexmap::indexmap! {
            "a".to_owned() => Value::from("x"),
            "b".to_owned() => Value::from("y"),
        }));
        group.reset(None);

        assert_eq!(
            group.value(),
            Value::Record(indexmap::indexmap! {
                "a".to_owned() => Value::from("one"),
                "b".to_owned() => Value::from("two"),
            })
        );
    }

    #[test]
    fn reset_with_value_replaces_initial_wholesale() {
        let group = group_of(vec![("a", Arc::new(FormControl::new("one")))]);

        group.reset(Some(Value::Record(indexmap::indexmap! {
            "a".to_owned() => Value::from("new"),
        })));
        assert_eq!(
            group.value(),
            Value::Record(indexmap::indexmap! {
                "a".to_owned() => Value::from("new"),
            })
        );

        group.set_value(Value::Record(indexmap::indexmap! {
            "a".to_owned() => Value::from("edited"),
        }));
        group.reset(None);
        assert_eq!(
            group.value(),
            Value::Record(indexmap::indexmap! {
                "a".to_owned() => Value::from("new"),
            })
        );
    }

    #[test]
    fn touched_cascades_to_children() {
        let child_a = Arc::new(FormControl::new("x"));
        let child_b = Arc::new(FormControl::new("y"));
        let group = group_of(vec![("a", child_a.clone()), ("b", child_b.clone())]);

        assert!(!group.touched());
        group.mark_as_touched();
        assert!(child_a.touched());
        assert!(child_b.touched());
        assert!(group.touched());

        group.mark_as_untouched();
        assert!(!group.touched());
        assert!(!child_a.touched());
    }

    #[test]
    fn one_snapshot_per_child_mutation() {
        let child = Arc::new(FormControl::with_validators("", vec![required()], Vec::new()));
        let group = group_of(vec![("field", child.clone())]);

        let snapshots = Arc::new(AtomicI32::new(0));
        let snapshots_clone = snapshots.clone();
        let _sub = group.state_changes().subscribe(move |_| {
            snapshots_clone.fetch_add(1, Ordering::SeqCst);
        });

        // One child mutation changes the group's value, dirty, valid, and
        // error cells; the group snapshot still fires once.
        child.set_value(Value::from("filled"));
        assert_eq!(snapshots.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destroy_keeps_children_alive() {
        let child = Arc::new(FormControl::new("x"));
        let group = group_of(vec![("a", child.clone())]);

        group.destroy();
        group.destroy(); // idempotent

        // The child still works; the group no longer reacts.
        child.set_value(Value::from("after"));
        assert_eq!(child.value(), Value::from("after"));
        assert!(!child.value_changes().is_completed());
        assert!(group.value_changes().is_completed());
    }

    #[test]
    fn destroyed_group_stops_mutating_children() {
        let child = Arc::new(FormControl::new("x"));
        let group = group_of(vec![("a", child.clone())]);

        group.destroy();

        group.mark_as_touched();
        assert!(!child.touched());

        child.mark_as_touched();
        group.mark_as_untouched();
        assert!(child.touched());
    }

    #[test]
    fn snapshots_keep_flowing_after_a_caught_contract_panic() {
        let group = group_of(vec![("a", Arc::new(FormControl::new("one")))]);

        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            group.set_value(Value::Record(indexmap::indexmap! {
                "missing".to_owned() => Value::from(1),
            }));
        }));
        assert!(caught.is_err());

        // The panic unwound out of an open batch; later mutations on this
        // thread must still emit their snapshots.
        let control = FormControl::new("");
        let snapshots = Arc::new(AtomicI32::new(0));
        let snapshots_clone = snapshots.clone();
        let _sub = control.state_changes().subscribe(move |_| {
            snapshots_clone.fetch_add(1, Ordering::SeqCst);
        });

        control.set_value(Value::from("filled"));
        assert_eq!(snapshots.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_group_error_shape() {
        let inner_child = Arc::new(FormControl::with_validators(
            "",
            vec![required()],
            Vec::new(),
        ));
        let inner = Arc::new(group_of(vec![("deep", inner_child)]));
        let outer = group_of(vec![("nested", inner as ControlHandle)]);

        let error = outer.error().unwrap();
        let fields = error.as_fields().unwrap();
        let nested = fields.get("nested").unwrap().as_fields().unwrap();
        assert_eq!(
            nested.get("deep"),
            Some(&ControlError::failure("required"))
        );
    }
}
