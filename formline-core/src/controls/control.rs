//! Leaf Form Control
//!
//! A `FormControl` is the only control kind that stores a raw value. It owns
//! the value, the remembered initial value, the touched flag, and two
//! runtime-mutable validator lists, and derives dirty/error/valid reactively.
//!
//! # Validation
//!
//! On every effective value change (and on any validator-list change):
//!
//! 1. Synchronous validators run in list order; the first failure wins and
//!    later validators do not run.
//!
//! 2. If every synchronous validator passes and asynchronous validators are
//!    registered, `None` is published immediately as the provisional error,
//!    then all async validators start concurrently and the first settled
//!    result wins. An observer sees `error -> None -> <async result>` and
//!    never a stale failure.
//!
//! 3. Each validation pass bumps an epoch counter. A slow async result whose
//!    epoch is no longer current is ignored (not aborted), so superseded
//!    passes and destroyed controls can never publish.
//!
//! Async validators need an ambient tokio runtime; when none is available
//! they are skipped with a warning and the sync result stands.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::{select_all, BoxFuture};
use parking_lot::RwLock;

use crate::controls::abstract_control::{AbstractControl, ControlId, ControlState};
use crate::controls::error::ControlError;
use crate::observable::{tick, ObservableCell};
use crate::value::{is_not_empty, Value};

/// A synchronous validator: reads the live control, returns `None` to pass.
pub type SyncValidator = Arc<dyn Fn(&FormControl) -> Option<ControlError> + Send + Sync>;

/// An asynchronous validator: reads the live control, resolves to `None` to
/// pass. All registered async validators are raced; first settled wins.
pub type AsyncValidator =
    Arc<dyn Fn(&FormControl) -> BoxFuture<'static, Option<ControlError>> + Send + Sync>;

struct ControlInner {
    id: ControlId,
    initial_value: RwLock<Value>,
    value: ObservableCell<Value>,
    dirty: ObservableCell<bool>,
    touched: ObservableCell<bool>,
    valid: ObservableCell<bool>,
    error: ObservableCell<Option<ControlError>>,
    state: ObservableCell<ControlState>,
    validators: RwLock<Vec<SyncValidator>>,
    async_validators: RwLock<Vec<AsyncValidator>>,
    /// Bumped on every validation pass; guards against stale async results.
    epoch: AtomicU64,
    destroyed: AtomicBool,
}

/// A leaf control holding a single value. `Clone` shares state.
pub struct FormControl {
    inner: Arc<ControlInner>,
}

impl FormControl {
    /// Creates a control with no validators.
    pub fn new(initial: impl Into<Value>) -> Self {
        Self::with_validators(initial, Vec::new(), Vec::new())
    }

    /// Creates a control with sync and async validator lists.
    ///
    /// Validation runs eagerly: the control's error and valid state reflect
    /// the initial value as soon as construction returns.
    pub fn with_validators(
        initial: impl Into<Value>,
        validators: Vec<SyncValidator>,
        async_validators: Vec<AsyncValidator>,
    ) -> Self {
        let initial = initial.into();
        let dirty = is_not_empty(&initial);

        let control = Self {
            inner: Arc::new(ControlInner {
                id: ControlId::new(),
                initial_value: RwLock::new(initial.clone()),
                value: ObservableCell::new(initial.clone()),
                dirty: ObservableCell::new(dirty),
                touched: ObservableCell::new(false),
                valid: ObservableCell::new(true),
                error: ObservableCell::new(None),
                state: ObservableCell::new(ControlState {
                    value: initial,
                    dirty,
                    touched: false,
                    valid: true,
                    error: None,
                }),
                validators: RwLock::new(validators),
                async_validators: RwLock::new(async_validators),
                epoch: AtomicU64::new(0),
                destroyed: AtomicBool::new(false),
            }),
        };

        tick::batch(|| control.revalidate());
        control
    }

    /// Appends a synchronous validator and re-triggers validation.
    pub fn add_validator(&self, validator: SyncValidator) {
        self.inner.validators.write().push(validator);
        tick::batch(|| self.revalidate());
    }

    /// Removes a synchronous validator by identity and re-triggers validation.
    pub fn remove_validator(&self, validator: &SyncValidator) {
        self.inner
            .validators
            .write()
            .retain(|existing| !Arc::ptr_eq(existing, validator));
        tick::batch(|| self.revalidate());
    }

    /// Appends an asynchronous validator and re-triggers validation.
    pub fn add_async_validator(&self, validator: AsyncValidator) {
        self.inner.async_validators.write().push(validator);
        tick::batch(|| self.revalidate());
    }

    /// Removes an asynchronous validator by identity and re-triggers validation.
    pub fn remove_async_validator(&self, validator: &AsyncValidator) {
        self.inner
            .async_validators
            .write()
            .retain(|existing| !Arc::ptr_eq(existing, validator));
        tick::batch(|| self.revalidate());
    }

    /// The value the control resets to.
    pub fn initial_value(&self) -> Value {
        self.inner.initial_value.read().clone()
    }

    fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Runs a full validation pass for the current value.
    fn revalidate(&self) {
        if self.is_destroyed() {
            return;
        }

        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(error) = self.run_sync_validators() {
            // A sync failure short-circuits the async stage entirely.
            self.apply_error(Some(error));
            return;
        }

        // Provisional pass result; the async race may override it later.
        self.apply_error(None);

        let async_validators: Vec<AsyncValidator> =
            self.inner.async_validators.read().iter().cloned().collect();
        if !async_validators.is_empty() {
            self.race_async_validators(async_validators, epoch);
        }
    }

    /// First failing sync validator wins; later ones are not invoked.
    fn run_sync_validators(&self) -> Option<ControlError> {
        let validators: Vec<SyncValidator> =
            self.inner.validators.read().iter().cloned().collect();

        for validator in validators {
            if let Some(error) = validator(self) {
                return Some(error);
            }
        }

        None
    }

    fn race_async_validators(&self, validators: Vec<AsyncValidator>, epoch: u64) {
        let futures: Vec<BoxFuture<'static, Option<ControlError>>> =
            validators.iter().map(|validator| validator(self)).collect();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(
                    control = self.inner.id.raw(),
                    "async validators skipped: no tokio runtime in scope"
                );
                return;
            }
        };

        let weak = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            let (result, _index, _remaining) = select_all(futures).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Only the latest validation pass of a live control may publish.
            if inner.epoch.load(Ordering::SeqCst) != epoch
                || inner.destroyed.load(Ordering::SeqCst)
            {
                return;
            }

            let control = FormControl { inner };
            tick::batch(|| control.apply_error(result));
        });
    }

    fn apply_error(&self, error: Option<ControlError>) {
        let valid = error.is_none();
        let error_changed = self.inner.error.set_if_changed(error);
        let valid_changed = self.inner.valid.set_if_changed(valid);

        if error_changed || valid_changed {
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

impl AbstractControl for FormControl {
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

    fn set_value(&self, value: Value) {
        if self.is_destroyed() {
            return;
        }

        tick::batch(|| {
            let changed = self.inner.value.set_if_changed(value);
            if !changed {
                return;
            }

            self.inner
                .dirty
                .set_if_changed(is_not_empty(&self.inner.value.get()));
            self.revalidate();
            self.schedule_snapshot();
        });
    }

    fn reset(&self, initial: Option<Value>) {
        if self.is_destroyed() {
            return;
        }

        if let Some(initial) = initial {
            *self.inner.initial_value.write() = initial;
        }

        self.set_value(self.inner.initial_value.read().clone());
    }

    fn mark_as_touched(&self) {
        if self.is_destroyed() {
            return;
        }

        tick::batch(|| {
            if self.inner.touched.set_if_changed(true) {
                self.schedule_snapshot();
            }
        });
    }

    fn mark_as_untouched(&self) {
        if self.is_destroyed() {
            return;
        }

        tick::batch(|| {
            if self.inner.touched.set_if_changed(false) {
                self.schedule_snapshot();
            }
        });
    }

    fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(control = self.inner.id.raw(), "destroying control");

        // Invalidate any in-flight async validation.
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        self.inner.value.complete();
        self.inner.dirty.complete();
        self.inner.touched.complete();
        self.inner.valid.complete();
        self.inner.error.complete();
        self.inner.state.complete();
    }
}

impl Clone for FormControl {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for FormControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormControl")
            .field("id", &self.inner.id)
            .field("value", &self.value())
            .field("dirty", &self.dirty())
            .field("touched", &self.touched())
            .field("valid", &self.valid())
            .finish()
    }
}
