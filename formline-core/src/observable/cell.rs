//! Observable Value Cell
//!
//! A cell holds the current value and notifies subscribers on change. It is
//! the replay-of-1 primitive the control graph is assembled from: late
//! subscribers can read the current value synchronously via [`ObservableCell::get`]
//! or have it replayed via [`ObservableCell::watch`].
//!
//! # Completion
//!
//! A completed cell never notifies again. Completion drops all subscriber
//! callbacks and is idempotent; `get` keeps returning the last value so
//! snapshot reads stay coherent after teardown.
//!
//! # Reentrancy
//!
//! The subscriber list is snapshotted before callbacks run, so a callback may
//! subscribe, unsubscribe, or set the same cell without deadlocking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::subscription::Subscription;

/// Counter for generating unique subscriber ids.
static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_subscriber_id() -> u64 {
    SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type SubscriberList<T> = SmallVec<[(u64, Callback<T>); 2]>;

struct CellInner<T> {
    value: RwLock<T>,
    subscribers: RwLock<SubscriberList<T>>,
    completed: AtomicBool,
}

/// An observable value cell: current value + change notification.
///
/// `Clone` shares state; all clones observe and mutate the same cell.
pub struct ObservableCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<CellInner<T>>,
}

impl<T> ObservableCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                value: RwLock::new(initial),
                subscribers: RwLock::new(SmallVec::new()),
                completed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Stores `value` and notifies all subscribers unconditionally.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value.clone();
        self.notify(&value);
    }

    /// Stores `value`; notifies only when it differs from the current value.
    ///
    /// The backing store is always updated, so a later distinct value
    /// dispatches against the latest write rather than the last emission.
    /// Returns whether subscribers were notified.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let changed = {
            let mut guard = self.inner.value.write();
            let changed = *guard != value;
            *guard = value.clone();
            changed
        };

        if changed {
            self.notify(&value);
        }

        changed
    }

    /// Registers `callback` to run on every subsequent notification.
    ///
    /// The returned handle unsubscribes when dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = next_subscriber_id();
        self.inner
            .subscribers
            .write()
            .push((id, Arc::new(callback)));

        let weak: Weak<CellInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.write().retain(|(sid, _)| *sid != id);
            }
        })
    }

    /// Replays the current value into `callback`, then subscribes.
    ///
    /// This is the late-subscriber entry point for adapters: the first call
    /// happens synchronously with the current value.
    pub fn watch<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        callback(&self.get());
        self.subscribe(callback)
    }

    /// Stops all future notifications and drops every subscriber. Idempotent.
    pub fn complete(&self) {
        self.inner.completed.store(true, Ordering::SeqCst);
        self.inner.subscribers.write().clear();
    }

    /// Whether the cell has been completed.
    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::SeqCst)
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    fn notify(&self, value: &T) {
        if self.is_completed() {
            return;
        }

        // Snapshot the list so callbacks may mutate subscriptions freely.
        let callbacks: SmallVec<[Callback<T>; 2]> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(value);
        }
    }
}

impl<T> Clone for ObservableCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ObservableCell<T>
where
    T: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableCell")
            .field("value", &self.get())
            .field("subscriber_count", &self.subscriber_count())
            .field("completed", &self.is_completed())
            .finish()
    }
}
