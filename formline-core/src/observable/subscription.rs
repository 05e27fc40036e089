//! Subscription Handles
//!
//! A [`Subscription`] detaches its listener when dropped, so listener
//! lifetime follows handle lifetime. Controls keep the handles for their
//! internal child listeners in a [`SubscriptionSet`]; tearing a control down
//! (or resubscribing an array to a new child list) is a single `clear()`.

use parking_lot::Mutex;

/// Handle to an active cell subscription. Unsubscribes when dropped.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Explicitly unsubscribes. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

/// An owned set of subscriptions, dropped together.
#[derive(Default)]
pub struct SubscriptionSet {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscription to the set.
    pub fn add(&self, subscription: Subscription) {
        self.subscriptions.lock().push(subscription);
    }

    /// Drops every held subscription, unsubscribing each.
    pub fn clear(&self) {
        self.subscriptions.lock().clear();
    }

    /// Number of held subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Whether the set holds no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }
}

impl std::fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("len", &self.len())
            .finish()
    }
}
