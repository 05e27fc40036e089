//! Observable Primitives
//!
//! This module implements the reactive plumbing the control graph is built
//! on: an observable value cell, subscription handles, and the tick batcher.
//!
//! # Concepts
//!
//! ## Cells
//!
//! An [`ObservableCell`] is a value container supporting synchronous reads of
//! the current value and push notification of subscribers when it changes.
//! It is the single storage behind both the "pull" snapshot API and the
//! "push" stream API of every control, which is what guarantees the two
//! views never disagree.
//!
//! ## Subscriptions
//!
//! Subscribing to a cell returns a [`Subscription`] handle that unsubscribes
//! when dropped. Controls collect the handles for their internal listeners in
//! a [`SubscriptionSet`] so teardown is a single `clear()`.
//!
//! ## Ticks
//!
//! One user-level mutation fans out into several cell updates (value, dirty,
//! valid, error). The [`tick`] module coalesces the per-control state
//! snapshot into a single emission at the end of the current logical tick.

mod cell;
mod subscription;
pub mod tick;

pub use cell::ObservableCell;
pub use subscription::{Subscription, SubscriptionSet};
