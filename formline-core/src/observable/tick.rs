//! Tick Batching
//!
//! One user-level mutation fans out into several cell updates: a `set_value`
//! touches the value, dirty, error, and valid cells in a single synchronous
//! pass. Emitting the combined state snapshot once per contributing cell
//! would make consumers re-render redundantly, so snapshot emission is
//! deferred to the end of the current *tick*.
//!
//! # How It Works
//!
//! 1. Every mutation entry point wraps its work in [`batch`]. Batches nest:
//!    a child mutation propagating into its ancestors stays inside the
//!    outermost batch.
//!
//! 2. While a batch is open, [`schedule`] enqueues a flush closure keyed by
//!    control id. Duplicate keys are dropped, so each control flushes at
//!    most once per tick.
//!
//! 3. When the outermost batch exits, the queue is drained and each flush
//!    closure runs. Closures read live cell state, so a flush always sees
//!    post-update values — never a torn intermediate state.
//!
//! Scheduling with no open batch runs the closure immediately (a degenerate
//! single-operation tick). The queue is thread-local, matching the
//! single-writer-per-tick usage of UI event handling.

use std::cell::RefCell;
use std::collections::HashSet;

thread_local! {
    static CURRENT_TICK: RefCell<Option<TickState>> = const { RefCell::new(None) };
}

struct TickState {
    depth: usize,
    queued: Vec<Box<dyn FnOnce()>>,
    seen: HashSet<u64>,
}

/// Runs `f` inside the current tick, opening one if none is active.
///
/// Flush closures scheduled during `f` run when the outermost batch exits.
/// Batch exit happens even when `f` unwinds: the tick state is restored (and
/// the queue flushed at the outermost level) during unwinding, so a caught
/// contract-violation panic leaves the thread's batching fully operational.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    CURRENT_TICK.with(|tick| {
        let mut slot = tick.borrow_mut();
        match slot.as_mut() {
            Some(state) => state.depth += 1,
            None => {
                *slot = Some(TickState {
                    depth: 1,
                    queued: Vec::new(),
                    seen: HashSet::new(),
                });
            }
        }
    });

    let _guard = BatchGuard;
    f()
}

/// Closes the batch on scope exit, unwinding included.
struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let flushes = CURRENT_TICK.with(|tick| {
            let mut slot = tick.borrow_mut();
            let state = slot.as_mut().expect("tick batch underflow");
            state.depth -= 1;
            if state.depth == 0 {
                let state = slot.take().expect("tick state missing at flush");
                Some(state.queued)
            } else {
                None
            }
        });

        if let Some(flushes) = flushes {
            if !flushes.is_empty() {
                tracing::trace!(count = flushes.len(), "flushing tick queue");
            }
            for flush in flushes {
                flush();
            }
        }
    }
}

/// Defers `flush` to the end of the current tick, at most once per `key`.
///
/// Runs `flush` immediately when no batch is open.
pub fn schedule(key: u64, flush: impl FnOnce() + 'static) {
    let deferred = CURRENT_TICK.with(|tick| {
        let mut slot = tick.borrow_mut();
        match slot.as_mut() {
            Some(state) => {
                if state.seen.insert(key) {
                    state.queued.push(Box::new(flush));
                    None
                } else {
                    // Already scheduled this tick.
                    None
                }
            }
            None => Some(flush),
        }
    });

    if let Some(flush) = deferred {
        flush();
    }
}
