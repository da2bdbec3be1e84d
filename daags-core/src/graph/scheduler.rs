//! Settlement Scheduler
//!
//! The scheduler owns every deferred computation that is still in flight.
//! Each one is wrapped into a future that resolves to a *settlement*: a
//! closure that applies the outcome to its node (version bump, propagation,
//! barrier release). Settlements are returned to the caller and run outside
//! the scheduler's locks, so applying one may issue new deferred work without
//! deadlocking.
//!
//! # Driving
//!
//! Nothing runs in the background. The runtime drives the scheduler either
//! with a no-op waker (`run_until_stalled`, which applies whatever is ready
//! right now) or from an async context (`settled`, which keeps going until
//! nothing is left in flight). Either way every settlement is applied on the
//! caller's thread, one at a time, which gives the single-threaded ordering
//! the engine relies on.

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use parking_lot::Mutex;

use crate::error::Result;

/// Applies the outcome of one deferred computation.
pub(crate) type Settlement = Box<dyn FnOnce() -> Result<()> + Send>;

/// Holds deferred computations until they settle.
pub(crate) struct Scheduler {
    /// Futures being polled.
    in_flight: Mutex<FuturesUnordered<BoxFuture<'static, Settlement>>>,

    /// Futures spawned since the last poll. Kept apart from `in_flight` so
    /// spawning never contends with a poll in progress.
    spawned: Mutex<Vec<BoxFuture<'static, Settlement>>>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            in_flight: Mutex::new(FuturesUnordered::new()),
            spawned: Mutex::new(Vec::new()),
        }
    }

    /// Hand a deferred computation to the scheduler.
    pub(crate) fn spawn(&self, future: BoxFuture<'static, Settlement>) {
        self.spawned.lock().push(future);
    }

    /// Number of computations that have not settled yet.
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.lock().len() + self.spawned.lock().len()
    }

    /// Poll for the next settlement.
    ///
    /// `Ready(None)` means nothing is left in flight.
    pub(crate) fn poll_next(&self, cx: &mut Context<'_>) -> Poll<Option<Settlement>> {
        let mut in_flight = self.in_flight.lock();
        in_flight.extend(self.spawned.lock().drain(..));
        in_flight.poll_next_unpin(cx)
    }

    /// Drop every in-flight computation without settling it.
    pub(crate) fn clear(&self) {
        self.spawned.lock().clear();
        *self.in_flight.lock() = FuturesUnordered::new();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
