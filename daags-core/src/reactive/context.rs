//! Scheduling Turns
//!
//! A turn is one outermost call into the engine: a mount, an unmount, a
//! refresh, a mutation call, or the application of a settled deferred
//! computation. Everything such a call triggers (the whole cascade through
//! the graph) happens inside the same turn.
//!
//! The history log uses turns as its logical clock. Every entry recorded
//! during a turn carries the same tick, and the tick advances once the
//! outermost turn finishes, provided something was recorded.
//!
//! # Implementation
//!
//! Each runtime keeps a depth counter. Entering a turn increments it and
//! returns a guard; dropping the guard decrements it, and the guard that
//! brings it back to zero commits the tick. Nested entry points simply join
//! the turn already in progress. The guard also runs when a compute function
//! panics, so the counter cannot leak.

use std::sync::atomic::Ordering;

use super::runtime::RuntimeState;

/// Guard for an engine turn. The turn ends when the guard is dropped.
pub(crate) struct Turn<'a> {
    state: &'a RuntimeState,
}

impl<'a> Turn<'a> {
    pub(crate) fn enter(state: &'a RuntimeState) -> Self {
        state.turn_depth.fetch_add(1, Ordering::SeqCst);
        Self { state }
    }

    /// Whether an engine turn is in progress on this runtime.
    pub(crate) fn is_active(state: &RuntimeState) -> bool {
        state.turn_depth.load(Ordering::SeqCst) > 0
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let previous = self.state.turn_depth.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "turn depth underflow");

        if previous == 1 {
            self.state.history.commit_tick();
        }
    }
}
