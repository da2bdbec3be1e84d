//! Node Values
//!
//! Every node caches an owned value of some type `T`. Two operations on those
//! values drive the engine:
//!
//! - **Equality** decides whether a recomputation "really" changed anything.
//!   It is the type's own `PartialEq`, which for the usual containers is
//!   structural: vectors compare element by element, maps compare entries
//!   regardless of insertion order, and nested values recurse.
//!
//! - **Snapshotting** turns a value into a `serde_json::Value` for the history
//!   log. The result owns all of its data, so later changes to the live graph
//!   can never reach into a recorded snapshot.
//!
//! Cached values are moved into the node when a compute function returns, so
//! the caller keeps no alias to them and no explicit deep copy is needed.

use serde::Serialize;
use serde_json::Value;

/// Bound required of values stored in a node.
pub trait NodeValue: Clone + PartialEq + Serialize + Send + Sync + 'static {}

impl<T> NodeValue for T where T: Clone + PartialEq + Serialize + Send + Sync + 'static {}

/// Whether replacing `prev` with `next` counts as a change.
pub fn has_changed<T: PartialEq>(prev: Option<&T>, next: Option<&T>) -> bool {
    prev != next
}

/// Serialize a value for a snapshot.
///
/// Values that cannot be represented as JSON (for example maps with
/// non-string keys) are recorded as `null`.
pub fn snapshot_value<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(error = %err, "value is not representable in a snapshot");
            Value::Null
        }
    }
}
