//! Listener registries.
//!
//! Nodes keep two registries (value changes and mount-state changes) and the
//! history log keeps one for appended entries. A registration is identified
//! by the [`ListenerId`] returned when it is added, since closures cannot be
//! compared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// An ordered set of callbacks receiving `&A`.
pub(crate) struct Listeners<A: ?Sized> {
    entries: RwLock<Vec<(ListenerId, Callback<A>)>>,
}

impl<A: ?Sized> Listeners<A> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.entries.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Call every listener in insertion order.
    ///
    /// Iterates over a copy of the registry taken before the first call, so
    /// listeners may add or cancel registrations while being notified.
    pub(crate) fn notify(&self, arg: &A) {
        let callbacks: Vec<Callback<A>> = self
            .entries
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(arg);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}
