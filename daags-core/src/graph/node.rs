//! Dependency Nodes
//!
//! A node is a memoized computation cell. It declares its parents once, at
//! construction, and computes its value from them with a compute function.
//!
//! # Lifecycle
//!
//! Nodes are lazy. A node only computes while it is *mounted*, i.e. while at
//! least one external subscriber (a direct mount) or mounted descendant (an
//! indirect mount) needs it. Mounting walks up through the parents first, so
//! ancestors are live before their descendants compute. When the last mount
//! goes away the cached value is dropped.
//!
//! # Recomputation
//!
//! `refresh` is the single entry point for recomputing a node:
//!
//! 1. An unmounted node only clears its cached value.
//! 2. A node whose parents have not bumped their versions since it last
//!    computed does nothing. Nodes without parents always recompute.
//! 3. A node with a pending ancestor waits (the *pending barrier*) and is
//!    flagged so it refreshes once the ancestor settles.
//! 4. Otherwise the compute function runs. An immediate result is compared
//!    with the cached value; only a real change bumps the version, refreshes
//!    mounted children depth-first and then notifies listeners. A deferred
//!    result marks the node pending, raises the barrier over every
//!    descendant, and is applied when the scheduler settles it. Only the most
//!    recently issued deferred result is ever applied.

use std::any::{type_name, Any};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::computed::Computed;
use super::scheduler::Settlement;
use crate::config::RejectionPolicy;
use crate::error::{BoxError, Error, Result};
use crate::history::{EventKind, NodeSnapshot, Subject};
use crate::reactive::{ListenerId, Listeners, RuntimeState, Turn};
use crate::value::{self, NodeValue};

pub(crate) type ComputeFn<T> = Box<dyn Fn() -> std::result::Result<Computed<T>, BoxError> + Send + Sync>;

pub(crate) type Parents = SmallVec<[NodeRef; 4]>;

/// Whether a node is waiting on its own deferred computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    Pending,
}

/// Passed to mount listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountEvent {
    /// The node went from zero to one mount.
    Mounted,
    /// A mount is about to be released.
    Unmounting,
}

/// Operations the engine performs on nodes regardless of their value type.
pub(crate) trait GraphNode: Send + Sync + 'static {
    fn key(&self) -> &str;
    fn runtime_id(&self) -> u64;
    fn version(&self) -> u64;
    fn status(&self) -> Status;
    fn direct_mounts(&self) -> usize;
    fn indirect_mounts(&self) -> usize;
    fn total_mounts(&self) -> usize;
    fn pending_parent_count(&self) -> usize;
    fn parents(&self) -> Vec<NodeRef>;
    fn children(&self) -> Vec<NodeRef>;
    fn add_child(&self, child: Weak<dyn GraphNode>);

    fn mount_with(&self, direct: bool) -> Result<()>;
    fn unmount_with(&self, direct: bool) -> Result<()>;
    fn refresh(&self) -> Result<()>;

    /// An ancestor started a deferred computation.
    fn parent_pending(&self);
    /// An ancestor's deferred computation settled.
    fn parent_resolved(&self);
    /// Clear and return the deferred flag if the barrier is down.
    fn take_ready_deferred(&self) -> bool;
    /// Refresh every descendant that was held back by the barrier.
    fn flush_deferred(&self) -> Result<()>;
    /// Drop the in-flight deferred computation, if any, releasing the
    /// barrier below. Returns whether there was one.
    fn abandon_pending(&self) -> bool;

    fn snapshot(&self) -> NodeSnapshot;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A type-erased handle to a node.
///
/// Used to declare parents and mutation dependencies, and returned by the
/// runtime's directory. [`NodeRef::downcast`] recovers the typed handle.
#[derive(Clone)]
pub struct NodeRef(pub(crate) Arc<dyn GraphNode>);

impl NodeRef {
    pub fn key(&self) -> &str {
        self.0.key()
    }

    pub fn version(&self) -> u64 {
        self.0.version()
    }

    pub fn status(&self) -> Status {
        self.0.status()
    }

    pub fn direct_mounts(&self) -> usize {
        self.0.direct_mounts()
    }

    pub fn indirect_mounts(&self) -> usize {
        self.0.indirect_mounts()
    }

    pub fn total_mounts(&self) -> usize {
        self.0.total_mounts()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.total_mounts() > 0
    }

    pub fn pending_parent_count(&self) -> usize {
        self.0.pending_parent_count()
    }

    pub fn parents(&self) -> Vec<NodeRef> {
        self.0.parents()
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.0.children()
    }

    pub fn mount(&self) -> Result<()> {
        self.0.mount_with(true)
    }

    pub fn unmount(&self) -> Result<()> {
        self.0.unmount_with(true)
    }

    pub fn refresh(&self) -> Result<()> {
        self.0.refresh()
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        self.0.snapshot()
    }

    /// Recover the typed handle.
    pub fn downcast<T: NodeValue>(&self) -> Result<Node<T>> {
        Arc::clone(&self.0)
            .into_any()
            .downcast::<NodeInner<T>>()
            .map(Node::from_inner)
            .map_err(|_| Error::TypeMismatch {
                key: self.key().to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("key", &self.key())
            .field("version", &self.version())
            .field("status", &self.status())
            .finish()
    }
}

/// Find a path from `from` up through its ancestors to the node named `key`.
pub(crate) fn ancestry_path(from: &NodeRef, key: &str) -> Option<Vec<String>> {
    fn walk(node: &NodeRef, key: &str, visited: &mut HashSet<String>, path: &mut Vec<String>) -> bool {
        if !visited.insert(node.key().to_string()) {
            return false;
        }
        path.push(node.key().to_string());
        if node.key() == key {
            return true;
        }
        for parent in node.parents() {
            if walk(&parent, key, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    let mut path = Vec::new();
    walk(from, key, &mut HashSet::new(), &mut path).then_some(path)
}

/// Mutable state of a node, guarded by a single lock.
struct NodeState<T> {
    value: Option<T>,
    prev_value: Option<T>,
    version: u64,
    /// Parent versions seen at the last computation. `None` = never seen.
    parent_versions: SmallVec<[Option<u64>; 4]>,
    direct_mounts: usize,
    indirect_mounts: usize,
    pending_parent_count: usize,
    /// Handle of the deferred computation whose result will be applied.
    pending: Option<u64>,
    /// Last handle issued.
    issued: u64,
    /// A refresh was skipped because of the pending barrier.
    deferred: bool,
    /// Retries spent on the current rejection streak.
    attempts: u32,
    last_error: Option<String>,
}

impl<T> NodeState<T> {
    fn total_mounts(&self) -> usize {
        self.direct_mounts + self.indirect_mounts
    }

    fn status(&self) -> Status {
        if self.pending.is_some() {
            Status::Pending
        } else {
            Status::Idle
        }
    }

    fn parents_changed(&self, current: &[u64]) -> bool {
        current
            .iter()
            .zip(&self.parent_versions)
            .any(|(now, seen)| seen.map_or(true, |seen| *now > seen))
    }

    fn forget_parents(&mut self) {
        self.parent_versions.iter_mut().for_each(|seen| *seen = None);
    }

    /// Drop the cached value. Returns whether there was one.
    fn clear(&mut self) -> bool {
        self.forget_parents();
        self.prev_value = self.value.take();
        self.prev_value.is_some()
    }
}

pub(crate) struct NodeInner<T: NodeValue> {
    key: String,
    runtime: Arc<RuntimeState>,
    parents: Parents,
    children: Mutex<Vec<Weak<dyn GraphNode>>>,
    compute: ComputeFn<T>,
    state: Mutex<NodeState<T>>,
    change_listeners: Listeners<()>,
    mount_listeners: Listeners<MountEvent>,
    this: Weak<NodeInner<T>>,
}

impl<T: NodeValue> NodeInner<T> {
    pub(crate) fn create(
        runtime: Arc<RuntimeState>,
        key: String,
        parents: Parents,
        compute: ComputeFn<T>,
    ) -> Arc<Self> {
        // Join any barrier already raised above the new node.
        let pending_parent_count = parents
            .iter()
            .map(|parent| parent.pending_parent_count() + usize::from(parent.status() == Status::Pending))
            .sum();

        Arc::new_cyclic(|this| Self {
            state: Mutex::new(NodeState {
                value: None,
                prev_value: None,
                version: 0,
                parent_versions: parents.iter().map(|_| None).collect(),
                direct_mounts: 0,
                indirect_mounts: 0,
                pending_parent_count,
                pending: None,
                issued: 0,
                deferred: false,
                attempts: 0,
                last_error: None,
            }),
            key,
            runtime,
            parents,
            children: Mutex::new(Vec::new()),
            compute,
            change_listeners: Listeners::new(),
            mount_listeners: Listeners::new(),
            this: this.clone(),
        })
    }

    fn record(&self, kind: EventKind) {
        self.runtime.record(kind, Subject::Node(self.key.clone()));
    }

    fn live_children(&self) -> Vec<Arc<dyn GraphNode>> {
        self.children.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Store a freshly computed value and propagate if it changed.
    fn apply(&self, value: T, asynchronous: bool) -> Result<()> {
        let changed = {
            let mut state = self.state.lock();
            let changed = value::has_changed(state.value.as_ref(), Some(&value));
            if changed {
                state.prev_value = state.value.replace(value);
                state.version += 1;
                debug!(node = %self.key, version = state.version, asynchronous, "value changed");
            }
            changed
        };

        if changed || asynchronous {
            self.record(EventKind::Change { asynchronous });
        }
        if !changed {
            return Ok(());
        }

        for child in self.live_children() {
            if child.total_mounts() > 0 {
                child.refresh()?;
            }
        }
        self.change_listeners.notify(&());
        Ok(())
    }

    /// Start tracking a deferred computation.
    fn issue(&self, future: BoxFuture<'static, std::result::Result<T, BoxError>>) {
        let (handle, first) = {
            let mut state = self.state.lock();
            state.issued += 1;
            let first = state.pending.is_none();
            state.pending = Some(state.issued);
            (state.issued, first)
        };

        if first {
            for child in self.live_children() {
                child.parent_pending();
            }
            self.record(EventKind::Get);
        }
        debug!(node = %self.key, handle, "deferred compute issued");

        let limit = self.runtime.config.pending_policy.limit();
        let key = self.key.clone();
        let node = self.this.clone();
        let settle = async move {
            let outcome = match limit {
                Some(after) => match tokio::time::timeout(after, future).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Box::new(Error::PendingTimeout { key, after }) as BoxError),
                },
                None => future.await,
            };

            Box::new(move || match node.upgrade() {
                Some(node) => node.settle(handle, outcome),
                None => Ok(()),
            }) as Settlement
        };
        self.runtime.scheduler.spawn(settle.boxed());
    }

    /// Apply the outcome of the deferred computation identified by `handle`.
    fn settle(&self, handle: u64, outcome: std::result::Result<T, BoxError>) -> Result<()> {
        let _turn = Turn::enter(&self.runtime);

        let mounted = {
            let mut state = self.state.lock();
            if state.pending != Some(handle) {
                debug!(node = %self.key, handle, "discarding stale deferred result");
                return Ok(());
            }
            state.pending = None;
            state.total_mounts() > 0
        };

        for child in self.live_children() {
            child.parent_resolved();
        }

        let applied = match outcome {
            Ok(value) => {
                {
                    let mut state = self.state.lock();
                    state.attempts = 0;
                    state.last_error = None;
                }
                if mounted {
                    self.apply(value, true)
                } else {
                    // Unmounted while in flight: the cache stays empty.
                    self.record(EventKind::Change { asynchronous: true });
                    Ok(())
                }
            }
            Err(source) => self.reject(source),
        };

        let flushed = self.flush_deferred();
        applied.and(flushed)
    }

    fn reject(&self, source: BoxError) -> Result<()> {
        let message = source.to_string();
        let retry = {
            let mut state = self.state.lock();
            match self.runtime.config.rejection_policy {
                RejectionPolicy::Retry { max_attempts }
                    if state.attempts < max_attempts && state.total_mounts() > 0 =>
                {
                    state.attempts += 1;
                    state.forget_parents();
                    true
                }
                _ => {
                    state.attempts = 0;
                    state.last_error = Some(message.clone());
                    false
                }
            }
        };

        self.record(EventKind::Rejected {
            message: message.clone(),
        });

        if retry {
            debug!(node = %self.key, error = %message, "deferred compute rejected, retrying");
            return self.refresh();
        }
        debug!(node = %self.key, error = %message, "deferred compute rejected");
        Err(Error::Rejected {
            key: self.key.clone(),
            source,
        })
    }
}

impl<T: NodeValue> GraphNode for NodeInner<T> {
    fn key(&self) -> &str {
        &self.key
    }

    fn runtime_id(&self) -> u64 {
        self.runtime.id
    }

    fn version(&self) -> u64 {
        self.state.lock().version
    }

    fn status(&self) -> Status {
        self.state.lock().status()
    }

    fn direct_mounts(&self) -> usize {
        self.state.lock().direct_mounts
    }

    fn indirect_mounts(&self) -> usize {
        self.state.lock().indirect_mounts
    }

    fn total_mounts(&self) -> usize {
        self.state.lock().total_mounts()
    }

    fn pending_parent_count(&self) -> usize {
        self.state.lock().pending_parent_count
    }

    fn parents(&self) -> Vec<NodeRef> {
        self.parents.to_vec()
    }

    fn children(&self) -> Vec<NodeRef> {
        self.live_children().into_iter().map(NodeRef).collect()
    }

    fn add_child(&self, child: Weak<dyn GraphNode>) {
        self.children.lock().push(child);
    }

    fn mount_with(&self, direct: bool) -> Result<()> {
        let _turn = Turn::enter(&self.runtime);

        for parent in &self.parents {
            parent.0.mount_with(false)?;
        }

        let activated = {
            let mut state = self.state.lock();
            let activated = state.total_mounts() == 0;
            if direct {
                state.direct_mounts += 1;
            } else {
                state.indirect_mounts += 1;
            }
            activated
        };

        if activated {
            trace!(node = %self.key, direct, "mounted");
            self.record(EventKind::Mount);
            self.mount_listeners.notify(&MountEvent::Mounted);
            self.refresh()?;
        }
        Ok(())
    }

    fn unmount_with(&self, direct: bool) -> Result<()> {
        let _turn = Turn::enter(&self.runtime);

        {
            let state = self.state.lock();
            let held = if direct {
                state.direct_mounts
            } else {
                state.indirect_mounts
            };
            if held == 0 {
                if state.total_mounts() > 0 {
                    warn!(node = %self.key, direct, "ignoring unmount without a matching mount");
                }
                return Ok(());
            }
        }

        self.mount_listeners.notify(&MountEvent::Unmounting);

        for parent in &self.parents {
            parent.0.unmount_with(false)?;
        }

        let deactivated = {
            let mut state = self.state.lock();
            if direct {
                state.direct_mounts -= 1;
            } else {
                state.indirect_mounts -= 1;
            }
            state.total_mounts() == 0
        };

        if deactivated {
            trace!(node = %self.key, "unmounted");
            self.record(EventKind::Unmount);
            self.refresh()?;
        }
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        let _turn = Turn::enter(&self.runtime);

        let inactive = {
            let mut state = self.state.lock();
            (state.total_mounts() == 0).then(|| state.clear())
        };
        if let Some(cleared) = inactive {
            if cleared {
                self.record(EventKind::Change { asynchronous: false });
            }
            return Ok(());
        }

        let current: SmallVec<[u64; 4]> = self.parents.iter().map(NodeRef::version).collect();
        {
            let mut state = self.state.lock();
            if !self.parents.is_empty() && !state.parents_changed(&current) {
                return Ok(());
            }
            if state.pending_parent_count > 0 {
                state.deferred = true;
                trace!(
                    node = %self.key,
                    pending_parents = state.pending_parent_count,
                    "deferred behind pending ancestor"
                );
                return Ok(());
            }
            state.deferred = false;
        }

        let computed = (self.compute)().map_err(|source| Error::Compute {
            key: self.key.clone(),
            source,
        })?;
        self.state.lock().parent_versions = current.iter().copied().map(Some).collect();

        match computed {
            Computed::Immediate(value) => {
                // An immediate result supersedes any deferred one still in flight.
                self.state.lock().attempts = 0;
                if !self.abandon_pending() {
                    return self.apply(value, false);
                }

                debug!(node = %self.key, "immediate result supersedes in-flight compute");
                let applied = self.apply(value, false);
                let flushed = self.flush_deferred();
                applied.and(flushed)
            }
            Computed::Deferred(future) => {
                self.issue(future);
                Ok(())
            }
        }
    }

    fn parent_pending(&self) {
        let count = {
            let mut state = self.state.lock();
            state.pending_parent_count += 1;
            state.pending_parent_count
        };
        trace!(node = %self.key, pending_parents = count, "ancestor pending");
        for child in self.live_children() {
            child.parent_pending();
        }
    }

    fn parent_resolved(&self) {
        {
            let mut state = self.state.lock();
            state.pending_parent_count = state.pending_parent_count.saturating_sub(1);
        }
        for child in self.live_children() {
            child.parent_resolved();
        }
    }

    fn take_ready_deferred(&self) -> bool {
        let mut state = self.state.lock();
        if state.deferred && state.pending_parent_count == 0 {
            state.deferred = false;
            true
        } else {
            false
        }
    }

    fn abandon_pending(&self) -> bool {
        let abandoned = self.state.lock().pending.take().is_some();
        if abandoned {
            for child in self.live_children() {
                child.parent_resolved();
            }
        }
        abandoned
    }

    fn flush_deferred(&self) -> Result<()> {
        // Depth-first, visiting shared descendants once.
        let mut visited = HashSet::new();
        let mut stack = self.live_children();
        stack.reverse();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.key().to_string()) {
                continue;
            }
            if node.take_ready_deferred() {
                node.refresh()?;
            }
            stack.extend(node.children().into_iter().rev().map(|child| child.0));
        }
        Ok(())
    }

    fn snapshot(&self) -> NodeSnapshot {
        let children = self
            .live_children()
            .iter()
            .map(|child| child.key().to_string())
            .collect();
        let state = self.state.lock();

        NodeSnapshot {
            key: self.key.clone(),
            parents: self.parents.iter().map(|p| p.key().to_string()).collect(),
            children,
            value: state.value.as_ref().map(|v| value::snapshot_value(v)),
            version: state.version,
            parent_versions: state.parent_versions.to_vec(),
            direct_mounts: state.direct_mounts,
            indirect_mounts: state.indirect_mounts,
            pending_parent_count: state.pending_parent_count,
            status: state.status(),
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A typed handle to a node holding values of type `T`.
///
/// Handles are cheap to clone and all clones refer to the same node.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let celsius = runtime.derived("celsius", [], || 21.5)?;
/// let fahrenheit = runtime.derived("fahrenheit", [celsius.as_dyn()], {
///     let celsius = celsius.clone();
///     move || celsius.state().unwrap_or_default() * 9.0 / 5.0 + 32.0
/// })?;
///
/// fahrenheit.mount()?;
/// assert_eq!(fahrenheit.state(), Some(70.7));
/// ```
pub struct Node<T: NodeValue> {
    inner: Arc<NodeInner<T>>,
}

impl<T: NodeValue> Node<T> {
    pub(crate) fn from_inner(inner: Arc<NodeInner<T>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<NodeInner<T>> {
        Arc::downgrade(&self.inner)
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The cached value. `None` while unmounted or before the first result.
    pub fn state(&self) -> Option<T> {
        self.inner.state.lock().value.clone()
    }

    /// Read the cached value without cloning it.
    ///
    /// The node is locked while `f` runs; `f` must not call back into it.
    pub fn with_state<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.state.lock().value.as_ref())
    }

    /// The value replaced by the most recent change.
    pub fn previous_state(&self) -> Option<T> {
        self.inner.state.lock().prev_value.clone()
    }

    pub fn version(&self) -> u64 {
        self.inner.version()
    }

    pub fn status(&self) -> Status {
        self.inner.status()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.total_mounts() > 0
    }

    pub fn direct_mounts(&self) -> usize {
        self.inner.direct_mounts()
    }

    pub fn indirect_mounts(&self) -> usize {
        self.inner.indirect_mounts()
    }

    pub fn total_mounts(&self) -> usize {
        self.inner.total_mounts()
    }

    pub fn pending_parent_count(&self) -> usize {
        self.inner.pending_parent_count()
    }

    /// Message of the last rejected deferred computation, cleared by the
    /// next successful one.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.lock().last_error.clone()
    }

    pub fn parents(&self) -> Vec<NodeRef> {
        self.inner.parents()
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.inner.children()
    }

    /// Register a direct subscriber. The first mount activates the node and
    /// its ancestors and computes it.
    pub fn mount(&self) -> Result<()> {
        self.inner.mount_with(true)
    }

    /// Release a direct mount. The last one clears the cached value.
    pub fn unmount(&self) -> Result<()> {
        self.inner.unmount_with(true)
    }

    /// Recompute if anything upstream changed. Nodes without parents always
    /// recompute, which is how external state enters the graph.
    pub fn refresh(&self) -> Result<()> {
        self.inner.refresh()
    }

    /// Call `listener` after every change of the cached value.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.change_listeners.add(move |_: &()| listener())
    }

    pub fn cancel_on_change(&self, id: ListenerId) -> bool {
        self.inner.change_listeners.remove(id)
    }

    /// Call `listener` on activation and before every unmount.
    pub fn on_mount_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(MountEvent) + Send + Sync + 'static,
    {
        self.inner
            .mount_listeners
            .add(move |event: &MountEvent| listener(*event))
    }

    pub fn cancel_on_mount(&self, id: ListenerId) -> bool {
        self.inner.mount_listeners.remove(id)
    }

    /// Type-erased handle, for declaring parents and dependencies.
    pub fn as_dyn(&self) -> NodeRef {
        NodeRef(self.inner.clone() as Arc<dyn GraphNode>)
    }
}

impl<T: NodeValue> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: NodeValue> From<&Node<T>> for NodeRef {
    fn from(node: &Node<T>) -> Self {
        node.as_dyn()
    }
}

impl<T: NodeValue + fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Node")
            .field("key", &self.inner.key)
            .field("value", &state.value)
            .field("version", &state.version)
            .field("status", &state.status())
            .field("mounts", &state.total_mounts())
            .field("listeners", &self.inner.change_listeners.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
