//! Reactive Runtime
//!
//! The runtime is the context every node and mutation belongs to. It owns:
//!
//! - the node directory (`key → node`, in registration order),
//! - the mutation registry,
//! - the history log,
//! - the scheduler holding deferred computations that are still in flight.
//!
//! # Lifetime
//!
//! Nodes hold the runtime strongly and the directory holds nodes weakly, so a
//! node lives as long as some handle (or some descendant) refers to it.
//! [`Runtime::reset`] tears the registries down, which keeps tests isolated
//! when they share [`Runtime::global`].
//!
//! # Thread Safety
//!
//! All shared state sits behind `parking_lot` locks that are never held while
//! user code runs, so handles are `Send + Sync`. The engine still assumes a
//! single driver: cascades are not meant to run concurrently on the same
//! graph.

use std::future::poll_fn;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::task::{Context, Poll};

use futures_util::task::noop_waker_ref;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::warn;

use super::context::Turn;
use super::mutation::{Deps, Mutation};
use crate::config::RuntimeConfig;
use crate::error::{BoxError, Error, Result};
use crate::graph::{ancestry_path, Computed, GraphNode, Node, NodeInner, NodeRef, Parents, Scheduler};
use crate::history::{EventKind, History, Snapshot, Subject};
use crate::value::NodeValue;

/// Shared internals of a runtime.
pub(crate) struct RuntimeState {
    pub(crate) id: u64,
    pub(crate) config: RuntimeConfig,
    directory: RwLock<IndexMap<String, Weak<dyn GraphNode>>>,
    /// Mutation key → declared dependency keys.
    mutations: RwLock<IndexMap<String, Vec<String>>>,
    pub(crate) history: History,
    pub(crate) scheduler: Scheduler,
    pub(crate) turn_depth: AtomicUsize,
}

impl RuntimeState {
    fn new(config: RuntimeConfig) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            config,
            directory: RwLock::new(IndexMap::new()),
            mutations: RwLock::new(IndexMap::new()),
            history: History::new(),
            scheduler: Scheduler::new(),
            turn_depth: AtomicUsize::new(0),
        }
    }

    /// Append a history entry with a snapshot of the whole directory.
    pub(crate) fn record(&self, kind: EventKind, subject: Subject) {
        if !self.config.record_history {
            return;
        }
        let snapshot = self.snapshot();
        self.history.push(kind, subject, snapshot);
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot::from_nodes(self.live_nodes().iter().map(|node| node.snapshot()))
    }

    fn live_nodes(&self) -> Vec<Arc<dyn GraphNode>> {
        self.directory
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn check_membership(&self, nodes: &[NodeRef]) -> Result<()> {
        match nodes.iter().find(|node| node.0.runtime_id() != self.id) {
            Some(foreign) => Err(Error::ForeignNode(foreign.key().to_string())),
            None => Ok(()),
        }
    }

    fn register(&self, node: &Arc<dyn GraphNode>) -> Result<()> {
        let mut directory = self.directory.write();
        let key = node.key();
        if directory.get(key).is_some_and(|existing| existing.strong_count() > 0) {
            return Err(Error::DuplicateKey(key.to_string()));
        }
        directory.insert(key.to_string(), Arc::downgrade(node));
        Ok(())
    }

    fn register_mutation(&self, key: &str, deps: Vec<String>) -> Result<()> {
        let mut mutations = self.mutations.write();
        if mutations.contains_key(key) {
            return Err(Error::DuplicateMutation(key.to_string()));
        }
        mutations.insert(key.to_string(), deps);
        Ok(())
    }
}

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// Handle to a runtime. Clones share the same graph.
#[derive(Clone)]
pub struct Runtime {
    state: Arc<RuntimeState>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            state: Arc::new(RuntimeState::new(config)),
        }
    }

    /// The process-wide runtime, created on first use.
    pub fn global() -> &'static Runtime {
        GLOBAL.get_or_init(Runtime::new)
    }

    pub(crate) fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.state.config
    }

    /// Create a node whose compute function may fail or defer.
    ///
    /// The node is registered under `key` and as a child of each parent.
    /// Fails if a live node already uses `key`, if a parent belongs to
    /// another runtime, or if the key already appears among the ancestors.
    pub fn node<T, F>(
        &self,
        key: impl Into<String>,
        parents: impl IntoIterator<Item = NodeRef>,
        compute: F,
    ) -> Result<Node<T>>
    where
        T: NodeValue,
        F: Fn() -> std::result::Result<Computed<T>, BoxError> + Send + Sync + 'static,
    {
        let key = key.into();
        let parents: Parents = parents.into_iter().collect();

        self.state.check_membership(&parents)?;
        for parent in &parents {
            if let Some(path) = ancestry_path(parent, &key) {
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(key.clone());
                cycle.extend(path);
                return Err(Error::Cycle(cycle));
            }
        }

        let inner = NodeInner::create(Arc::clone(&self.state), key, parents, Box::new(compute));
        let erased: Arc<dyn GraphNode> = inner.clone();
        self.state.register(&erased)?;

        let child = Arc::downgrade(&erased);
        for parent in erased.parents() {
            parent.0.add_child(child.clone());
        }

        Ok(Node::from_inner(inner))
    }

    /// Create a node with an infallible, synchronous compute function.
    pub fn derived<T, F>(
        &self,
        key: impl Into<String>,
        parents: impl IntoIterator<Item = NodeRef>,
        compute: F,
    ) -> Result<Node<T>>
    where
        T: NodeValue,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.node(key, parents, move || Ok(Computed::Immediate(compute())))
    }

    /// Create a mutation: a named, logged action over declared dependencies.
    pub fn mutation<P, R, F>(
        &self,
        key: impl Into<String>,
        deps: impl IntoIterator<Item = NodeRef>,
        handler: F,
    ) -> Result<Mutation<P, R>>
    where
        P: Serialize,
        F: Fn(&Deps, P) -> R + Send + Sync + 'static,
    {
        let key = key.into();
        let nodes: SmallVec<[NodeRef; 4]> = deps.into_iter().collect();
        self.state.check_membership(&nodes)?;

        let deps = Deps::from_nodes(nodes);
        self.state
            .register_mutation(&key, deps.keys().map(str::to_string).collect())?;

        Ok(Mutation::new(Arc::clone(&self.state), key, deps, Box::new(handler)))
    }

    /// Look up a registered node.
    pub fn get(&self, key: &str) -> Option<NodeRef> {
        self.state
            .directory
            .read()
            .get(key)
            .and_then(Weak::upgrade)
            .map(NodeRef)
    }

    /// Every live registered node, in registration order.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.state.live_nodes().into_iter().map(NodeRef).collect()
    }

    /// Keys of every registered mutation, in registration order.
    pub fn mutations(&self) -> Vec<String> {
        self.state.mutations.read().keys().cloned().collect()
    }

    /// Dependency keys declared by a mutation.
    pub fn mutation_deps(&self, key: &str) -> Option<Vec<String>> {
        self.state.mutations.read().get(key).cloned()
    }

    /// Snapshot of the current directory.
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    pub fn history(&self) -> &History {
        &self.state.history
    }

    /// Number of deferred computations that have not settled.
    pub fn in_flight(&self) -> usize {
        self.state.scheduler.in_flight()
    }

    /// Apply every deferred result that is ready right now, without waiting.
    ///
    /// Returns the number of settlements applied, or the first error one of
    /// them produced. Must be called from inside a tokio runtime when a
    /// pending timeout is configured.
    pub fn run_until_stalled(&self) -> Result<usize> {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut applied = 0;
        while let Poll::Ready(Some(settle)) = self.state.scheduler.poll_next(&mut cx) {
            settle()?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Drive deferred computations until none is left in flight.
    ///
    /// Stops at the first settlement error; the remaining computations stay
    /// in flight.
    pub async fn settled(&self) -> Result<()> {
        poll_fn(|cx| loop {
            match self.state.scheduler.poll_next(cx) {
                Poll::Ready(Some(settle)) => {
                    if let Err(err) = settle() {
                        return Poll::Ready(Err(err));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        })
        .await
    }

    /// Forget every node, mutation, history entry and in-flight computation.
    ///
    /// Existing handles keep working but are no longer listed or snapshotted.
    /// Nodes whose deferred computation is dropped return to idle, and
    /// descendants held back by them recompute.
    pub fn reset(&self) {
        let abandoned: Vec<_> = self
            .state
            .live_nodes()
            .into_iter()
            .filter(|node| node.abandon_pending())
            .collect();
        self.state.scheduler.clear();

        for node in &abandoned {
            if let Err(err) = node.flush_deferred() {
                warn!(node = %node.key(), error = %err, "refresh after reset failed");
            }
        }

        self.state.directory.write().clear();
        self.state.mutations.write().clear();
        self.state.scheduler.clear();
        self.state.history.reset();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.state.id)
            .field("nodes", &self.state.directory.read().len())
            .field("mutations", &self.state.mutations.read().len())
            .field("history", &self.state.history.len())
            .field("in_turn", &Turn::is_active(&self.state))
            .finish()
    }
}
