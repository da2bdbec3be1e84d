//! Mutations
//!
//! A mutation is a named action with a declared set of node dependencies.
//! Calling it first records a history entry with its arguments, then runs
//! the handler against the dependency handles.
//!
//! The engine does not infer which nodes a mutation affects. Handlers update
//! whatever external state they own and then refresh the nodes that read it:
//!
//! ```rust,ignore
//! let store = Arc::new(Mutex::new(0));
//! let count = runtime.derived("count", [], {
//!     let store = store.clone();
//!     move || *store.lock()
//! })?;
//!
//! let add = runtime.mutation("add", [count.as_dyn()], move |deps, (delta,): (i32,)| {
//!     *store.lock() += delta;
//!     deps.node::<i32>("count")?.refresh()
//! })?;
//!
//! add.call((5,))?;
//! ```
//!
//! The handler's return value is passed through untouched. A handler that
//! returns a future is not awaited.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use super::context::Turn;
use super::runtime::RuntimeState;
use crate::error::{Error, Result};
use crate::graph::{Node, NodeRef};
use crate::history::{EventKind, Subject};
use crate::value::{self, NodeValue};

/// The dependencies of a mutation, keyed by node key.
#[derive(Clone, Default)]
pub struct Deps {
    nodes: IndexMap<String, NodeRef>,
}

impl Deps {
    pub(crate) fn from_nodes(nodes: impl IntoIterator<Item = NodeRef>) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .map(|node| (node.key().to_string(), node))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&NodeRef> {
        self.nodes.get(key)
    }

    /// Typed handle to a declared dependency.
    pub fn node<T: NodeValue>(&self, key: &str) -> Result<Node<T>> {
        self.get(key)
            .ok_or_else(|| Error::UnknownDependency(key.to_string()))?
            .downcast()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRef> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

type Handler<P, R> = Box<dyn Fn(&Deps, P) -> R + Send + Sync>;

struct MutationInner<P, R> {
    key: String,
    deps: Deps,
    handler: Handler<P, R>,
    runtime: Arc<RuntimeState>,
}

/// A named, logged action taking arguments `P` and returning `R`.
///
/// `P` is usually a tuple of the positional arguments; it is serialized into
/// the history entry.
pub struct Mutation<P, R> {
    inner: Arc<MutationInner<P, R>>,
}

impl<P: Serialize, R> Mutation<P, R> {
    pub(crate) fn new(runtime: Arc<RuntimeState>, key: String, deps: Deps, handler: Handler<P, R>) -> Self {
        Self {
            inner: Arc::new(MutationInner {
                key,
                deps,
                handler,
                runtime,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn deps(&self) -> &Deps {
        &self.inner.deps
    }

    /// Record the invocation, then run the handler.
    ///
    /// Everything the handler triggers synchronously shares one tick with the
    /// mutation entry.
    pub fn call(&self, args: P) -> R {
        let _turn = Turn::enter(&self.inner.runtime);

        self.inner.runtime.record(
            EventKind::Mutation {
                args: value::snapshot_value(&args),
            },
            Subject::Mutation(self.inner.key.clone()),
        );

        (self.inner.handler)(&self.inner.deps, args)
    }

    /// An owned closure invoking this mutation.
    pub fn callable(&self) -> impl Fn(P) -> R + Send + Sync + 'static
    where
        P: 'static,
        R: 'static,
    {
        let mutation = self.clone();
        move |args| mutation.call(args)
    }
}

impl<P, R> Clone for Mutation<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, R> fmt::Debug for Mutation<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("key", &self.inner.key)
            .field("deps", &self.inner.deps)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
