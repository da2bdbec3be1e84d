//! Reactive Runtime
//!
//! This module holds everything that drives the graph from the outside: the
//! runtime that owns nodes and history, mutations, and watches.
//!
//! # Concepts
//!
//! ## Runtime
//!
//! The runtime is the context nodes are created in. It keeps the key → node
//! directory, the mutation registry, the history log and the deferred
//! computations that are still in flight.
//!
//! ## Mutations
//!
//! A mutation is a named action over declared dependencies. Calling it is
//! logged before its handler runs. Handlers change external state and refresh
//! the source nodes that read it, which is how changes enter the graph.
//!
//! ## Watches
//!
//! A watch is an external subscriber: it mounts a node for as long as it
//! lives and forwards changes to a callback.
//!
//! # Implementation Notes
//!
//! Every entry point opens a *turn* (see `context`). History entries recorded
//! while a turn is open share one tick, so a cascade shows up as a single
//! logical step no matter how many nodes it touched.

mod context;
mod mutation;
mod runtime;
mod subscriber;
mod watch;

pub use mutation::{Deps, Mutation};
pub use runtime::Runtime;
pub use subscriber::ListenerId;
pub use watch::Watch;

pub(crate) use context::Turn;
pub(crate) use runtime::RuntimeState;
pub(crate) use subscriber::Listeners;
