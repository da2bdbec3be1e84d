//! Dependency Graph
//!
//! The graph is a DAG of keyed nodes. Each node declares its parents when it
//! is created, so edges never change afterwards:
//!
//! - parents are held strongly, so a node keeps its ancestors alive,
//! - children are held weakly, so dropping a leaf frees it.
//!
//! Changes flow downward. When a node's value changes, its mounted children
//! refresh depth-first and compare their parents' versions against the ones
//! they last computed with. Mounts flow upward: mounting a node mounts its
//! ancestors first.
//!
//! # Deferred Computation
//!
//! A compute function may return a future instead of a value
//! ([`Computed::Deferred`]). While it is in flight every descendant sits
//! behind the *pending barrier* and will not recompute. The scheduler holds
//! these futures until the runtime drives them, and only the latest one
//! issued for a node may settle it.

mod computed;
mod node;
mod scheduler;

pub use computed::Computed;
pub use node::{MountEvent, Node, NodeRef, Status};

pub(crate) use node::{ancestry_path, GraphNode, NodeInner, Parents};
pub(crate) use scheduler::Scheduler;
