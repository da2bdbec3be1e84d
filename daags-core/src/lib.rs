//! Daags Core
//!
//! This crate provides the runtime for Daags, a lazy dependency-graph state
//! manager. It implements:
//!
//! - Keyed dependency nodes with memoized, possibly asynchronous, compute
//!   functions
//! - Mount reference counting (nodes only compute while someone needs them)
//! - A pending barrier that holds descendants back while an ancestor awaits
//! - Named mutations that are logged before they run
//! - A history log of graph events with full snapshots, grouped into ticks
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: nodes, compute results and the settlement scheduler
//! - `reactive`: the runtime, mutations and watches
//! - `history`: the event log and snapshots
//! - `config`: runtime policies
//! - `value`: equality and snapshotting of node values
//!
//! # Example
//!
//! ```rust,ignore
//! use daags_core::{Computed, Runtime};
//!
//! let runtime = Runtime::new();
//!
//! // A source node reading external state
//! let user_id = runtime.derived("user_id", [], || 7u32)?;
//!
//! // A deferred node depending on it
//! let profile = runtime.node("profile", [user_id.as_dyn()], {
//!     let user_id = user_id.clone();
//!     move || {
//!         let id = user_id.state().unwrap_or_default();
//!         Ok(Computed::deferred(async move { fetch_profile(id).await }))
//!     }
//! })?;
//!
//! let watch = profile.watch(|value| println!("profile: {value:?}"))?;
//! runtime.settled().await?;
//! // Prints "profile: Some(...)" once the fetch resolves.
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod history;
pub mod reactive;
pub mod value;

pub use config::{PendingPolicy, RejectionPolicy, RuntimeConfig};
pub use error::{BoxError, Error, Result};
pub use graph::{Computed, MountEvent, Node, NodeRef, Status};
pub use history::{EventKind, History, HistoryEntry, NodeSnapshot, Snapshot, Subject};
pub use reactive::{Deps, ListenerId, Mutation, Runtime, Watch};
pub use value::NodeValue;
