//! Error types for daags-core.

use std::time::Duration;

use thiserror::Error;

/// Result type for daags-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error produced by a compute function or a deferred computation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in daags-core.
#[derive(Debug, Error)]
pub enum Error {
    /// A live node is already registered under this key.
    #[error("node key already registered: {0}")]
    DuplicateKey(String),

    /// A mutation is already registered under this key.
    #[error("mutation key already registered: {0}")]
    DuplicateMutation(String),

    /// Registering the node would close a cycle. Carries the offending path.
    #[error("cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// A parent node was created by a different runtime.
    #[error("node {0} belongs to a different runtime")]
    ForeignNode(String),

    /// A synchronous compute function failed.
    #[error("compute failed for node {key}: {source}")]
    Compute {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A deferred computation was rejected and the rejection policy gave up.
    #[error("deferred compute for node {key} was rejected: {source}")]
    Rejected {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A deferred computation did not settle within the configured timeout.
    #[error("deferred compute for node {key} did not settle within {after:?}")]
    PendingTimeout { key: String, after: Duration },

    /// A mutation handler asked for a dependency it did not declare.
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    /// A node was downcast to the wrong value type.
    #[error("node {key} does not hold values of type {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Invalid runtime configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// History could not be exported or loaded.
    #[error("history export failed: {0}")]
    Export(String),
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Error::Export(err.to_string())
    }
}
