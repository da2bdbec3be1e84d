//! Compute Results
//!
//! A compute function either produces its value right away or hands back a
//! future that will produce it later. The two cases take different paths
//! through the engine: an immediate value is applied within the current
//! turn, while a deferred one puts the node (and the barrier below it) into
//! the pending state until the scheduler settles it.

use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, TryFutureExt};

use crate::error::BoxError;

/// The result of invoking a node's compute function.
pub enum Computed<T> {
    /// The value is available now.
    Immediate(T),

    /// The value will be produced by this future.
    Deferred(BoxFuture<'static, Result<T, BoxError>>),
}

impl<T: Send + 'static> Computed<T> {
    /// Wrap a future producing the value.
    pub fn deferred<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Computed::Deferred(future.map_err(<E as Into<BoxError>>::into).boxed())
    }
}

impl<T> Computed<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Computed::Deferred(_))
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computed::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Computed::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}
