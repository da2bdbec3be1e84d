//! Watches: scoped external subscriptions.
//!
//! A [`Watch`] keeps a node mounted and forwards every change of its value to
//! a callback. Dropping the watch releases both.

use std::fmt;

use tracing::warn;

use super::subscriber::ListenerId;
use crate::error::Result;
use crate::graph::Node;
use crate::value::NodeValue;

/// Mount guard plus change subscription for one node.
#[must_use = "dropping a Watch unmounts the node immediately"]
pub struct Watch<T: NodeValue> {
    node: Node<T>,
    listener: ListenerId,
}

impl<T: NodeValue> Node<T> {
    /// Mount this node and call `f` with the new value after every change.
    ///
    /// The initial computation counts as a change when it produces a value,
    /// so `f` sees it unless the node was already mounted.
    pub fn watch<F>(&self, f: F) -> Result<Watch<T>>
    where
        F: Fn(Option<T>) + Send + Sync + 'static,
    {
        let node = self.downgrade();
        let listener = self.on_change(move || {
            if let Some(inner) = node.upgrade() {
                f(Node::from_inner(inner).state());
            }
        });

        let held = self.direct_mounts();
        if let Err(err) = self.mount() {
            self.cancel_on_change(listener);
            if self.direct_mounts() > held {
                self.unmount()?;
            }
            return Err(err);
        }

        Ok(Watch {
            node: self.clone(),
            listener,
        })
    }
}

impl<T: NodeValue> Watch<T> {
    pub fn node(&self) -> &Node<T> {
        &self.node
    }

    pub fn state(&self) -> Option<T> {
        self.node.state()
    }
}

impl<T: NodeValue> Drop for Watch<T> {
    fn drop(&mut self) {
        self.node.cancel_on_change(self.listener);
        if let Err(err) = self.node.unmount() {
            warn!(node = %self.node.key(), error = %err, "unmount failed while dropping watch");
        }
    }
}

impl<T: NodeValue + fmt::Debug> fmt::Debug for Watch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("node", &self.node)
            .field("listener", &self.listener)
            .finish()
    }
}
