//! Graph snapshots.
//!
//! A snapshot is a detached copy of every registered node at one instant:
//! structure, counters, and the cached value serialized to JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::Status;

/// Copy of a single node's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub key: String,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    /// Cached value, `None` while the node is inactive.
    pub value: Option<Value>,
    pub version: u64,
    pub parent_versions: Vec<Option<u64>>,
    pub direct_mounts: usize,
    pub indirect_mounts: usize,
    pub pending_parent_count: usize,
    pub status: Status,
}

impl NodeSnapshot {
    pub fn total_mounts(&self) -> usize {
        self.direct_mounts + self.indirect_mounts
    }

    /// Whether the node is pending itself or waiting behind a pending ancestor.
    pub fn is_waiting(&self) -> bool {
        self.status == Status::Pending || self.pending_parent_count > 0
    }
}

/// Copy of the whole node directory, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    nodes: IndexMap<String, NodeSnapshot>,
}

impl Snapshot {
    pub(crate) fn from_nodes(nodes: impl IntoIterator<Item = NodeSnapshot>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|node| (node.key.clone(), node)).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&NodeSnapshot> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeSnapshot> {
        self.nodes.values()
    }

    /// Keys whose node differs between `self` and `other`, including nodes
    /// present in only one of the two.
    pub fn diff<'a>(&'a self, other: &'a Snapshot) -> Vec<&'a str> {
        let mut changed: Vec<&str> = self
            .nodes
            .iter()
            .filter(|(key, node)| other.nodes.get(*key) != Some(*node))
            .map(|(key, _)| key.as_str())
            .collect();

        changed.extend(
            other
                .nodes
                .keys()
                .filter(|key| !self.nodes.contains_key(*key))
                .map(String::as_str),
        );
        changed
    }
}
