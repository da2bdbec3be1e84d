//! History entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::snapshot::Snapshot;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A deferred recomputation was issued.
    Get,
    /// A cached value changed, or a deferred recomputation settled.
    Change { asynchronous: bool },
    Mount,
    Unmount,
    /// A mutation was invoked with these arguments.
    Mutation { args: Value },
    /// A deferred recomputation failed.
    Rejected { message: String },
}

/// What the event happened to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Node(String),
    Mutation(String),
}

impl Subject {
    pub fn key(&self) -> &str {
        match self {
            Subject::Node(key) | Subject::Mutation(key) => key,
        }
    }
}

/// One immutable record in the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub tick: u64,
    pub kind: EventKind,
    pub subject: Subject,
    pub snapshot: Snapshot,
}

impl HistoryEntry {
    /// Whether this entry is about the node with `key`.
    pub fn is_node(&self, key: &str) -> bool {
        matches!(&self.subject, Subject::Node(k) if k == key)
    }

    pub fn is_change(&self) -> bool {
        matches!(self.kind, EventKind::Change { .. })
    }
}
