//! Event History
//!
//! An append-only log of every graph-affecting event: deferred recomputations
//! being issued, value changes, mounts and unmounts, mutation calls, and
//! rejections. Each entry carries a snapshot of the entire node directory so
//! external tooling can replay the graph step by step.
//!
//! # Ticks
//!
//! A single mutation can ripple through dozens of nodes. To group the
//! resulting entries, the log keeps a logical clock. Recording an entry
//! stamps it with the current tick and schedules an increment; the increment
//! is only committed when the engine turn that produced the entry finishes
//! (see `reactive::context`). Entries from one cascade therefore share a
//! tick, and the next cascade gets the next one.
//!
//! The log is unbounded. Consumers that need a window should copy out what
//! they need and call [`History::clear`].

mod entry;
mod snapshot;

pub use entry::{EventKind, HistoryEntry, Subject};
pub use snapshot::{NodeSnapshot, Snapshot};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::reactive::{ListenerId, Listeners};

#[derive(Default)]
struct Log {
    entries: Vec<Arc<HistoryEntry>>,
    tick: u64,
    tick_scheduled: bool,
}

/// The history log of one runtime.
pub struct History {
    log: RwLock<Log>,
    subscribers: Listeners<HistoryEntry>,
}

impl History {
    pub(crate) fn new() -> Self {
        Self {
            log: RwLock::new(Log::default()),
            subscribers: Listeners::new(),
        }
    }

    /// Append an entry stamped with the current tick and notify subscribers.
    pub(crate) fn push(&self, kind: EventKind, subject: Subject, snapshot: Snapshot) {
        let entry = {
            let mut log = self.log.write();
            let entry = Arc::new(HistoryEntry {
                timestamp: now_millis(),
                tick: log.tick,
                kind,
                subject,
                snapshot,
            });
            log.tick_scheduled = true;
            log.entries.push(Arc::clone(&entry));
            entry
        };

        self.subscribers.notify(&entry);
    }

    /// Advance the tick if anything was recorded since the last commit.
    pub(crate) fn commit_tick(&self) {
        let mut log = self.log.write();
        if log.tick_scheduled {
            log.tick += 1;
            log.tick_scheduled = false;
        }
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<Arc<HistoryEntry>> {
        self.log.read().entries.clone()
    }

    pub fn last(&self) -> Option<Arc<HistoryEntry>> {
        self.log.read().entries.last().cloned()
    }

    /// Entries recorded during the given tick.
    pub fn at_tick(&self, tick: u64) -> Vec<Arc<HistoryEntry>> {
        self.log
            .read()
            .entries
            .iter()
            .filter(|entry| entry.tick == tick)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.read().entries.is_empty()
    }

    /// The tick the next entry will receive.
    pub fn tick(&self) -> u64 {
        self.log.read().tick
    }

    /// Call `callback` with every entry appended from now on.
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&HistoryEntry) + Send + Sync + 'static,
    {
        self.subscribers.add(callback)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.subscribers.remove(id)
    }

    /// Drop every entry and reset the clock. Subscribers stay registered.
    pub fn clear(&self) {
        *self.log.write() = Log::default();
    }

    /// Export the log as a JSON array.
    pub fn to_json(&self) -> Result<String> {
        let log = self.log.read();
        let entries: Vec<&HistoryEntry> = log.entries.iter().map(Arc::as_ref).collect();
        serde_json::to_string(&entries).map_err(|e| Error::Export(e.to_string()))
    }

    /// Export the log as MessagePack with named fields.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        let log = self.log.read();
        let entries: Vec<&HistoryEntry> = log.entries.iter().map(Arc::as_ref).collect();
        Ok(rmp_serde::to_vec_named(&entries)?)
    }

    /// Load entries previously exported with [`History::to_json`].
    pub fn from_json(json: &str) -> Result<Vec<HistoryEntry>> {
        serde_json::from_str(json).map_err(|e| Error::Export(e.to_string()))
    }

    pub(crate) fn reset(&self) {
        self.clear();
        self.subscribers.clear();
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
