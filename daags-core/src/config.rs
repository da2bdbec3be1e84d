//! Runtime Configuration
//!
//! Policies the engine cannot infer on its own: what to do while an ancestor
//! never settles, and what to do when a deferred computation fails.
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{
//!     "pending_policy": { "timeout": { "millis": 500 } },
//!     "rejection_policy": { "retry": { "max_attempts": 2 } }
//! }"#)?;
//! let runtime = Runtime::with_config(config);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How long a node may stay pending before it is treated as rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// Wait indefinitely. Descendants stay behind the barrier until the
    /// ancestor settles, however long that takes.
    #[default]
    Wait,

    /// Reject deferred computations that have not settled after `millis`.
    ///
    /// Timers come from `tokio::time`, so the runtime must be driven from
    /// inside a tokio runtime when this policy is selected.
    Timeout { millis: u64 },
}

impl PendingPolicy {
    /// Build a timeout policy. `after` is rounded up to whole milliseconds,
    /// and never below one.
    pub fn timeout(after: Duration) -> Self {
        let millis = after.as_nanos().div_ceil(1_000_000).max(1);
        PendingPolicy::Timeout {
            millis: u64::try_from(millis).unwrap_or(u64::MAX),
        }
    }

    /// The configured timeout, if any.
    pub fn limit(&self) -> Option<Duration> {
        match self {
            PendingPolicy::Wait => None,
            PendingPolicy::Timeout { millis } => Some(Duration::from_millis((*millis).max(1))),
        }
    }
}

/// What a node does when its deferred computation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Return to idle with the previous value and version untouched.
    #[default]
    KeepPrevious,

    /// Re-issue the computation up to `max_attempts` times, then behave
    /// like `KeepPrevious`.
    Retry { max_attempts: u32 },
}

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub pending_policy: PendingPolicy,
    pub rejection_policy: RejectionPolicy,
    /// Append events to the history log.
    pub record_history: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pending_policy: PendingPolicy::Wait,
            rejection_policy: RejectionPolicy::KeepPrevious,
            record_history: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_pending_policy(mut self, policy: PendingPolicy) -> Self {
        self.pending_policy = policy;
        self
    }

    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    pub fn with_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    fn validate(&self) -> Result<()> {
        if let PendingPolicy::Timeout { millis: 0 } = self.pending_policy {
            return Err(Error::Config("pending timeout must be greater than zero".into()));
        }
        Ok(())
    }
}
