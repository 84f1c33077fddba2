//! Snapshots of cluster state read during a pass.

use std::time::Duration;

use ciwatch_id::JobName;
use serde::{Deserialize, Serialize};

/// A queued job as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Job name.
    pub job: JobName,

    /// Time spent in the queue, if the cluster reported it.
    #[serde(default)]
    pub age: Option<Duration>,

    /// Whether the item is blocked by another build.
    #[serde(default)]
    pub blocked: bool,

    /// Whether the item could run as soon as an executor frees up.
    #[serde(default)]
    pub buildable: bool,

    /// Free-text reason the item is still waiting. May be empty.
    #[serde(default)]
    pub reason: String,
}

impl QueueItem {
    /// Create a queue item with no age, not blocked, not buildable.
    pub fn new(job: JobName) -> Self {
        Self {
            job,
            age: None,
            blocked: false,
            buildable: false,
            reason: String::new(),
        }
    }

    /// Time enqueued, treating a missing age as just-queued.
    pub fn enqueued_for(&self) -> Duration {
        self.age.unwrap_or_default()
    }
}

/// Executor slots on a node.
///
/// The cluster sometimes returns a value that is not a count at all; that is
/// kept as `Unknown` rather than folded into zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorCount {
    Known(u32),
    Unknown,
}

impl ExecutorCount {
    /// Returns true if the node is known to have at least one executor.
    pub fn has_capacity(&self) -> bool {
        matches!(self, Self::Known(n) if *n > 0)
    }
}

impl std::fmt::Display for ExecutorCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(n) => write!(f, "{n}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Response to a provisioning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionResponse {
    /// Status code returned by the cluster.
    pub status: u16,

    /// Response body, if any.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_age_is_zero() {
        let item = QueueItem::new(JobName::parse("build-42").unwrap());
        assert_eq!(item.enqueued_for(), Duration::ZERO);
    }

    #[test]
    fn test_executor_capacity() {
        assert!(ExecutorCount::Known(2).has_capacity());
        assert!(!ExecutorCount::Known(0).has_capacity());
        assert!(!ExecutorCount::Unknown.has_capacity());
    }
}
