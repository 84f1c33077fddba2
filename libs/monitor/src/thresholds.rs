//! Per-run configuration for the monitor.
//!
//! A `Thresholds` value is built once by the caller and passed into every
//! evaluation; nothing in the core reads ambient configuration.

use std::time::Duration;

use ciwatch_id::{JobName, NodeName};
use serde::{Deserialize, Serialize};

/// Default queue wait ceiling (10 minutes).
pub const DEFAULT_QUEUE_WAIT_MAX_SECS: u64 = 600;

/// Default number of offline confirmation attempts.
pub const DEFAULT_CONFIRM_ATTEMPTS: u32 = 7;

/// Default first confirmation backoff.
pub const DEFAULT_CONFIRM_INITIAL_BACKOFF_SECS: u64 = 2;

/// Default ceiling on the whole confirmation window (2 + 4 + ... + 128).
pub const DEFAULT_NODE_OFFLINE_MAX_SECS: u64 = 254;

/// Blocking reasons that explain a wait without operator attention.
pub const DEFAULT_ALLOWED_REASONS: &[&str] = &[
    r"^Build #\d[\d,]* is already in progress",
    r"^Upstream project [A-Za-z0-9_\-]+ is already building\.$",
    r"^Blocking job [A-Za-z0-9_\-]+ is running\.$",
];

/// Blocking reasons that name a label short of executors (label in group 1).
pub const DEFAULT_CAPACITY_REASONS: &[&str] =
    &[r"^Waiting for next available executor on [‘'\x22]?([A-Za-z0-9_.\-]+)"];

/// Thresholds and toggles for one monitor pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// A buildable, unexplained item waiting longer than this escalates.
    pub queue_wait_max_secs: u64,

    /// Offline confirmation schedule.
    pub offline_confirmation: ConfirmationPolicy,

    /// Job name prefixes that are never inspected.
    pub ignored_jobs: Vec<String>,

    /// Node names that are never polled or deleted.
    pub ignored_nodes: Vec<String>,

    /// Regular expressions for benign blocking reasons, tried in order.
    pub allowed_reasons: Vec<String>,

    /// Regular expressions for capacity shortfalls; group 1 is the label.
    pub capacity_reasons: Vec<String>,

    /// Check that a short label's nodes have executors at all.
    pub check_label_executors: bool,

    /// Request a new node when a label is short of executors.
    pub auto_provision: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            queue_wait_max_secs: DEFAULT_QUEUE_WAIT_MAX_SECS,
            offline_confirmation: ConfirmationPolicy::default(),
            ignored_jobs: Vec::new(),
            ignored_nodes: Vec::new(),
            allowed_reasons: DEFAULT_ALLOWED_REASONS.iter().map(|s| s.to_string()).collect(),
            capacity_reasons: DEFAULT_CAPACITY_REASONS.iter().map(|s| s.to_string()).collect(),
            check_label_executors: false,
            auto_provision: false,
        }
    }
}

impl Thresholds {
    /// Queue wait ceiling.
    pub fn queue_wait_max(&self) -> Duration {
        Duration::from_secs(self.queue_wait_max_secs)
    }

    /// Whether a job is excluded by an ignored prefix.
    pub fn is_job_ignored(&self, job: &JobName) -> bool {
        self.ignored_jobs
            .iter()
            .any(|prefix| job.as_str().starts_with(prefix.as_str()))
    }

    /// Whether a node is excluded by name.
    pub fn is_node_ignored(&self, node: &NodeName) -> bool {
        self.ignored_nodes.iter().any(|name| name == node.as_str())
    }
}

/// Bounded exponential backoff used to confirm a node is durably offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationPolicy {
    /// Number of sleep-then-check attempts.
    pub attempts: u32,

    /// First sleep; each following sleep doubles.
    pub initial_backoff_secs: u64,

    /// Upper bound on the summed sleeps (the node offline ceiling).
    pub max_window_secs: u64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_CONFIRM_ATTEMPTS,
            initial_backoff_secs: DEFAULT_CONFIRM_INITIAL_BACKOFF_SECS,
            max_window_secs: DEFAULT_NODE_OFFLINE_MAX_SECS,
        }
    }
}

impl ConfirmationPolicy {
    /// Sleep before the given attempt (0-based), given time already slept.
    ///
    /// Doubles from the initial backoff and is clamped so the window never
    /// exceeds `max_window_secs`.
    pub fn backoff(&self, attempt: u32, slept: Duration) -> Duration {
        let doubled = self
            .initial_backoff_secs
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let remaining = Duration::from_secs(self.max_window_secs).saturating_sub(slept);
        Duration::from_secs(doubled).min(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let t = Thresholds::default();
        assert_eq!(t.queue_wait_max(), Duration::from_secs(600));
        assert_eq!(t.offline_confirmation.attempts, 7);
        assert_eq!(t.allowed_reasons.len(), 3);
        assert!(!t.auto_provision);
    }

    #[test]
    fn test_default_schedule_fits_window() {
        let policy = ConfirmationPolicy::default();
        let mut slept = Duration::ZERO;
        let mut schedule = Vec::new();
        for attempt in 0..policy.attempts {
            let d = policy.backoff(attempt, slept);
            slept += d;
            schedule.push(d.as_secs());
        }
        assert_eq!(schedule, vec![2, 4, 8, 16, 32, 64, 128]);
        assert_eq!(slept, Duration::from_secs(DEFAULT_NODE_OFFLINE_MAX_SECS));
    }

    #[test]
    fn test_schedule_clamped_by_window() {
        let policy = ConfirmationPolicy {
            attempts: 7,
            initial_backoff_secs: 2,
            max_window_secs: 10,
        };
        assert_eq!(policy.backoff(0, Duration::ZERO), Duration::from_secs(2));
        assert_eq!(policy.backoff(2, Duration::from_secs(6)), Duration::from_secs(4));
        assert_eq!(policy.backoff(3, Duration::from_secs(10)), Duration::ZERO);
    }

    #[test]
    fn test_ignored_job_is_prefix_match() {
        let t = Thresholds {
            ignored_jobs: vec!["example".into()],
            ..Default::default()
        };
        assert!(t.is_job_ignored(&JobName::parse("example").unwrap()));
        assert!(t.is_job_ignored(&JobName::parse("example-nightly").unwrap()));
        assert!(!t.is_job_ignored(&JobName::parse("build-42").unwrap()));
    }

    #[test]
    fn test_ignored_node_is_exact_match() {
        let t = Thresholds {
            ignored_nodes: vec!["example".into()],
            ..Default::default()
        };
        assert!(t.is_node_ignored(&NodeName::parse("example").unwrap()));
        assert!(!t.is_node_ignored(&NodeName::parse("example-2").unwrap()));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let t: Thresholds = serde_json::from_str(r#"{"queue_wait_max_secs": 1200}"#).unwrap();
        assert_eq!(t.queue_wait_max_secs, 1200);
        assert_eq!(t.offline_confirmation, ConfirmationPolicy::default());
        assert_eq!(t.capacity_reasons.len(), 1);
    }
}
