//! Decision core for watching a CI cluster.
//!
//! One pass of the monitor reads the build queue and the worker fleet from a
//! [`ClusterClient`] and classifies what it sees into actions:
//!
//! - **Escalate**: a buildable job has waited past the ceiling and nothing
//!   explains why.
//! - **Request capacity**: a job waits for executors on a label; optionally
//!   launch one more node from that label's template.
//! - **Reclaim**: a node stays offline through a bounded backoff poll and no
//!   cause is recorded; delete it.
//!
//! # Invariants
//!
//! - Only buildable items escalate
//! - Only nodes offline through the whole confirmation window, with no
//!   recorded cause, are deleted
//! - Provision and delete calls are made at most once per decision per pass
//! - Per-item cluster errors never abort the pass; fatal ones always do

pub mod capacity;
pub mod classifier;
pub mod client;
pub mod error;
pub mod model;
pub mod queue;
pub mod reclaim;
pub mod run;
pub mod sleeper;
pub mod thresholds;

pub use capacity::{has_available_executors, CapacityRequester, RequestOutcome};
pub use classifier::{BlockingClassification, Classifier, ReasonMatcher};
pub use client::ClusterClient;
pub use error::{ClusterError, MonitorError};
pub use model::{ExecutorCount, ProvisionResponse, QueueItem};
pub use queue::{Advisory, Alert, QueueMonitor, QueueReport};
pub use reclaim::{ConfirmationState, NodeReclaimer, OfflineConfirmation};
pub use run::{run_once, FatalCondition, RunResult};
pub use sleeper::{Sleeper, TokioSleeper};
pub use thresholds::{ConfirmationPolicy, Thresholds};
