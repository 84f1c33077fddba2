//! One monitor pass.

use ciwatch_id::{JobName, Label, NodeName};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::capacity::RequestOutcome;
use crate::classifier::Classifier;
use crate::client::ClusterClient;
use crate::error::MonitorError;
use crate::queue::{Advisory, Alert, QueueMonitor};
use crate::reclaim::NodeReclaimer;
use crate::sleeper::Sleeper;
use crate::thresholds::Thresholds;

/// Aggregated result of one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub alerts: Vec<Alert>,
    pub advisories: Vec<Advisory>,
    pub capacity_requests: Vec<(Label, RequestOutcome)>,

    /// Nodes deleted this pass.
    pub deleted_nodes: Vec<NodeName>,

    /// Nodes marked for deletion whose delete call failed.
    pub failed_deletions: Vec<(NodeName, String)>,
}

/// A condition that makes the run fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FatalCondition {
    #[error("Investigate {job}. Enqueued for {minutes:.2} minutes")]
    StuckJob { job: JobName, minutes: f64 },

    #[error("{count} queued jobs need investigation: {}", join(jobs))]
    StuckJobs { count: usize, jobs: Vec<JobName> },

    #[error("{count} offline node(s) deleted: {}", join(nodes))]
    NodesDeleted { count: usize, nodes: Vec<NodeName> },
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RunResult {
    /// Whether the run must end with a failure signal.
    pub fn has_fatal(&self) -> bool {
        !self.alerts.is_empty() || !self.deleted_nodes.is_empty()
    }

    /// Conditions to surface to the operator, in reporting order.
    pub fn fatal_conditions(&self) -> Vec<FatalCondition> {
        let mut conditions = Vec::new();

        match self.alerts.as_slice() {
            [] => {}
            [alert] => conditions.push(FatalCondition::StuckJob {
                job: alert.job.clone(),
                minutes: alert.minutes(),
            }),
            alerts => conditions.push(FatalCondition::StuckJobs {
                count: alerts.len(),
                jobs: alerts.iter().map(|a| a.job.clone()).collect(),
            }),
        }

        if !self.deleted_nodes.is_empty() {
            conditions.push(FatalCondition::NodesDeleted {
                count: self.deleted_nodes.len(),
                nodes: self.deleted_nodes.clone(),
            });
        }

        conditions
    }
}

/// Run one pass: evaluate the queue, then reclaim offline nodes.
///
/// Every read goes to the cluster; nothing is cached between passes. Fatal
/// cluster errors abort the pass, item-local ones are logged and skipped.
#[instrument(skip_all)]
pub async fn run_once<C, S>(
    thresholds: &Thresholds,
    client: &C,
    sleeper: &S,
) -> Result<RunResult, MonitorError>
where
    C: ClusterClient + ?Sized,
    S: Sleeper + ?Sized,
{
    let classifier = Classifier::from_thresholds(thresholds)?;
    let mut result = RunResult::default();

    let items = client.list_queued_jobs().await?;
    let queue = QueueMonitor::new(client, &classifier)
        .evaluate(&items, thresholds)
        .await?;
    info!(
        inspected = queue.inspected,
        ignored = queue.ignored,
        alerts = queue.alerts.len(),
        advisories = queue.advisories.len(),
        "Queue evaluated"
    );
    result.alerts = queue.alerts;
    result.advisories = queue.advisories;
    result.capacity_requests = queue.capacity_requests;

    let nodes = client.list_nodes(None).await?;
    let deletable = NodeReclaimer::new(client, sleeper)
        .evaluate(&nodes, thresholds)
        .await?;

    for node in deletable {
        match client.delete_node(&node).await {
            Ok(()) => {
                warn!(node = %node, "Deleted offline node");
                result.deleted_nodes.push(node);
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                error!(node = %node, error = %e, "Failed to delete offline node");
                result.failed_deletions.push((node, e.to_string()));
            }
        }
    }
    if !result.deleted_nodes.is_empty() {
        warn!(count = result.deleted_nodes.len(), "Offline node(s) deleted");
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn alert(job: &str, secs: u64) -> Alert {
        Alert {
            job: JobName::parse(job).unwrap(),
            waited: Duration::from_secs(secs),
            reason: String::new(),
        }
    }

    #[test]
    fn test_empty_result_not_fatal() {
        let result = RunResult::default();
        assert!(!result.has_fatal());
        assert!(result.fatal_conditions().is_empty());
    }

    #[test]
    fn test_single_stuck_job() {
        let result = RunResult {
            alerts: vec![alert("deploy-9", 1300)],
            ..Default::default()
        };
        assert!(result.has_fatal());
        let conditions = result.fatal_conditions();
        assert_eq!(conditions.len(), 1);
        assert_eq!(
            conditions[0].to_string(),
            "Investigate deploy-9. Enqueued for 21.67 minutes"
        );
    }

    #[test]
    fn test_multiple_stuck_jobs() {
        let result = RunResult {
            alerts: vec![alert("deploy-9", 1300), alert("deploy-10", 900)],
            ..Default::default()
        };
        assert_eq!(
            result.fatal_conditions()[0].to_string(),
            "2 queued jobs need investigation: deploy-9, deploy-10"
        );
    }

    #[test]
    fn test_deleted_nodes_are_fatal() {
        let result = RunResult {
            deleted_nodes: vec![NodeName::parse("slave-3").unwrap()],
            ..Default::default()
        };
        assert!(result.has_fatal());
        assert_eq!(
            result.fatal_conditions()[0].to_string(),
            "1 offline node(s) deleted: slave-3"
        );
    }

    #[test]
    fn test_failed_deletion_alone_not_fatal() {
        let result = RunResult {
            failed_deletions: vec![(NodeName::parse("slave-3").unwrap(), "gone".into())],
            ..Default::default()
        };
        assert!(!result.has_fatal());
    }
}
