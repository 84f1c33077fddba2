//! Build queue evaluation.

use std::collections::HashSet;
use std::time::Duration;

use ciwatch_id::{JobName, Label};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::capacity::{has_available_executors, CapacityRequester, RequestOutcome};
use crate::classifier::{BlockingClassification, Classifier};
use crate::client::ClusterClient;
use crate::error::{isolate, ClusterError};
use crate::model::QueueItem;
use crate::thresholds::Thresholds;

/// A queued job stuck beyond the wait ceiling with no explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub job: JobName,
    pub waited: Duration,
    pub reason: String,
}

impl Alert {
    /// Wait time in minutes, rounded to two decimals.
    pub fn minutes(&self) -> f64 {
        minutes(self.waited)
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Investigate {}. Enqueued for {:.2} minutes",
            self.job,
            self.minutes()
        )
    }
}

pub(crate) fn minutes(d: Duration) -> f64 {
    (d.as_secs_f64() / 60.0 * 100.0).round() / 100.0
}

/// Informational findings that never fail a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// A buildable item is still queued.
    PossibleBuildProblem { job: JobName },

    /// An item waits for executors on a label no node advertises.
    CapacityShortfall { job: JobName, label: Label },

    /// None of a label's nodes reports a usable executor.
    NoExecutorsForLabel { label: Label },

    /// Capacity was wanted for a label but no template could be derived.
    NoTemplateFound { label: Label },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PossibleBuildProblem { job } => {
                write!(f, "{job}: possible problem building, check capacity")
            }
            Self::CapacityShortfall { job, label } => {
                write!(f, "{job}: waiting for executors on {label}, no node advertises it")
            }
            Self::NoExecutorsForLabel { label } => {
                write!(f, "no node for label {label} has an available executor")
            }
            Self::NoTemplateFound { label } => {
                write!(f, "no template found to provision label {label}")
            }
        }
    }
}

/// Findings from one queue evaluation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueReport {
    /// Items inspected (not ignored).
    pub inspected: usize,

    /// Items skipped by an ignored prefix.
    pub ignored: usize,

    pub alerts: Vec<Alert>,
    pub advisories: Vec<Advisory>,

    /// Provisioning requests issued this pass, at most one per label.
    pub capacity_requests: Vec<(Label, RequestOutcome)>,
}

/// Classifies queued items and raises alerts for stuck ones.
pub struct QueueMonitor<'a, C: ClusterClient + ?Sized> {
    client: &'a C,
    classifier: &'a Classifier,
}

/// Labels already handled during this pass.
#[derive(Default)]
struct PassState {
    requested: HashSet<Label>,
    executor_checked: HashSet<Label>,
}

impl<'a, C: ClusterClient + ?Sized> QueueMonitor<'a, C> {
    /// Create a queue monitor.
    pub fn new(client: &'a C, classifier: &'a Classifier) -> Self {
        Self { client, classifier }
    }

    /// Evaluate a queue snapshot against `thresholds`.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn evaluate(
        &self,
        items: &[QueueItem],
        thresholds: &Thresholds,
    ) -> Result<QueueReport, ClusterError> {
        let mut report = QueueReport::default();
        let mut state = PassState::default();

        if items.is_empty() {
            info!("No queued jobs");
        }

        for item in items {
            if thresholds.is_job_ignored(&item.job) {
                debug!(job = %item.job, "Ignoring job");
                report.ignored += 1;
                continue;
            }
            report.inspected += 1;

            let waited = item.enqueued_for();
            info!(
                job = %item.job,
                minutes = minutes(waited),
                blocked = item.blocked,
                buildable = item.buildable,
                reason = %item.reason,
                "Queued job"
            );

            if item.buildable {
                warn!(job = %item.job, "Possible problem building, check capacity");
                report.advisories.push(Advisory::PossibleBuildProblem {
                    job: item.job.clone(),
                });
            }

            match self.classifier.classify(&item.reason) {
                BlockingClassification::AllowedWait => {
                    debug!(job = %item.job, "Blocking reason is benign");
                }
                BlockingClassification::NeedsCapacity(label) => {
                    self.handle_capacity(item, label, thresholds, &mut state, &mut report)
                        .await?;
                }
                BlockingClassification::Unclassified => {
                    if item.buildable && waited > thresholds.queue_wait_max() {
                        let alert = Alert {
                            job: item.job.clone(),
                            waited,
                            reason: item.reason.clone(),
                        };
                        error!(
                            job = %alert.job,
                            minutes = alert.minutes(),
                            reason = %alert.reason,
                            "Queued job needs investigation"
                        );
                        report.alerts.push(alert);
                    }
                }
            }
        }

        Ok(report)
    }

    /// A label is short of executors: record it and optionally ask for more.
    ///
    /// This state resolves itself once capacity arrives, so it never alerts.
    async fn handle_capacity(
        &self,
        item: &QueueItem,
        label: Label,
        thresholds: &Thresholds,
        state: &mut PassState,
        report: &mut QueueReport,
    ) -> Result<(), ClusterError> {
        let Some(nodes) = isolate(self.client.nodes_for_label(&label).await, label.as_str())? else {
            return Ok(());
        };

        info!(
            job = %item.job,
            label = %label,
            advertised = nodes.len(),
            "Waiting for executor capacity"
        );
        if nodes.is_empty() {
            report.advisories.push(Advisory::CapacityShortfall {
                job: item.job.clone(),
                label: label.clone(),
            });
        }

        if thresholds.check_label_executors
            && !nodes.is_empty()
            && state.executor_checked.insert(label.clone())
            && !has_available_executors(self.client, &nodes).await?
        {
            warn!(label = %label, "No node for label has an available executor");
            report
                .advisories
                .push(Advisory::NoExecutorsForLabel { label: label.clone() });
        }

        if thresholds.auto_provision && state.requested.insert(label.clone()) {
            let outcome = CapacityRequester::new(self.client)
                .request_from(&label, &nodes)
                .await?;
            if outcome == RequestOutcome::NoTemplateFound {
                report
                    .advisories
                    .push(Advisory::NoTemplateFound { label: label.clone() });
            }
            report.capacity_requests.push((label, outcome));
        }

        Ok(())
    }
}
