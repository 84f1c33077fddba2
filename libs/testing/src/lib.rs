//! Test doubles for ciwatch.
//!
//! - [`FakeCluster`]: a scripted, in-memory [`ClusterClient`] that records
//!   every call so tests can assert what was read, provisioned and deleted.
//! - [`RecordingSleeper`]: a [`Sleeper`] that returns immediately and keeps
//!   the requested durations, so confirmation polls run without real delays.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ciwatch_id::{JobName, Label, NodeName, TemplateId};
use ciwatch_monitor::{
    ClusterClient, ClusterError, ExecutorCount, ProvisionResponse, QueueItem, Sleeper,
};

/// Build a buildable queue item.
pub fn queued(job: &str, reason: &str, age_secs: u64) -> QueueItem {
    QueueItem {
        job: JobName::parse(job).expect("valid job name"),
        age: Some(Duration::from_secs(age_secs)),
        blocked: false,
        buildable: true,
        reason: reason.to_string(),
    }
}

/// Parse a node name.
pub fn node(name: &str) -> NodeName {
    NodeName::parse(name).expect("valid node name")
}

/// Parse a label.
pub fn label(name: &str) -> Label {
    Label::parse(name).expect("valid label")
}

/// Scripted state for one node.
#[derive(Debug, Clone)]
pub struct FakeNode {
    /// Readings returned by successive `node_is_offline` calls.
    readings: VecDeque<bool>,

    /// Reading returned once the script runs out.
    steady: bool,

    cause: Option<String>,
    executors: Result<ExecutorCount, ClusterError>,
    offline_error: Option<ClusterError>,
}

impl FakeNode {
    /// A node that is online on every check.
    pub fn online() -> Self {
        Self {
            readings: VecDeque::new(),
            steady: false,
            cause: None,
            executors: Ok(ExecutorCount::Known(2)),
            offline_error: None,
        }
    }

    /// A node that is offline on every check.
    pub fn offline() -> Self {
        Self {
            steady: true,
            ..Self::online()
        }
    }

    /// Offline for the first `checks` offline checks, online afterwards.
    pub fn offline_for(checks: usize) -> Self {
        Self {
            readings: std::iter::repeat(true).take(checks).collect(),
            steady: false,
            ..Self::online()
        }
    }

    /// Set the recorded offline cause.
    pub fn with_cause(mut self, cause: &str) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Set the executor count.
    pub fn with_executors(mut self, executors: ExecutorCount) -> Self {
        self.executors = Ok(executors);
        self
    }

    /// Make the executor lookup fail.
    pub fn with_executor_error(mut self, error: ClusterError) -> Self {
        self.executors = Err(error);
        self
    }

    /// Make every offline check fail.
    pub fn with_offline_error(mut self, error: ClusterError) -> Self {
        self.offline_error = Some(error);
        self
    }

    fn next_reading(&mut self) -> bool {
        self.readings.pop_front().unwrap_or(self.steady)
    }
}

/// A recorded call against the fake cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListQueuedJobs,
    ListNodes(Option<String>),
    NodeIsOffline(NodeName),
    NodeOfflineCause(NodeName),
    NodeExecutorCount(NodeName),
    NodeMonitorData(NodeName),
    NodesForLabel(Label),
    Provision(TemplateId),
    DeleteNode(NodeName),
}

impl Call {
    fn node(&self) -> Option<&NodeName> {
        match self {
            Self::NodeIsOffline(n)
            | Self::NodeOfflineCause(n)
            | Self::NodeExecutorCount(n)
            | Self::NodeMonitorData(n)
            | Self::DeleteNode(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    queue: Vec<QueueItem>,
    nodes: Vec<(NodeName, FakeNode)>,
    labels: HashMap<Label, Vec<NodeName>>,
    calls: Vec<Call>,
    queue_error: Option<ClusterError>,
    provision_error: Option<ClusterError>,
    delete_errors: HashMap<NodeName, ClusterError>,
    label_errors: HashMap<Label, ClusterError>,
}

/// In-memory cluster driven by a script.
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a queued item.
    pub fn with_job(self, item: QueueItem) -> Self {
        self.lock().queue.push(item);
        self
    }

    /// Add a node.
    pub fn with_node(self, name: &str, fake: FakeNode) -> Self {
        self.lock().nodes.push((node(name), fake));
        self
    }

    /// Declare which nodes advertise a label.
    pub fn with_label(self, name: &str, nodes: &[&str]) -> Self {
        self.lock()
            .labels
            .insert(label(name), nodes.iter().map(|n| node(n)).collect());
        self
    }

    /// Make the queue listing fail.
    pub fn with_queue_error(self, error: ClusterError) -> Self {
        self.lock().queue_error = Some(error);
        self
    }

    /// Make looking up the nodes for label `name` fail.
    pub fn with_label_error(self, name: &str, error: ClusterError) -> Self {
        self.lock().label_errors.insert(label(name), error);
        self
    }

    /// Make provision calls fail.
    pub fn with_provision_error(self, error: ClusterError) -> Self {
        self.lock().provision_error = Some(error);
        self
    }

    /// Make deleting `name` fail.
    pub fn with_delete_error(self, name: &str, error: ClusterError) -> Self {
        self.lock().delete_errors.insert(node(name), error);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Templates passed to `provision`.
    pub fn provisions(&self) -> Vec<TemplateId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Provision(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Nodes passed to `delete_node`.
    pub fn deletions(&self) -> Vec<NodeName> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteNode(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Number of offline checks made for `name`.
    pub fn offline_checks(&self, name: &str) -> usize {
        let name = node(name);
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::NodeIsOffline(n) if *n == name))
            .count()
    }

    /// Whether any per-node call touched `name`.
    pub fn was_queried(&self, name: &str) -> bool {
        let name = node(name);
        self.calls().iter().any(|c| c.node() == Some(&name))
    }

    /// Number of label lookups for `name`.
    pub fn label_lookups(&self, name: &str) -> usize {
        let name = label(name);
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::NodesForLabel(l) if *l == name))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake cluster poisoned")
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }

    fn with_fake<T>(
        &self,
        name: &NodeName,
        f: impl FnOnce(&mut FakeNode) -> Result<T, ClusterError>,
    ) -> Result<T, ClusterError> {
        let mut state = self.lock();
        let fake = state
            .nodes
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, fake)| fake)
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))?;
        f(fake)
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_queued_jobs(&self) -> Result<Vec<QueueItem>, ClusterError> {
        self.record(Call::ListQueuedJobs);
        let state = self.lock();
        match &state.queue_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.queue.clone()),
        }
    }

    async fn list_nodes(&self, filter: Option<&str>) -> Result<Vec<NodeName>, ClusterError> {
        self.record(Call::ListNodes(filter.map(str::to_string)));
        Ok(self
            .lock()
            .nodes
            .iter()
            .map(|(n, _)| n.clone())
            .filter(|n| filter.map_or(true, |f| n.as_str().contains(f)))
            .collect())
    }

    async fn node_is_offline(&self, node: &NodeName) -> Result<bool, ClusterError> {
        self.record(Call::NodeIsOffline(node.clone()));
        self.with_fake(node, |fake| match &fake.offline_error {
            Some(e) => Err(e.clone()),
            None => Ok(fake.next_reading()),
        })
    }

    async fn node_offline_cause(&self, node: &NodeName) -> Result<Option<String>, ClusterError> {
        self.record(Call::NodeOfflineCause(node.clone()));
        self.with_fake(node, |fake| Ok(fake.cause.clone()))
    }

    async fn node_executor_count(&self, node: &NodeName) -> Result<ExecutorCount, ClusterError> {
        self.record(Call::NodeExecutorCount(node.clone()));
        self.with_fake(node, |fake| fake.executors.clone())
    }

    async fn node_monitor_data(&self, node: &NodeName) -> Result<serde_json::Value, ClusterError> {
        self.record(Call::NodeMonitorData(node.clone()));
        self.with_fake(node, |_| Ok(serde_json::json!({ "fake": true })))
    }

    async fn nodes_for_label(&self, label: &Label) -> Result<Vec<NodeName>, ClusterError> {
        self.record(Call::NodesForLabel(label.clone()));
        let state = self.lock();
        if let Some(e) = state.label_errors.get(label) {
            return Err(e.clone());
        }
        Ok(state.labels.get(label).cloned().unwrap_or_default())
    }

    async fn provision(&self, template: &TemplateId) -> Result<ProvisionResponse, ClusterError> {
        self.record(Call::Provision(template.clone()));
        match &self.lock().provision_error {
            Some(e) => Err(e.clone()),
            None => Ok(ProvisionResponse {
                status: 200,
                message: format!("provisioning {template}"),
            }),
        }
    }

    async fn delete_node(&self, node: &NodeName) -> Result<(), ClusterError> {
        self.record(Call::DeleteNode(node.clone()));
        let mut state = self.lock();
        if let Some(e) = state.delete_errors.get(node) {
            return Err(e.clone());
        }
        state.nodes.retain(|(n, _)| n != node);
        Ok(())
    }
}

/// Sleeper that records durations and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeper poisoned").clone()
    }

    /// Sum of requested durations.
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("sleeper poisoned").push(duration);
    }
}
