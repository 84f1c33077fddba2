//! The cluster capability consumed by the monitor.

use async_trait::async_trait;
use ciwatch_id::{Label, NodeName, TemplateId};

use crate::error::ClusterError;
use crate::model::{ExecutorCount, ProvisionResponse, QueueItem};

/// Read and write access to a CI cluster.
///
/// Implementations own transport, authentication and any retry policy for
/// transient HTTP failures. The monitor never retries a call itself.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List queued jobs with their age, blocked/buildable flags and reason.
    async fn list_queued_jobs(&self) -> Result<Vec<QueueItem>, ClusterError>;

    /// List node names, optionally only those containing `filter`.
    async fn list_nodes(&self, filter: Option<&str>) -> Result<Vec<NodeName>, ClusterError>;

    /// Whether the node is currently offline.
    async fn node_is_offline(&self, node: &NodeName) -> Result<bool, ClusterError>;

    /// Recorded reason the node went offline, if any.
    async fn node_offline_cause(&self, node: &NodeName) -> Result<Option<String>, ClusterError>;

    /// Number of executors configured on the node.
    async fn node_executor_count(&self, node: &NodeName) -> Result<ExecutorCount, ClusterError>;

    /// Opaque monitoring data, used only for diagnostics.
    async fn node_monitor_data(&self, _node: &NodeName) -> Result<serde_json::Value, ClusterError> {
        Ok(serde_json::Value::Null)
    }

    /// Nodes advertising `label`.
    async fn nodes_for_label(&self, label: &Label) -> Result<Vec<NodeName>, ClusterError>;

    /// Ask the cloud to launch a node from `template`.
    async fn provision(&self, template: &TemplateId) -> Result<ProvisionResponse, ClusterError>;

    /// Remove a node from the cluster.
    async fn delete_node(&self, node: &NodeName) -> Result<(), ClusterError>;
}
