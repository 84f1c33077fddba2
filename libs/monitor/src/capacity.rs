//! Capacity requests and executor availability checks.

use ciwatch_id::{Label, NodeName, TemplateId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::ClusterClient;
use crate::error::{isolate, ClusterError};
use crate::model::ProvisionResponse;

/// Result of asking for more capacity on a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    /// A provisioning call was issued for `template`.
    Requested {
        template: TemplateId,
        response: ProvisionResponse,
    },

    /// The provisioning call was issued but rejected by the cluster.
    Rejected { template: TemplateId, error: String },

    /// No node advertises the label, so there is no template to launch.
    NoTemplateFound,
}

/// Issues provisioning calls for labels short of executors.
pub struct CapacityRequester<'a, C: ClusterClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ClusterClient + ?Sized> CapacityRequester<'a, C> {
    /// Create a requester over `client`.
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Request one more node for `label`.
    ///
    /// The template is derived from the first node advertising the label.
    /// The call is made at most once; failures are reported, not retried.
    /// A label lookup that fails with an item-local error is logged and
    /// reported as [`RequestOutcome::NoTemplateFound`].
    pub async fn request(&self, label: &Label) -> Result<RequestOutcome, ClusterError> {
        let nodes = isolate(self.client.nodes_for_label(label).await, label.as_str())?
            .unwrap_or_default();
        self.request_from(label, &nodes).await
    }

    /// Request one more node for `label` using an already fetched list of
    /// the nodes advertising it.
    pub async fn request_from(
        &self,
        label: &Label,
        advertised: &[NodeName],
    ) -> Result<RequestOutcome, ClusterError> {
        info!(label = %label, "Requesting capacity for label");

        let Some(first) = advertised.first() else {
            info!(label = %label, "No node advertises label, nothing to provision from");
            return Ok(RequestOutcome::NoTemplateFound);
        };

        let template = first.template();
        match self.client.provision(&template).await {
            Ok(response) => {
                info!(
                    label = %label,
                    template = %template,
                    status = response.status,
                    message = %response.message,
                    "Provision requested"
                );
                Ok(RequestOutcome::Requested { template, response })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(label = %label, template = %template, error = %e, "Provision rejected");
                Ok(RequestOutcome::Rejected {
                    template,
                    error: e.to_string(),
                })
            }
        }
    }
}

/// Whether any of `nodes` is known to have at least one executor.
///
/// Nodes whose count is unknown, or whose lookup fails with an item-local
/// error, are skipped rather than treated as having zero executors.
pub async fn has_available_executors<C: ClusterClient + ?Sized>(
    client: &C,
    nodes: &[NodeName],
) -> Result<bool, ClusterError> {
    for node in nodes {
        let Some(count) = isolate(client.node_executor_count(node).await, node.as_str())? else {
            continue;
        };
        debug!(node = %node, executors = %count, "Executor count");
        if count.has_capacity() {
            return Ok(true);
        }
    }
    Ok(false)
}
