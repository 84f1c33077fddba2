//! HTTP client for a Jenkins-style CI server.
//!
//! Implements [`ClusterClient`] over the server's JSON API. Transport and
//! status errors are mapped onto [`ClusterError`] so the monitor can tell
//! fatal failures (unreachable, unauthorized) from item-local ones.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ciwatch_id::{JobName, Label, NodeName, TemplateId};
use ciwatch_monitor::{ClusterClient, ClusterError, ExecutorCount, ProvisionResponse, QueueItem};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Credentials, ServerConfig};

/// Path segment the server uses for its built-in node.
const BUILT_IN_NODE: &str = "(built-in)";

/// API client for the CI server.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    client: reqwest::Client,
    base_url: Url,
    cloud: String,
    credentials: Option<Credentials>,
}

impl JenkinsClient {
    /// Create a new client from server config and credentials.
    pub fn new(server: &ServerConfig, credentials: Option<&Credentials>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(server.url.trim_end_matches('/'))
            .with_context(|| format!("Invalid server URL {:?}", server.url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Server URL {:?} cannot be used as a base URL", server.url);
        }

        Ok(Self {
            client,
            base_url,
            cloud: server.cloud.clone(),
            credentials: credentials.cloned(),
        })
    }

    /// Build a URL from path segments, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn node_segment(node: &NodeName) -> &str {
        if node.is_built_in() {
            BUILT_IN_NODE
        } else {
            node.as_str()
        }
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.token)),
            None => request,
        }
    }

    /// Send a request and map transport and status failures.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, ClusterError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(what, status = status.as_u16(), "Cluster response");

        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClusterError::Unauthorized {
                status: status.as_u16(),
            }),
            StatusCode::NOT_FOUND => Err(ClusterError::NotFound(what.to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ClusterError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        what: &str,
    ) -> Result<T, ClusterError> {
        let url = self.url(segments);
        let response = self.send(self.request(Method::GET, url), what).await?;
        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body).map_err(|e| ClusterError::unexpected(what, e.to_string()))
    }

    async fn computer(&self, node: &NodeName) -> Result<ComputerInfo, ClusterError> {
        self.get_json(
            &["computer", Self::node_segment(node), "api", "json"],
            node.as_str(),
        )
        .await
    }
}

/// Map a reqwest transport error.
fn transport_error(e: reqwest::Error) -> ClusterError {
    if e.is_decode() || e.is_body() {
        ClusterError::unexpected("response body", e.to_string())
    } else {
        ClusterError::Unreachable(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    #[serde(default)]
    items: Vec<QueueEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueEntry {
    task: QueueTask,
    #[serde(default)]
    in_queue_since: Option<i64>,
    #[serde(default)]
    blocked: bool,
    #[serde(default)]
    buildable: bool,
    #[serde(default)]
    why: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueTask {
    name: String,
}

/// Convert a queue listing into queue items, ageing them against `now_ms`.
///
/// Entries whose job name is unusable are logged and skipped.
fn queue_items(response: QueueResponse, now_ms: i64) -> Vec<QueueItem> {
    response
        .items
        .into_iter()
        .filter_map(|entry| {
            let job = match JobName::parse(&entry.task.name) {
                Ok(job) => job,
                Err(e) => {
                    warn!(name = ?entry.task.name, error = %e, "Skipping queue item");
                    return None;
                }
            };
            let age = entry.in_queue_since.map(|since| {
                let millis = u64::try_from(now_ms.saturating_sub(since)).unwrap_or(0);
                Duration::from_secs(millis / 1000)
            });
            Some(QueueItem {
                job,
                age,
                blocked: entry.blocked,
                buildable: entry.buildable,
                reason: entry.why.unwrap_or_default(),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ComputerList {
    #[serde(default)]
    computer: Vec<ComputerSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputerSummary {
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputerInfo {
    #[serde(default)]
    offline: bool,
    #[serde(default)]
    offline_cause: serde_json::Value,
    #[serde(default)]
    offline_cause_reason: Option<String>,
    #[serde(default)]
    num_executors: serde_json::Value,
    #[serde(default)]
    monitor_data: serde_json::Value,
}

impl ComputerInfo {
    /// The recorded offline cause, preferring the human-readable reason.
    fn cause(&self) -> Option<String> {
        if self.offline_cause.is_null() {
            return None;
        }
        if let Some(reason) = self.offline_cause_reason.as_deref().filter(|r| !r.trim().is_empty()) {
            return Some(reason.to_string());
        }
        let class = self.offline_cause.get("_class").and_then(|c| c.as_str());
        Some(match class {
            Some(class) => class.to_string(),
            None => self.offline_cause.to_string(),
        })
    }

    /// Executor count; anything but a non-negative integer is unknown.
    fn executors(&self) -> ExecutorCount {
        self.num_executors
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map_or(ExecutorCount::Unknown, ExecutorCount::Known)
    }
}

#[derive(Debug, Deserialize)]
struct LabelInfo {
    #[serde(default)]
    nodes: Option<Vec<LabelNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelNode {
    #[serde(default)]
    node_name: String,
}

#[async_trait]
impl ClusterClient for JenkinsClient {
    async fn list_queued_jobs(&self) -> Result<Vec<QueueItem>, ClusterError> {
        let response: QueueResponse = self.get_json(&["queue", "api", "json"], "queue").await?;
        Ok(queue_items(response, chrono::Utc::now().timestamp_millis()))
    }

    async fn list_nodes(&self, filter: Option<&str>) -> Result<Vec<NodeName>, ClusterError> {
        let list: ComputerList = self
            .get_json(&["computer", "api", "json"], "computer list")
            .await?;
        Ok(list
            .computer
            .into_iter()
            .filter(|c| filter.map_or(true, |f| c.display_name.contains(f)))
            .filter_map(|c| NodeName::parse(&c.display_name).ok())
            .collect())
    }

    async fn node_is_offline(&self, node: &NodeName) -> Result<bool, ClusterError> {
        Ok(self.computer(node).await?.offline)
    }

    async fn node_offline_cause(&self, node: &NodeName) -> Result<Option<String>, ClusterError> {
        Ok(self.computer(node).await?.cause())
    }

    async fn node_executor_count(&self, node: &NodeName) -> Result<ExecutorCount, ClusterError> {
        Ok(self.computer(node).await?.executors())
    }

    async fn node_monitor_data(&self, node: &NodeName) -> Result<serde_json::Value, ClusterError> {
        Ok(self.computer(node).await?.monitor_data)
    }

    async fn nodes_for_label(&self, label: &Label) -> Result<Vec<NodeName>, ClusterError> {
        let info: LabelInfo = match self
            .get_json(&["label", label.as_str(), "api", "json"], label.as_str())
            .await
        {
            Ok(info) => info,
            Err(ClusterError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(info
            .nodes
            .unwrap_or_default()
            .into_iter()
            .map(|n| {
                if n.node_name.is_empty() {
                    BUILT_IN_NODE.to_string()
                } else {
                    n.node_name
                }
            })
            .filter_map(|name| NodeName::parse(&name).ok())
            .collect())
    }

    async fn provision(&self, template: &TemplateId) -> Result<ProvisionResponse, ClusterError> {
        let url = self.url(&["cloud", self.cloud.as_str(), "provision"]);
        let request = self
            .request(Method::POST, url)
            .form(&[("template", template.as_str())]);
        let response = self.send(request, "provision").await?;
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Ok(ProvisionResponse {
            status,
            message: message.trim().to_string(),
        })
    }

    async fn delete_node(&self, node: &NodeName) -> Result<(), ClusterError> {
        let url = self.url(&["computer", Self::node_segment(node), "doDelete"]);
        self.send(self.request(Method::POST, url), node.as_str())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> JenkinsClient {
        let server = ServerConfig {
            url: url.to_string(),
            ..Default::default()
        };
        JenkinsClient::new(&server, None).unwrap()
    }

    #[test]
    fn test_url_encodes_node_names() {
        let client = client("https://ci.example.com/jenkins/");
        let url = client.url(&["computer", "linux-builder (i-01)", "api", "json"]);
        assert_eq!(
            url.as_str(),
            "https://ci.example.com/jenkins/computer/linux-builder%20(i-01)/api/json"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let server = ServerConfig {
            url: "not a url".into(),
            ..Default::default()
        };
        assert!(JenkinsClient::new(&server, None).is_err());
    }

    #[test]
    fn test_queue_items_age() {
        let response: QueueResponse = serde_json::from_value(serde_json::json!({
            "items": [
                {"task": {"name": "deploy-9"}, "inQueueSince": 1_000, "buildable": true, "why": "some custom hold"},
                {"task": {"name": "build-42"}, "blocked": true}
            ]
        }))
        .unwrap();

        let items = queue_items(response, 1_301_000);

        assert_eq!(items[0].age, Some(Duration::from_secs(1300)));
        assert!(items[0].buildable);
        assert_eq!(items[0].reason, "some custom hold");
        assert_eq!(items[1].age, None);
        assert!(items[1].blocked);
        assert_eq!(items[1].reason, "");
    }

    #[test]
    fn test_future_enqueue_time_is_zero_age() {
        let response: QueueResponse = serde_json::from_value(serde_json::json!({
            "items": [{"task": {"name": "deploy-9"}, "inQueueSince": 5_000}]
        }))
        .unwrap();

        let items = queue_items(response, 1_000);

        assert_eq!(items[0].age, Some(Duration::ZERO));
    }

    #[test]
    fn test_unusable_job_name_skips_only_that_entry() {
        let response: QueueResponse = serde_json::from_value(serde_json::json!({
            "items": [
                {"task": {"name": ""}, "inQueueSince": 1_000, "buildable": true},
                {"task": {"name": "deploy-9"}, "inQueueSince": 1_000, "buildable": true}
            ]
        }))
        .unwrap();

        let items = queue_items(response, 1_301_000);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].job.as_str(), "deploy-9");
    }

    #[test]
    fn test_executor_count_shapes() {
        let info = |v: serde_json::Value| -> ComputerInfo {
            serde_json::from_value(serde_json::json!({ "numExecutors": v })).unwrap()
        };
        assert_eq!(info(serde_json::json!(4)).executors(), ExecutorCount::Known(4));
        assert_eq!(info(serde_json::json!("4")).executors(), ExecutorCount::Unknown);
        assert_eq!(info(serde_json::json!(null)).executors(), ExecutorCount::Unknown);
        assert_eq!(info(serde_json::json!(-1)).executors(), ExecutorCount::Unknown);
    }

    #[test]
    fn test_offline_cause() {
        let info: ComputerInfo = serde_json::from_value(serde_json::json!({
            "offline": true,
            "offlineCause": {"_class": "hudson.slaves.OfflineCause$ChannelTermination"},
            "offlineCauseReason": "Connection was broken"
        }))
        .unwrap();
        assert_eq!(info.cause().as_deref(), Some("Connection was broken"));

        let info: ComputerInfo = serde_json::from_value(serde_json::json!({
            "offline": true,
            "offlineCause": {"_class": "hudson.slaves.OfflineCause$LaunchFailed"},
            "offlineCauseReason": ""
        }))
        .unwrap();
        assert_eq!(
            info.cause().as_deref(),
            Some("hudson.slaves.OfflineCause$LaunchFailed")
        );

        let info: ComputerInfo =
            serde_json::from_value(serde_json::json!({"offline": true, "offlineCause": null}))
                .unwrap();
        assert_eq!(info.cause(), None);
    }
}
