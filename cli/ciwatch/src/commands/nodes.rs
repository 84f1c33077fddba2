//! Node listing.

use anyhow::Result;
use ciwatch_monitor::ClusterClient;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use crate::error::CliError;
use crate::output::{display_option, print_output};

use super::CommandContext;

/// Arguments for `nodes`.
#[derive(Debug, Args)]
pub struct NodesArgs {
    /// Only list nodes whose name contains this text.
    #[arg(long)]
    pub filter: Option<String>,
}

/// Node status as shown to the user.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct NodeRow {
    #[tabled(rename = "Name")]
    pub name: String,

    #[tabled(rename = "State")]
    pub state: String,

    #[tabled(rename = "Executors")]
    pub executors: String,

    #[tabled(rename = "Offline cause", display = "display_option")]
    pub cause: Option<String>,
}

impl NodesArgs {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let client = ctx.client()?;
        let rows = node_rows(&client, self.filter.as_deref()).await?;
        print_output(&rows, ctx.format);
        Ok(())
    }
}

/// Read each node's status. Nodes that fail to answer are shown as unknown.
pub async fn node_rows<C: ClusterClient + ?Sized>(
    client: &C,
    filter: Option<&str>,
) -> Result<Vec<NodeRow>, CliError> {
    let mut rows = Vec::new();
    for node in client.list_nodes(filter).await? {
        let state = match client.node_is_offline(&node).await {
            Ok(true) => "offline".to_string(),
            Ok(false) => "online".to_string(),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(node = %node, error = %e, "Failed to read node status");
                "unknown".to_string()
            }
        };
        let executors = match client.node_executor_count(&node).await {
            Ok(count) => count.to_string(),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(_) => "unknown".to_string(),
        };
        let cause = match client.node_offline_cause(&node).await {
            Ok(cause) => cause,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(_) => None,
        };
        rows.push(NodeRow {
            name: node.into_inner(),
            state,
            executors,
            cause,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cause_renders_as_dash() {
        let rows = vec![
            NodeRow {
                name: "slave-3".into(),
                state: "offline".into(),
                executors: "2".into(),
                cause: None,
            },
            NodeRow {
                name: "slave-4".into(),
                state: "offline".into(),
                executors: "2".into(),
                cause: Some("Disconnected by admin".into()),
            },
        ];

        let table = tabled::Table::new(&rows).to_string();

        assert!(table.contains("Offline cause"));
        assert!(table.contains("Disconnected by admin"));
        assert!(table.lines().any(|l| l.contains("slave-3") && l.contains(" - ")));
    }
}
