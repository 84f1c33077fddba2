//! Executor availability check for named nodes.

use anyhow::Result;
use ciwatch_monitor::{has_available_executors, ClusterClient};
use clap::Args;

use crate::error::CliError;
use crate::output::print_success;

use super::CommandContext;

/// Arguments for `check-node`.
#[derive(Debug, Args)]
pub struct CheckNodeArgs {
    /// Substring of the node names to check.
    pub name: String,
}

impl CheckNodeArgs {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let client = ctx.client()?;
        check(&client, &self.name).await?;
        print_success(&format!("A node like {} has an available executor.", self.name));
        Ok(())
    }
}

/// Fail unless a node whose name contains `name` has an executor.
pub async fn check<C: ClusterClient + ?Sized>(client: &C, name: &str) -> Result<(), CliError> {
    let nodes = client.list_nodes(Some(name)).await?;
    if has_available_executors(client, &nodes).await? {
        Ok(())
    } else {
        Err(CliError::NoAvailableNodes(name.to_string()))
    }
}
