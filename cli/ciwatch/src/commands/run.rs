//! One monitor pass.

use anyhow::Result;
use ciwatch_monitor::{run_once, ClusterClient, RequestOutcome, RunResult, Sleeper, Thresholds, TokioSleeper};
use clap::Args;
use colored::Colorize;

use crate::error::CliError;
use crate::output::{print_info, print_single, print_success, print_warning, OutputFormat};

use super::CommandContext;

/// Arguments for a monitor pass.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Request a node when a label is short of executors.
    #[arg(long)]
    pub launch_nodes: bool,

    /// Check that a short label's nodes have executors at all.
    #[arg(long)]
    pub check_label_executors: bool,

    /// Override the queue wait ceiling in seconds.
    #[arg(long)]
    pub queue_wait_max: Option<u64>,
}

impl RunArgs {
    /// Apply flag overrides on top of configured thresholds.
    pub fn thresholds(&self, configured: &Thresholds) -> Thresholds {
        let mut thresholds = configured.clone();
        thresholds.auto_provision |= self.launch_nodes;
        thresholds.check_label_executors |= self.check_label_executors;
        if let Some(secs) = self.queue_wait_max {
            thresholds.queue_wait_max_secs = secs;
        }
        thresholds
    }

    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let client = ctx.client()?;
        let thresholds = self.thresholds(&ctx.config.thresholds);
        execute(&thresholds, &client, &TokioSleeper, ctx.format).await
    }
}

/// Run a pass, report it, and fail if anything must be escalated.
pub async fn execute<C, S>(
    thresholds: &Thresholds,
    client: &C,
    sleeper: &S,
    format: OutputFormat,
) -> Result<()>
where
    C: ClusterClient + ?Sized,
    S: Sleeper + ?Sized,
{
    let result = run_once(thresholds, client, sleeper)
        .await
        .map_err(CliError::from)?;

    match format {
        OutputFormat::Json => print_single(&result),
        OutputFormat::Table => print_report(&result),
    }

    if result.has_fatal() {
        return Err(CliError::Escalation(result.fatal_conditions()).into());
    }
    Ok(())
}

fn print_report(result: &RunResult) {
    for advisory in &result.advisories {
        print_warning(&advisory.to_string());
    }

    for (label, outcome) in &result.capacity_requests {
        match outcome {
            RequestOutcome::Requested { template, response } => print_info(&format!(
                "Launching node for label {label} from template {template}: HTTP {} {}",
                response.status, response.message
            )),
            RequestOutcome::Rejected { template, error } => print_warning(&format!(
                "Launch for label {label} from template {template} rejected: {error}"
            )),
            RequestOutcome::NoTemplateFound => {
                print_info(&format!("No template found for label {label}"))
            }
        }
    }

    for alert in &result.alerts {
        println!("{} {}", "Alert:".red().bold(), alert);
    }

    for (node, error) in &result.failed_deletions {
        print_warning(&format!("Failed to delete {node}: {error}"));
    }

    if result.deleted_nodes.is_empty() {
        print_info("No offline nodes deleted.");
    } else {
        for node in &result.deleted_nodes {
            println!("{} {}", "Deleted:".red().bold(), node);
        }
    }

    if !result.has_fatal() {
        print_success("Nothing to escalate.");
    }
}
