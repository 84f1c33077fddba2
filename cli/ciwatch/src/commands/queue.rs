//! Queue listing.

use anyhow::Result;
use ciwatch_monitor::{BlockingClassification, Classifier, ClusterClient};
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::print_output;

use super::CommandContext;

/// One queued job as shown to the user.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct QueueRow {
    #[tabled(rename = "Job")]
    pub job: String,

    #[tabled(rename = "Minutes")]
    pub minutes: String,

    #[tabled(rename = "Blocked")]
    pub blocked: bool,

    #[tabled(rename = "Buildable")]
    pub buildable: bool,

    #[tabled(rename = "Class")]
    pub classification: String,

    #[tabled(rename = "Reason")]
    pub reason: String,
}

/// List queued jobs with the classification a pass would give them.
pub async fn list_queue(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;
    let rows = queue_rows(&client, &Classifier::from_thresholds(&ctx.config.thresholds)?).await?;
    print_output(&rows, ctx.format);
    Ok(())
}

pub async fn queue_rows<C: ClusterClient + ?Sized>(
    client: &C,
    classifier: &Classifier,
) -> Result<Vec<QueueRow>, CliError> {
    let items = client.list_queued_jobs().await?;
    Ok(items
        .into_iter()
        .map(|item| {
            let classification = match classifier.classify(&item.reason) {
                BlockingClassification::AllowedWait => "allowed".to_string(),
                BlockingClassification::NeedsCapacity(label) => format!("capacity:{label}"),
                BlockingClassification::Unclassified => "unclassified".to_string(),
            };
            QueueRow {
                job: item.job.to_string(),
                minutes: format!("{:.1}", item.enqueued_for().as_secs_f64() / 60.0),
                blocked: item.blocked,
                buildable: item.buildable,
                classification,
                reason: item.reason,
            }
        })
        .collect())
}
