//! Error handling and display for the CLI.

use ciwatch_monitor::{ClusterError, FatalCondition, MonitorError};
use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The pass found conditions an operator must look at.
    #[error("{}", summarize(.0))]
    Escalation(Vec<FatalCondition>),

    #[error("No available running nodes with name like: {0}")]
    NoAvailableNodes(String),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

fn summarize(conditions: &[FatalCondition]) -> String {
    conditions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CliError {
    /// The underlying cluster error, if any.
    pub fn cluster_error(&self) -> Option<&ClusterError> {
        match self {
            Self::Cluster(e) | Self::Monitor(MonitorError::Cluster(e)) => Some(e),
            _ => None,
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    let Some(cli_err) = err.downcast_ref::<CliError>() else {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        return;
    };

    if let CliError::Escalation(conditions) = cli_err {
        for condition in conditions {
            eprintln!("{} {}", "Error:".red().bold(), condition);
        }
        return;
    }

    eprintln!("{} {}", "Error:".red().bold(), cli_err);

    // Check for specific error types and provide hints
    match cli_err.cluster_error() {
        Some(ClusterError::Unauthorized { .. }) => {
            eprintln!(
                "\n{}",
                "Hint: Check your credentials. Run `ciwatch auth set` or set CIWATCH_USER and CIWATCH_TOKEN."
                    .yellow()
            );
        }
        Some(ClusterError::Unreachable(_)) => {
            eprintln!(
                "\n{}",
                "Hint: Check your network connection and the server URL (CIWATCH_URL).".yellow()
            );
        }
        _ => {}
    }
    if let CliError::Monitor(MonitorError::InvalidPattern { .. } | MonitorError::MissingLabelGroup(_)) =
        cli_err
    {
        eprintln!(
            "\n{}",
            "Hint: Fix the reason patterns under `thresholds` in your config file.".yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_message() {
        let err = CliError::Escalation(vec![
            FatalCondition::StuckJob {
                job: "deploy-9".parse().unwrap(),
                minutes: 21.67,
            },
            FatalCondition::NodesDeleted {
                count: 1,
                nodes: vec!["slave-3".parse().unwrap()],
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Investigate deploy-9. Enqueued for 21.67 minutes; 1 offline node(s) deleted: slave-3"
        );
    }

    #[test]
    fn test_cluster_error_lookup() {
        let err = CliError::Monitor(MonitorError::Cluster(ClusterError::Unreachable("x".into())));
        assert!(matches!(err.cluster_error(), Some(ClusterError::Unreachable(_))));
        assert!(CliError::NoAvailableNodes("mac".into()).cluster_error().is_none());
    }
}
