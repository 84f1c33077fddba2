//! CLI commands.

mod auth;
pub mod check_node;
pub mod nodes;
pub mod queue;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::JenkinsClient;
use crate::config::{Config, Credentials};
use crate::output::OutputFormat;

/// ciwatch - watch a CI build queue and reclaim offline worker nodes.
#[derive(Debug, Parser)]
#[command(name = "ciwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Path to the config file.
    #[arg(long, global = true, env = "CIWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Command to run; a monitor pass when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one monitor pass over the queue and the nodes.
    Run(run::RunArgs),

    /// Fail unless a node matching the name has an available executor.
    CheckNode(check_node::CheckNodeArgs),

    /// List queued jobs with their classification.
    Queue,

    /// List nodes with their status.
    Nodes(nodes::NodesArgs),

    /// Manage stored credentials.
    Auth(auth::AuthCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    ///
    /// Config and credentials are only read by commands that need them.
    pub async fn run(self) -> Result<()> {
        let config_path = self.config.as_deref();
        match self.command {
            Some(Commands::Version) => {
                println!("ciwatch {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            Some(Commands::Auth(cmd)) => cmd.run(config_path, self.format),
            None => {
                let ctx = CommandContext::load(config_path, self.format)?;
                run::RunArgs::default().run(ctx).await
            }
            Some(Commands::Run(args)) => {
                args.run(CommandContext::load(config_path, self.format)?).await
            }
            Some(Commands::CheckNode(args)) => {
                args.run(CommandContext::load(config_path, self.format)?).await
            }
            Some(Commands::Queue) => {
                queue::list_queue(CommandContext::load(config_path, self.format)?).await
            }
            Some(Commands::Nodes(args)) => {
                args.run(CommandContext::load(config_path, self.format)?).await
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub credentials: Option<Credentials>,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load config and credentials for a command that needs them.
    pub fn load(config_path: Option<&Path>, format: OutputFormat) -> Result<Self> {
        Ok(Self {
            config: Config::load(config_path)?,
            credentials: Credentials::load()?,
            format,
        })
    }

    /// Get a cluster client for the configured server.
    pub fn client(&self) -> Result<JenkinsClient> {
        JenkinsClient::new(&self.config.server, self.credentials.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["ciwatch"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.format, OutputFormat::Table);
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "ciwatch",
            "--format",
            "json",
            "run",
            "--launch-nodes",
            "--queue-wait-max",
            "1200",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.launch_nodes);
        assert_eq!(args.queue_wait_max, Some(1200));
    }

    #[test]
    fn test_check_node_requires_name() {
        assert!(Cli::try_parse_from(["ciwatch", "check-node"]).is_err());
        assert!(Cli::try_parse_from(["ciwatch", "check-node", "mac"]).is_ok());
    }

    #[tokio::test]
    async fn test_version_ignores_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = path.to_str().unwrap();

        let version = Cli::try_parse_from(["ciwatch", "--config", config, "version"]).unwrap();
        assert!(version.run().await.is_ok());

        let queue = Cli::try_parse_from(["ciwatch", "--config", config, "queue"]).unwrap();
        assert!(queue.run().await.is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
