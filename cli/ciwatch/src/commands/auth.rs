//! Credential commands.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::Credentials;
use crate::output::{print_info, print_success, OutputFormat};

use super::CommandContext;

/// Credential commands.
#[derive(Debug, Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuthSubcommand {
    /// Store a user name and API token.
    Set(SetArgs),

    /// Remove stored credentials.
    Clear,

    /// Show which credentials are in use.
    Status,
}

#[derive(Debug, Args)]
struct SetArgs {
    /// User name on the CI server.
    #[arg(long)]
    user: String,

    /// API token for the user.
    #[arg(long, env = "CIWATCH_TOKEN", hide_env_values = true)]
    token: String,
}

impl AuthCommand {
    pub fn run(self, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
        match self.command {
            AuthSubcommand::Set(args) => {
                let path = Credentials::new(args.user, args.token).save()?;
                print_success(&format!("Credentials saved to {}", path.display()));
                Ok(())
            }
            AuthSubcommand::Clear => {
                if Credentials::delete()? {
                    print_success("Credentials removed.");
                } else {
                    print_info("No stored credentials.");
                }
                Ok(())
            }
            AuthSubcommand::Status => {
                let ctx = CommandContext::load(config_path, format)?;
                match &ctx.credentials {
                    Some(creds) => println!(
                        "Authenticated to {} as {}",
                        ctx.config.server.url.bold(),
                        creds.username.bold()
                    ),
                    None => println!(
                        "{} Requests to {} are anonymous.",
                        "Not authenticated.".yellow(),
                        ctx.config.server.url
                    ),
                }
                Ok(())
            }
        }
    }
}
