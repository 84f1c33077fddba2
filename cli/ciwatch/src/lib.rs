//! ciwatch CLI library.
//!
//! Wraps the monitor core with a Jenkins HTTP client, file-based
//! configuration and console output. The binary in `main.rs` only parses
//! arguments, initializes logging and reports errors.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use client::JenkinsClient;
pub use commands::Cli;
pub use config::{Config, Credentials, ServerConfig};
pub use error::CliError;
