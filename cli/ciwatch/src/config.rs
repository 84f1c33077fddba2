//! Configuration and credentials.
//!
//! Handles:
//! - Cluster endpoint configuration
//! - Monitor thresholds
//! - API token storage
//!
//! Files live in the platform config directory unless `--config` points
//! elsewhere. Environment variables override file values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ciwatch_monitor::Thresholds;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Credentials file name.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Default cloud used for provisioning requests.
const DEFAULT_CLOUD: &str = "ec2-us-east-1";

/// Get the config directory path.
fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "ciwatch", "ciwatch")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Read an environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Cluster endpoint.
    #[serde(default)]
    pub server: ServerConfig,

    /// Monitor thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Cluster endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the CI server.
    #[serde(default = "default_url")]
    pub url: String,

    /// Cloud that provisioning requests are sent to.
    #[serde(default = "default_cloud")]
    pub cloud: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_cloud() -> String {
    DEFAULT_CLOUD.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            cloud: default_cloud(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load config from `path`, or from the config directory.
    ///
    /// An explicit path must exist; the default location may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = config_dir()?.join(CONFIG_FILE);
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific file, without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Apply `CIWATCH_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(url) = env_var("CIWATCH_URL") {
            self.server.url = url;
        }
        if let Some(cloud) = env_var("CIWATCH_CLOUD") {
            self.server.cloud = cloud;
        }
        if env_var("CIWATCH_LAUNCH_NODES").is_some() {
            self.thresholds.auto_provision = true;
        }
    }
}

/// Stored credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User name.
    pub username: String,

    /// API token.
    pub token: String,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(username: String, token: String) -> Self {
        Self { username, token }
    }

    /// Load credentials from the environment, falling back to disk.
    pub fn load() -> Result<Option<Self>> {
        if let (Some(username), Some(token)) = (env_var("CIWATCH_USER"), env_var("CIWATCH_TOKEN")) {
            return Ok(Some(Self::new(username, token)));
        }

        Self::load_from(&config_dir()?.join(CREDENTIALS_FILE))
    }

    /// Load credentials from a specific file, if it exists.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials from {:?}", path))?;

        let creds: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials from {:?}", path))?;

        Ok(Some(creds))
    }

    /// Save credentials to the config directory.
    pub fn save(&self) -> Result<PathBuf> {
        let dir = config_dir()?;
        fs::create_dir_all(&dir)?;
        let path = dir.join(CREDENTIALS_FILE);
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save credentials to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .with_context(|| format!("Failed to write credentials to {:?}", path))?;
            file.write_all(contents.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write credentials to {:?}", path))?;
        }

        Ok(())
    }

    /// Delete stored credentials.
    pub fn delete() -> Result<bool> {
        let path = config_dir()?.join(CREDENTIALS_FILE);

        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete credentials at {:?}", path))?;
        Ok(true)
    }
}
