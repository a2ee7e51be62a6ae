//! `load_config` module: reads the static YAML config file and turns it into the typed settings
//! the CLI needs.
//!
//! The file never holds secrets. The GitHub token is read from `GITHUB_TOKEN` when the client
//! is built (see [`crate::github::GitHubClient::new_from_env`]).
//!
//! Accepted layout:
//!
//! ```yaml
//! vault_dir: ~/notes
//! state_file: ./published.json   # optional, defaults to <vault_dir>/.note-publisher.json
//! remote:
//!   owner: alice
//!   repo: garden
//!   branch: main                 # optional
//!   api_url: https://api.github.com   # optional
//! publish:                       # optional, every key has a default
//!   publish_root: notes
//!   exclude: [Private]
//!   slugify: true
//! ```
use anyhow::{bail, Result};
use note_publisher_core::config::PublishSettings;
use note_publisher_core::contract::RemoteCoordinates;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_STATE_FILE: &str = ".note-publisher.json";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub vault_dir: PathBuf,
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    pub remote: RemoteSection,
    #[serde(default)]
    pub publish: PublishSettings,
}

#[derive(Debug, Deserialize)]
pub struct RemoteSection {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl RemoteSection {
    pub fn coordinates(&self) -> RemoteCoordinates {
        RemoteCoordinates {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone().filter(|b| !b.trim().is_empty()),
        }
    }
}

impl CliConfig {
    /// Ledger location; relative to the vault unless configured.
    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.vault_dir.join(DEFAULT_STATE_FILE))
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let config: CliConfig = match serde_yaml::from_str(&content) {
        Ok(config) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            config
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if config.remote.owner.trim().is_empty() {
        bail!("Config error: remote.owner must not be empty");
    }
    if config.remote.repo.trim().is_empty() {
        bail!("Config error: remote.repo must not be empty");
    }
    if !config.vault_dir.is_dir() {
        bail!(
            "Config error: vault_dir {} is not a directory",
            config.vault_dir.display()
        );
    }

    info!(
        vault = %config.vault_dir.display(),
        owner = %config.remote.owner,
        repo = %config.remote.repo,
        "Configuration ready"
    );
    Ok(config)
}
