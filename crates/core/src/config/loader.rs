//! Top-level configuration file.
//!
//! A single TOML file holds the shared monitor parameters, one `[[chains]]`
//! entry per network and the collaborator locations.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{ChainConfig, MonitorConfig};

/// Default config path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/sentinel.toml";

/// Everything the binary needs to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Checkpoint persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding one block number per checkpoint key
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("state/checkpoints.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

/// Tracked account source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// TOML file listing `[[accounts]]`
    #[serde(default = "default_accounts_path")]
    pub accounts_path: PathBuf,
}

fn default_accounts_path() -> PathBuf {
    PathBuf::from("config/accounts.toml")
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            accounts_path: default_accounts_path(),
        }
    }
}

/// Alert delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook receiving JSON alerts; alerts are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl SentinelConfig {
    /// Load and validate a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        info!(
            path = %path.display(),
            chains = config.chains.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load from `SENTINEL_CONFIG` or [`DEFAULT_CONFIG_PATH`].
    pub fn from_env() -> Result<Self> {
        let path =
            std::env::var("SENTINEL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(path)
    }

    /// Parse TOML text, expand `${VAR}` references and validate.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).context("Failed to parse TOML")?;

        for chain in &mut config.chains {
            chain.expand_env_vars();
        }
        if let Some(ref mut url) = config.notifier.webhook_url {
            *url = super::chain::expand_env(url);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.monitor.validate()?;

        if self.chains.is_empty() {
            anyhow::bail!("no [[chains]] configured");
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain) {
                anyhow::bail!("chain {} is configured more than once", chain.chain);
            }
            if chain.pools().is_empty() {
                anyhow::bail!("chain {} has neither a v2 nor a v3 pool", chain.chain);
            }
        }
        Ok(())
    }
}
