//! Account registry: which positions are watched and at what threshold.

use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sentinel_chain::ProtocolVersion;

use crate::types::{Chain, TrackedAccount, TrackedAccountWithThreshold};

/// Source of tracked accounts.
#[async_trait]
pub trait AccountRegistry: Send + Sync {
    /// Every tracked account on `chain` with its current threshold.
    async fn tracked_accounts_with_thresholds(
        &self,
        chain: Chain,
    ) -> Result<Vec<TrackedAccountWithThreshold>>;

    /// The tracked account for `address`, if any.
    async fn find_tracked(
        &self,
        chain: Chain,
        version: ProtocolVersion,
        address: Address,
    ) -> Result<Option<TrackedAccount>>;
}

/// Registry held in memory.
#[derive(Debug, Default)]
pub struct MemoryAccountRegistry {
    accounts: DashMap<TrackedAccount, f64>,
}

impl MemoryAccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an account, replacing its threshold if already tracked.
    pub fn track(&self, account: TrackedAccount, health_factor_threshold: f64) {
        self.accounts.insert(account, health_factor_threshold);
    }
}

#[async_trait]
impl AccountRegistry for MemoryAccountRegistry {
    async fn tracked_accounts_with_thresholds(
        &self,
        chain: Chain,
    ) -> Result<Vec<TrackedAccountWithThreshold>> {
        let mut accounts: Vec<_> = self
            .accounts
            .iter()
            .filter(|entry| entry.key().chain == chain)
            .map(|entry| TrackedAccountWithThreshold::new(*entry.key(), *entry.value()))
            .collect();
        accounts.sort_by(|a, b| a.account.cmp(&b.account));
        Ok(accounts)
    }

    async fn find_tracked(
        &self,
        chain: Chain,
        version: ProtocolVersion,
        address: Address,
    ) -> Result<Option<TrackedAccount>> {
        let account = TrackedAccount::new(chain, version, address);
        Ok(self.accounts.contains_key(&account).then_some(account))
    }
}

/// One `[[accounts]]` entry of the accounts file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub chain: Chain,
    pub version: ProtocolVersion,
    pub address: Address,
    /// Alert threshold
    pub health_factor_threshold: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<AccountEntry>,
}

/// Registry backed by a TOML file.
///
/// The file is re-read on every listing so edits apply from the next polling
/// cycle. Lookups use the most recent listing.
#[derive(Debug)]
pub struct FileAccountRegistry {
    path: PathBuf,
    entries: RwLock<Option<Vec<AccountEntry>>>,
}

impl FileAccountRegistry {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn reload(&self) -> Result<Vec<AccountEntry>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read accounts file {}", self.path.display()))?;
        let file: AccountsFile = toml::from_str(&content)
            .with_context(|| format!("Invalid accounts file {}", self.path.display()))?;

        debug!(
            path = %self.path.display(),
            accounts = file.accounts.len(),
            "Accounts file loaded"
        );

        *self.entries.write() = Some(file.accounts.clone());
        Ok(file.accounts)
    }

    async fn entries(&self) -> Result<Vec<AccountEntry>> {
        let cached = self.entries.read().clone();
        match cached {
            Some(entries) => Ok(entries),
            None => self.reload().await,
        }
    }
}

#[async_trait]
impl AccountRegistry for FileAccountRegistry {
    async fn tracked_accounts_with_thresholds(
        &self,
        chain: Chain,
    ) -> Result<Vec<TrackedAccountWithThreshold>> {
        Ok(self
            .reload()
            .await?
            .into_iter()
            .filter(|entry| entry.chain == chain)
            .map(|entry| {
                TrackedAccountWithThreshold::new(
                    TrackedAccount::new(entry.chain, entry.version, entry.address),
                    entry.health_factor_threshold,
                )
            })
            .collect())
    }

    async fn find_tracked(
        &self,
        chain: Chain,
        version: ProtocolVersion,
        address: Address,
    ) -> Result<Option<TrackedAccount>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .find(|entry| entry.chain == chain && entry.version == version && entry.address == address)
            .map(|entry| TrackedAccount::new(entry.chain, entry.version, entry.address)))
    }
}
