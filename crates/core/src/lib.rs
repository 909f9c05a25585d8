//! Lending pool monitoring core.
//!
//! This crate provides the per-chain monitoring engine:
//! - Periodic, batched health factor polling with threshold alerts
//! - Liquidation catch-up from the stored checkpoint
//! - Live liquidation monitoring over a push subscription
//! - Per-version supervision (catch-up, subscribe, reconnect with backoff)
//! - Checkpoint store, account registry and notifier collaborators
//!
//! Supports two lending pool versions (V2, V3) on any number of EVM chains.

mod accounts;
pub mod config;
mod context;
mod error;
mod liquidation;
mod live;
mod monitor;
mod notifier;
mod poller;
mod reconciler;
mod store;
mod supervisor;
mod types;

#[cfg(test)]
mod test_support;

pub use accounts::{AccountEntry, AccountRegistry, FileAccountRegistry, MemoryAccountRegistry};
pub use config::{ChainConfig, MonitorConfig, SentinelConfig};
pub use context::{ChainContext, Collaborators};
pub use error::{MonitorError, Result};
pub use liquidation::handle_liquidation;
pub use live::{LiveMonitor, SessionSummary};
pub use monitor::ChainMonitor;
pub use notifier::{Alert, FanoutNotifier, LogNotifier, Notifier, WebhookNotifier};
pub use poller::{CycleReport, HealthFactorPoller};
pub use reconciler::{ReconcileReport, Reconciler};
pub use store::{CheckpointStore, JsonFileCheckpointStore, MemoryCheckpointStore};
pub use supervisor::{Backoff, VersionState, VersionSupervisor};
pub use types::{
    Chain, CheckpointKey, HealthFactorReading, LiquidationEvent, PoolDeployment, TrackedAccount,
    TrackedAccountWithThreshold,
};

pub use sentinel_chain::ProtocolVersion;
