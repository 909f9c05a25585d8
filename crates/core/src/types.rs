//! Domain types shared by the monitors.

use std::fmt;

use alloy::primitives::Address;
use alloy::rpc::types::Log;
use serde::{Deserialize, Serialize};

use sentinel_chain::{decode_liquidation_log, LiquidationCallLog, LogFilter, ProtocolVersion};

/// Supported networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Polygon,
    Avalanche,
    Arbitrum,
    Optimism,
    Base,
}

impl Chain {
    /// Upper-case network name used in env var names and checkpoint keys.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ethereum => "ETHEREUM",
            Self::Polygon => "POLYGON",
            Self::Avalanche => "AVALANCHE",
            Self::Arbitrum => "ARBITRUM",
            Self::Optimism => "OPTIMISM",
            Self::Base => "BASE",
        }
    }

    /// Environment variable holding the HTTP RPC endpoint.
    pub fn http_rpc_env(&self) -> String {
        format!("{}_HTTP_RPC", self.name())
    }

    /// Environment variable holding the WebSocket RPC endpoint.
    pub fn ws_rpc_env(&self) -> String {
        format!("{}_WS_RPC", self.name())
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One pool version deployed on a chain, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDeployment {
    pub version: ProtocolVersion,
    /// Pool contract address
    pub pool: Address,
    /// Block the pool was deployed at; history starts here when no checkpoint exists
    pub start_block: u64,
}

impl PoolDeployment {
    pub fn new(version: ProtocolVersion, pool: Address, start_block: u64) -> Self {
        Self {
            version,
            pool,
            start_block,
        }
    }

    /// Log filter for this pool's liquidation events.
    pub fn liquidation_filter(&self) -> LogFilter {
        LogFilter::new(self.pool, self.version.liquidation_topic())
    }
}

/// A position being watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackedAccount {
    pub chain: Chain,
    pub version: ProtocolVersion,
    pub address: Address,
}

impl TrackedAccount {
    pub fn new(chain: Chain, version: ProtocolVersion, address: Address) -> Self {
        Self {
            chain,
            version,
            address,
        }
    }
}

/// A tracked account together with its alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedAccountWithThreshold {
    pub account: TrackedAccount,
    /// Alert when the health factor is strictly below this value
    pub health_factor_threshold: f64,
}

impl TrackedAccountWithThreshold {
    pub fn new(account: TrackedAccount, health_factor_threshold: f64) -> Self {
        Self {
            account,
            health_factor_threshold,
        }
    }
}

/// Health factor computed for one account during a polling cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthFactorReading {
    pub account: TrackedAccountWithThreshold,
    pub health_factor: f64,
}

impl HealthFactorReading {
    /// Strict comparison: a reading equal to the threshold does not alert.
    pub fn is_below_threshold(&self) -> bool {
        self.health_factor < self.account.health_factor_threshold
    }
}

/// Liquidation decoded from a pool log.
#[derive(Debug, Clone)]
pub struct LiquidationEvent {
    pub chain: Chain,
    pub version: ProtocolVersion,
    /// Liquidated account
    pub user: Address,
    pub block_number: u64,
    /// Decoded event fields
    pub call: LiquidationCallLog,
    /// Raw log as delivered by the node
    pub log: Log,
}

impl LiquidationEvent {
    /// Decode a raw pool log.
    pub fn from_log(
        chain: Chain,
        version: ProtocolVersion,
        log: Log,
    ) -> sentinel_chain::Result<Self> {
        let call = decode_liquidation_log(&log)?;
        Ok(Self {
            chain,
            version,
            user: call.user,
            block_number: call.block_number,
            call,
            log,
        })
    }
}

/// Identifies the liquidation watermark of one pool version on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckpointKey {
    pub chain: Chain,
    pub version: ProtocolVersion,
}

impl CheckpointKey {
    pub fn new(chain: Chain, version: ProtocolVersion) -> Self {
        Self { chain, version }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LAST_{}_{}_CHECKED_BLOCK", self.chain.name(), self.version.as_str())
    }
}
