//! Pool versions and liquidation event decoding.
//!
//! Both pool versions emit `LiquidationCall` with the same layout, so a single
//! decoder serves V2 and V3 logs. Each version still resolves its own topic so
//! a future divergence only touches [`ProtocolVersion::liquidation_topic`].

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

sol! {
    /// LiquidationCall(address indexed collateralAsset, address indexed debtAsset, address indexed user, uint256 debtToCover, uint256 liquidatedCollateralAmount, address liquidator, bool receiveAToken)
    #[derive(Debug)]
    event LiquidationCall(
        address indexed collateralAsset,
        address indexed debtAsset,
        address indexed user,
        uint256 debtToCover,
        uint256 liquidatedCollateralAmount,
        address liquidator,
        bool receiveAToken
    );
}

/// Lending pool deployment generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V2,
    V3,
}

impl ProtocolVersion {
    /// Every supported version, in monitoring order.
    pub const ALL: [ProtocolVersion; 2] = [ProtocolVersion::V2, ProtocolVersion::V3];

    /// Upper-case tag used in logs and checkpoint keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2 => "V2",
            Self::V3 => "V3",
        }
    }

    /// Topic0 of this version's liquidation event.
    pub fn liquidation_topic(&self) -> B256 {
        match self {
            Self::V2 | Self::V3 => LiquidationCall::SIGNATURE_HASH,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded `LiquidationCall` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationCallLog {
    /// Pool contract that emitted the log
    pub pool: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    /// Account whose position was liquidated
    pub user: Address,
    pub debt_to_cover: U256,
    pub liquidated_collateral: U256,
    pub liquidator: Address,
    pub receive_a_token: bool,
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    /// Set when the log was dropped by a chain reorganisation
    pub removed: bool,
}

/// Decode a raw pool log into a [`LiquidationCallLog`].
///
/// Topics: `[sig, collateralAsset, debtAsset, user]`.
/// Data: `debtToCover, liquidatedCollateralAmount, liquidator, receiveAToken`.
pub fn decode_liquidation_log(log: &Log) -> Result<LiquidationCallLog> {
    let topics = log.topics();
    if topics.len() < 4 {
        return Err(ChainError::Decode(format!(
            "liquidation log has {} topics, expected 4",
            topics.len()
        )));
    }
    if topics[0] != LiquidationCall::SIGNATURE_HASH {
        return Err(ChainError::Decode(format!(
            "unexpected event signature {}",
            topics[0]
        )));
    }

    let data = &log.data().data;
    if data.len() < 128 {
        return Err(ChainError::Decode(format!(
            "liquidation log data is {} bytes, expected 128",
            data.len()
        )));
    }

    let block_number = log
        .block_number
        .ok_or_else(|| ChainError::Decode("liquidation log has no block number".to_string()))?;

    Ok(LiquidationCallLog {
        pool: log.address(),
        collateral_asset: Address::from_slice(&topics[1][12..]),
        debt_asset: Address::from_slice(&topics[2][12..]),
        user: Address::from_slice(&topics[3][12..]),
        debt_to_cover: U256::from_be_slice(&data[0..32]),
        liquidated_collateral: U256::from_be_slice(&data[32..64]),
        liquidator: Address::from_slice(&data[76..96]),
        receive_a_token: data[127] != 0,
        block_number,
        tx_hash: log.transaction_hash.unwrap_or_default(),
        log_index: log.log_index.unwrap_or_default(),
        removed: log.removed,
    })
}
