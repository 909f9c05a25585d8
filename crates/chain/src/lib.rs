//! Chain endpoint adapter for the liquidation sentinel.
//!
//! This crate provides:
//! - The [`ChainEndpoint`] capability consumed by the monitors
//! - An alloy/WebSocket implementation ([`RpcEndpoint`])
//! - Batched health factor queries through Multicall3
//! - Liquidation topic signatures and log decoding per pool version
//! - `eth_subscribe` wire messages

pub mod contracts;
mod endpoint;
mod error;
mod events;
mod provider;
pub mod subscription;

pub use contracts::{health_factor_from_wad, MULTICALL3};
pub use endpoint::{ChainEndpoint, LogFilter, RawMessageStream};
pub use error::{ChainError, Result};
pub use events::{decode_liquidation_log, LiquidationCall, LiquidationCallLog, ProtocolVersion};
pub use provider::RpcEndpoint;
