//! Chain endpoint abstraction consumed by the monitors.

use std::pin::Pin;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// Address + topic0 filter for one pool's liquidation logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogFilter {
    pub address: Address,
    pub topic: B256,
}

impl LogFilter {
    pub fn new(address: Address, topic: B256) -> Self {
        Self { address, topic }
    }
}

/// Raw pushed messages following a successful subscription acknowledgment.
///
/// An `Err` item or the end of the stream means the connection is gone.
pub type RawMessageStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// JSON-RPC capabilities of a single chain.
#[async_trait]
pub trait ChainEndpoint: Send + Sync {
    /// Latest block number known to the node.
    async fn block_number(&self) -> Result<u64>;

    /// Health factors for `users` on `pool`, in the same order as `users`.
    ///
    /// Issued as a single contract call; the whole batch fails together.
    async fn health_factors(&self, pool: Address, users: &[Address]) -> Result<Vec<f64>>;

    /// Historical logs matching `filter` in `[from_block, to_block]`.
    async fn get_logs(&self, filter: LogFilter, from_block: u64, to_block: u64) -> Result<Vec<Log>>;

    /// Open a push subscription for logs matching `filter`.
    ///
    /// Resolves once the node acknowledged the subscription. A rejected
    /// acknowledgment is reported as [`ChainError::SubscriptionRejected`].
    ///
    /// [`ChainError::SubscriptionRejected`]: crate::ChainError::SubscriptionRejected
    async fn subscribe_logs(&self, filter: LogFilter) -> Result<RawMessageStream>;
}
