//! Live liquidation monitoring over a push subscription.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use sentinel_chain::{subscription::decode_log_notification, ChainError, RawMessageStream};

use crate::context::ChainContext;
use crate::error::{MonitorError, Result};
use crate::liquidation::handle_liquidation;
use crate::types::{LiquidationEvent, PoolDeployment};

/// How a live session went.
#[derive(Debug)]
pub struct SessionSummary {
    /// Liquidation logs handled
    pub processed: u64,
    /// Messages dropped (undecodable, removed, foreign)
    pub skipped: u64,
    /// Highest block recorded as checkpoint during the session
    pub last_block: Option<u64>,
    /// Why the session ended
    pub ended_by: MonitorError,
}

/// Push subscription consumer for one pool version.
pub struct LiveMonitor {
    ctx: Arc<ChainContext>,
    pool: PoolDeployment,
}

impl LiveMonitor {
    pub fn new(ctx: Arc<ChainContext>, pool: PoolDeployment) -> Self {
        Self { ctx, pool }
    }

    /// Open the subscription and wait for its acknowledgment.
    ///
    /// A rejected acknowledgment is a startup error; anything else is a
    /// connection error.
    pub async fn subscribe(&self) -> Result<RawMessageStream> {
        let stream = self
            .ctx
            .endpoint
            .subscribe_logs(self.pool.liquidation_filter())
            .await
            .map_err(MonitorError::from_subscribe)?;

        info!(
            chain = %self.ctx.chain,
            version = %self.pool.version,
            pool = %self.pool.pool,
            "Liquidation subscription established"
        );
        Ok(stream)
    }

    /// Subscribe, then consume until the session ends.
    pub async fn run(&self) -> Result<SessionSummary> {
        let messages = self.subscribe().await?;
        Ok(self.consume(messages).await)
    }

    /// Handle pushed messages until the connection drops or handling fails.
    ///
    /// Undecodable messages are skipped. After each handled log the checkpoint
    /// moves to that log's block, never backwards.
    pub async fn consume(&self, mut messages: RawMessageStream) -> SessionSummary {
        let chain = self.ctx.chain;
        let version = self.pool.version;
        let key = self.ctx.checkpoint_key(version);

        let mut processed = 0;
        let mut skipped = 0;
        let mut last_block = None;

        let end = |ended_by: MonitorError, processed, skipped, last_block| SessionSummary {
            processed,
            skipped,
            last_block,
            ended_by,
        };

        let mut checkpoint = match self.ctx.store.get(&key).await {
            Ok(block) => block,
            Err(e) => return end(MonitorError::Store(e), processed, skipped, last_block),
        };

        while let Some(message) = messages.next().await {
            let raw = match message {
                Ok(raw) => raw,
                Err(e) => {
                    error!(
                        chain = %chain,
                        version = %version,
                        error = %e,
                        processed,
                        "Liquidation subscription lost"
                    );
                    return end(MonitorError::Connection(e), processed, skipped, last_block);
                }
            };

            let log = match decode_log_notification(&raw) {
                Ok(log) => log,
                Err(e) => {
                    let e = MonitorError::Decode(e);
                    warn!(chain = %chain, version = %version, error = %e, raw = %raw, "Skipping pushed message");
                    skipped += 1;
                    continue;
                }
            };

            if log.removed {
                warn!(
                    chain = %chain,
                    version = %version,
                    block = ?log.block_number,
                    tx = ?log.transaction_hash,
                    "Ignoring liquidation log removed by reorg"
                );
                skipped += 1;
                continue;
            }
            if log.address() != self.pool.pool {
                debug!(chain = %chain, version = %version, address = %log.address(), "Ignoring log from another contract");
                skipped += 1;
                continue;
            }

            let event = match LiquidationEvent::from_log(chain, version, log) {
                Ok(event) => event,
                Err(e) => {
                    let e = MonitorError::Decode(e);
                    warn!(chain = %chain, version = %version, error = %e, "Skipping pushed log");
                    skipped += 1;
                    continue;
                }
            };
            let block = event.block_number;

            if let Err(e) = handle_liquidation(&self.ctx, event).await {
                error!(chain = %chain, version = %version, block, error = %e, "Liquidation handling failed");
                return end(e, processed, skipped, last_block);
            }
            processed += 1;

            if checkpoint.map_or(true, |current| block > current) {
                if let Err(e) = self.ctx.store.set(&key, block).await {
                    let e = MonitorError::Store(e);
                    error!(chain = %chain, version = %version, block, error = %e, "Checkpoint update failed");
                    return end(e, processed, skipped, last_block);
                }
                checkpoint = Some(block);
                last_block = Some(block);
                debug!(chain = %chain, version = %version, block, "Checkpoint advanced");
            }
        }

        error!(
            chain = %chain,
            version = %version,
            processed,
            "Liquidation subscription closed by remote"
        );
        end(
            MonitorError::Connection(ChainError::ConnectionClosed),
            processed,
            skipped,
            last_block,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{liquidation_log, notification, Harness, POOL_V2, POOL_V3};
    use alloy::primitives::Address;
    use sentinel_chain::ProtocolVersion;
    use std::sync::atomic::Ordering;

    const N: u64 = 5_000;

    fn monitor(harness: &Harness) -> LiveMonitor {
        LiveMonitor::new(harness.ctx.clone(), harness.pool(ProtocolVersion::V2))
    }

    #[tokio::test]
    async fn test_unparseable_message_does_not_end_session() {
        let harness = Harness::new();
        let user = Address::repeat_byte(0xa);
        harness.track(ProtocolVersion::V2, user, 1.0);
        harness.set_checkpoint(ProtocolVersion::V2, N).await;
        harness.endpoint.script_subscription(vec![
            Ok("{not json".to_string()),
            Ok(notification(&liquidation_log(POOL_V2, user, N + 1, 0))),
            Ok(r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{}}"#.to_string()),
            Ok(notification(&liquidation_log(POOL_V2, Address::repeat_byte(0xb), N + 2, 0))),
        ]);

        let summary = monitor(&harness).run().await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.last_block, Some(N + 2));
        assert!(matches!(summary.ended_by, MonitorError::Connection(ChainError::ConnectionClosed)));
        assert_eq!(harness.notifier.liquidated_accounts(), vec![user]);
        assert_eq!(harness.checkpoint(ProtocolVersion::V2).await, Some(N + 2));
    }

    #[tokio::test]
    async fn test_checkpoint_never_moves_backwards() {
        let harness = Harness::new();
        harness.set_checkpoint(ProtocolVersion::V2, N + 10).await;
        harness.endpoint.script_subscription(vec![
            Ok(notification(&liquidation_log(POOL_V2, Address::repeat_byte(1), N + 12, 0))),
            Ok(notification(&liquidation_log(POOL_V2, Address::repeat_byte(2), N + 11, 0))),
        ]);

        let summary = monitor(&harness).run().await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(harness.checkpoint(ProtocolVersion::V2).await, Some(N + 12));
    }

    #[tokio::test]
    async fn test_removed_and_foreign_logs_are_skipped() {
        let harness = Harness::new();
        let user = Address::repeat_byte(0xa);
        harness.track(ProtocolVersion::V2, user, 1.0);

        let mut removed = liquidation_log(POOL_V2, user, N + 1, 0);
        removed.removed = true;
        harness.endpoint.script_subscription(vec![
            Ok(notification(&removed)),
            Ok(notification(&liquidation_log(POOL_V3, user, N + 2, 0))),
        ]);

        let summary = monitor(&harness).run().await.unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 2);
        assert!(harness.notifier.alerts().is_empty());
        assert_eq!(harness.checkpoint(ProtocolVersion::V2).await, None);
    }

    #[tokio::test]
    async fn test_transport_error_ends_session() {
        let harness = Harness::new();
        harness.endpoint.script_subscription(vec![
            Ok(notification(&liquidation_log(POOL_V2, Address::repeat_byte(1), N + 1, 0))),
            Err(ChainError::WebSocket("reset by peer".to_string())),
            Ok(notification(&liquidation_log(POOL_V2, Address::repeat_byte(1), N + 2, 0))),
        ]);

        let summary = monitor(&harness).run().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert!(matches!(summary.ended_by, MonitorError::Connection(ChainError::WebSocket(_))));
        assert_eq!(harness.checkpoint(ProtocolVersion::V2).await, Some(N + 1));
    }

    #[tokio::test]
    async fn test_handling_failure_keeps_checkpoint() {
        let harness = Harness::new();
        harness.set_checkpoint(ProtocolVersion::V2, N).await;
        harness.registry.fail_lookups.store(true, Ordering::SeqCst);
        harness.endpoint.script_subscription(vec![Ok(notification(&liquidation_log(
            POOL_V2,
            Address::repeat_byte(1),
            N + 3,
            0,
        )))]);

        let summary = monitor(&harness).run().await.unwrap();

        assert!(matches!(summary.ended_by, MonitorError::Registry(_)));
        assert_eq!(harness.checkpoint(ProtocolVersion::V2).await, Some(N));
    }

    #[tokio::test]
    async fn test_rejected_subscription_is_startup_error() {
        let harness = Harness::new();
        harness
            .endpoint
            .fail_next_subscription(ChainError::SubscriptionRejected("invalid params".to_string()));

        let err = monitor(&harness).run().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
