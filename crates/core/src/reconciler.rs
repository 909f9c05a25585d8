//! Liquidation catch-up.
//!
//! Replays pool logs from the stored checkpoint up to the current head so
//! nothing emitted while the process was down or disconnected is missed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::ChainContext;
use crate::error::{MonitorError, Result};
use crate::liquidation::handle_liquidation;
use crate::types::{LiquidationEvent, PoolDeployment};

/// What one catch-up pass covered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub from_block: u64,
    pub to_block: u64,
    /// Logs returned by the node
    pub logs: usize,
    /// Alerts raised for tracked accounts
    pub notified: usize,
}

/// Catch-up for one pool version.
pub struct Reconciler {
    ctx: Arc<ChainContext>,
    pool: PoolDeployment,
    max_block_range: Option<u64>,
}

impl Reconciler {
    pub fn new(ctx: Arc<ChainContext>, pool: PoolDeployment, max_block_range: Option<u64>) -> Self {
        Self {
            ctx,
            pool,
            max_block_range: max_block_range.filter(|range| *range > 0),
        }
    }

    /// Replay `[checkpoint, head]` and move the checkpoint to `head`.
    ///
    /// Without a checkpoint the range starts at the pool's deployment block.
    /// The checkpoint only moves once every log of a window is handled; a
    /// failure leaves it where the last complete window ended.
    pub async fn run(&self) -> Result<ReconcileReport> {
        let chain = self.ctx.chain;
        let version = self.pool.version;
        let key = self.ctx.checkpoint_key(version);

        let from_block = match self.ctx.store.get(&key).await.map_err(MonitorError::Store)? {
            Some(block) => block,
            None => {
                info!(
                    chain = %chain,
                    version = %version,
                    start_block = self.pool.start_block,
                    "No checkpoint, replaying from deployment block"
                );
                self.pool.start_block
            }
        };

        let latest = self
            .ctx
            .endpoint
            .block_number()
            .await
            .map_err(MonitorError::TransientQuery)?;

        let mut report = ReconcileReport {
            from_block,
            to_block: latest,
            ..Default::default()
        };

        if from_block > latest {
            debug!(
                chain = %chain,
                version = %version,
                checkpoint = from_block,
                latest,
                "Checkpoint ahead of head, nothing to replay"
            );
            return Ok(report);
        }

        let filter = self.pool.liquidation_filter();
        let mut window_start = from_block;

        loop {
            let window_end = match self.max_block_range {
                Some(range) => window_start.saturating_add(range - 1).min(latest),
                None => latest,
            };

            let mut logs = self
                .ctx
                .endpoint
                .get_logs(filter, window_start, window_end)
                .await
                .map_err(MonitorError::TransientQuery)?;
            logs.sort_by_key(|log| (log.block_number, log.log_index));

            debug!(
                chain = %chain,
                version = %version,
                from_block = window_start,
                to_block = window_end,
                count = logs.len(),
                "Replaying liquidation logs"
            );
            report.logs += logs.len();

            for log in logs {
                if log.removed {
                    continue;
                }
                let event = match LiquidationEvent::from_log(chain, version, log) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(
                            chain = %chain,
                            version = %version,
                            error = %e,
                            "Skipping undecodable historical log"
                        );
                        continue;
                    }
                };
                if handle_liquidation(&self.ctx, event).await? {
                    report.notified += 1;
                }
            }

            self.ctx
                .store
                .set(&key, window_end)
                .await
                .map_err(MonitorError::Store)?;

            if window_end >= latest {
                break;
            }
            window_start = window_end + 1;
        }

        info!(
            chain = %chain,
            version = %version,
            from_block = report.from_block,
            to_block = report.to_block,
            logs = report.logs,
            notified = report.notified,
            "Liquidation catch-up complete"
        );

        Ok(report)
    }
}
