//! Periodic health factor polling.
//!
//! Each cycle lists the chain's tracked accounts, partitions them by pool
//! version, queries health factors in fixed-size batches and alerts on every
//! reading strictly below its account's threshold.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use sentinel_chain::ProtocolVersion;

use crate::context::ChainContext;
use crate::notifier::{deliver, Alert};
use crate::types::{HealthFactorReading, TrackedAccountWithThreshold};

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Accounts listed by the registry
    pub accounts: usize,
    /// Accounts whose health factor was read
    pub evaluated: usize,
    /// Alerts raised
    pub alerts: usize,
    /// Batches skipped after a failed query
    pub failed_batches: usize,
}

/// Health factor loop for one chain.
/// Shortest accepted polling interval.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct HealthFactorPoller {
    ctx: Arc<ChainContext>,
    interval: Duration,
    batch_size: usize,
}

impl HealthFactorPoller {
    pub fn new(ctx: Arc<ChainContext>, interval: Duration, batch_size: usize) -> Self {
        Self {
            ctx,
            interval: interval.max(MIN_INTERVAL),
            batch_size: batch_size.max(1),
        }
    }

    /// Run cycles forever. A cycle always completes before the next starts.
    pub async fn run(&self) {
        info!(
            chain = %self.ctx.chain,
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Starting health factor polling"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One full pass over the tracked accounts.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        let accounts = match self
            .ctx
            .registry
            .tracked_accounts_with_thresholds(self.ctx.chain)
            .await
        {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(chain = %self.ctx.chain, error = %e, "Failed to list tracked accounts");
                return report;
            }
        };
        report.accounts = accounts.len();

        for version in ProtocolVersion::ALL {
            let partition: Vec<TrackedAccountWithThreshold> = accounts
                .iter()
                .filter(|a| a.account.version == version && a.account.chain == self.ctx.chain)
                .copied()
                .collect();
            if partition.is_empty() {
                continue;
            }

            let Some(pool) = self.ctx.pool(version) else {
                warn!(
                    chain = %self.ctx.chain,
                    version = %version,
                    accounts = partition.len(),
                    "Accounts tracked on a pool version not configured for this chain"
                );
                continue;
            };

            for batch in partition.chunks(self.batch_size) {
                self.check_batch(pool.pool, version, batch, &mut report).await;
            }
        }

        info!(
            chain = %self.ctx.chain,
            accounts = report.accounts,
            evaluated = report.evaluated,
            alerts = report.alerts,
            failed_batches = report.failed_batches,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Health factor cycle complete"
        );

        report
    }

    async fn check_batch(
        &self,
        pool: alloy::primitives::Address,
        version: ProtocolVersion,
        batch: &[TrackedAccountWithThreshold],
        report: &mut CycleReport,
    ) {
        let users: Vec<_> = batch.iter().map(|a| a.account.address).collect();

        let health_factors = match self.ctx.endpoint.health_factors(pool, &users).await {
            Ok(hfs) if hfs.len() == batch.len() => hfs,
            Ok(hfs) => {
                warn!(
                    chain = %self.ctx.chain,
                    version = %version,
                    expected = batch.len(),
                    got = hfs.len(),
                    "Health factor batch returned wrong number of results, skipping"
                );
                report.failed_batches += 1;
                return;
            }
            Err(e) => {
                warn!(
                    chain = %self.ctx.chain,
                    version = %version,
                    size = batch.len(),
                    error = %e,
                    "Health factor batch failed, skipping"
                );
                report.failed_batches += 1;
                return;
            }
        };

        debug!(chain = %self.ctx.chain, version = %version, size = batch.len(), "Batch evaluated");

        for (account, health_factor) in batch.iter().zip(health_factors) {
            report.evaluated += 1;
            let reading = HealthFactorReading {
                account: *account,
                health_factor,
            };
            if reading.is_below_threshold() {
                report.alerts += 1;
                deliver(self.ctx.notifier.as_ref(), &Alert::LowHealthFactor(reading)).await;
            }
        }
    }
}
