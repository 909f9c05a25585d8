//! Chain monitor: composition root for one chain.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use sentinel_chain::{ChainEndpoint, RpcEndpoint};

use crate::config::{ChainConfig, MonitorConfig};
use crate::context::{ChainContext, Collaborators};
use crate::error::{MonitorError, Result};
use crate::live::LiveMonitor;
use crate::poller::HealthFactorPoller;
use crate::reconciler::Reconciler;
use crate::supervisor::{Backoff, VersionSupervisor};
use crate::types::{Chain, PoolDeployment};

/// Owns every monitoring task of one chain: a supervisor per pool version and
/// the health factor poller.
pub struct ChainMonitor {
    ctx: Arc<ChainContext>,
    settings: MonitorConfig,
}

impl ChainMonitor {
    /// Build a monitor backed by the chain's RPC endpoints.
    ///
    /// Fails with [`MonitorError::Startup`] when either endpoint is missing or
    /// malformed.
    pub fn new(
        config: &ChainConfig,
        settings: MonitorConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let urls = config.rpc_urls()?;

        let mut endpoint = RpcEndpoint::new(&urls.http, &urls.ws)
            .map_err(|e| MonitorError::Startup(format!("{}: {e}", config.chain)))?
            .with_log_subscription(config.log_subscription_method.clone());
        if let Some(multicall) = config.multicall {
            endpoint = endpoint.with_multicall(multicall);
        }

        let pools = config.pools();
        if pools.is_empty() {
            return Err(MonitorError::Startup(format!(
                "{}: no pool deployment configured",
                config.chain
            )));
        }

        Ok(Self::with_endpoint(
            config.chain,
            Arc::new(endpoint),
            pools,
            settings,
            collaborators,
        ))
    }

    /// Build a monitor over any endpoint implementation.
    pub fn with_endpoint(
        chain: Chain,
        endpoint: Arc<dyn ChainEndpoint>,
        pools: Vec<PoolDeployment>,
        settings: MonitorConfig,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            ctx: Arc::new(ChainContext::new(chain, endpoint, pools, collaborators)),
            settings,
        }
    }

    pub fn chain(&self) -> Chain {
        self.ctx.chain
    }

    /// Start every task and wait for them.
    ///
    /// Tasks run independently: a version stopped by a fatal error does not
    /// affect the other version or the poller, which never ends on its own.
    pub async fn run(self) {
        let chain = self.ctx.chain;
        let mut tasks = JoinSet::new();

        for pool in self.ctx.pools.iter().copied() {
            let supervisor = VersionSupervisor::new(
                Reconciler::new(self.ctx.clone(), pool, self.settings.max_log_block_range),
                LiveMonitor::new(self.ctx.clone(), pool),
                Backoff::new(
                    self.settings.reconnect_initial_delay(),
                    self.settings.reconnect_max_delay(),
                ),
                format!("{chain}/{}", pool.version),
            );
            info!(chain = %chain, version = %pool.version, pool = %pool.pool, "Starting liquidation monitoring");

            tasks.spawn(async move {
                let err = supervisor.run().await;
                error!(
                    chain = %chain,
                    version = %pool.version,
                    error = %err,
                    "Liquidation monitoring stopped"
                );
            });
        }

        let poller = HealthFactorPoller::new(
            self.ctx.clone(),
            self.settings.health_factor_interval(),
            self.settings.health_factor_batch_size,
        );
        tasks.spawn(async move { poller.run().await });

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(chain = %chain, error = %e, "Monitoring task panicked");
            }
        }
    }
}
