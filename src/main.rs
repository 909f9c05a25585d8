//! Lending Pool Sentinel
//!
//! Watches lending pools on one or more EVM chains and alerts when:
//! - a tracked account's health factor drops below its threshold
//! - a tracked account is liquidated
//!
//! Liquidations are followed over WebSocket subscriptions with checkpointed
//! catch-up, so restarts and disconnects never leave a gap.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sentinel_core::{
    ChainMonitor, Collaborators, FanoutNotifier, FileAccountRegistry, JsonFileCheckpointStore,
    LogNotifier, Notifier, SentinelConfig, WebhookNotifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    // SENTINEL_CONFIG selects the file, default config/sentinel.toml
    let config = SentinelConfig::from_env()?;
    config.monitor.log_config();

    let collaborators = build_collaborators(&config)?;

    let mut monitors = JoinSet::new();
    for chain_config in &config.chains {
        match ChainMonitor::new(chain_config, config.monitor.clone(), collaborators.clone()) {
            Ok(monitor) => {
                info!(
                    chain = %chain_config.chain,
                    pools = chain_config.pools().len(),
                    "Chain monitor configured"
                );
                monitors.spawn(monitor.run());
            }
            // Does not stop the other chains
            Err(e) => error!(chain = %chain_config.chain, error = %e, "Chain monitor failed to start"),
        }
    }

    if monitors.is_empty() {
        anyhow::bail!("No chain monitor could be started");
    }

    info!(chains = monitors.len(), "Sentinel running");

    while let Some(result) = monitors.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Chain monitor task failed");
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sentinel_core=debug,sentinel_chain=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn build_collaborators(config: &SentinelConfig) -> Result<Collaborators> {
    let store = Arc::new(
        JsonFileCheckpointStore::open(&config.store.checkpoint_path)
            .context("Failed to open checkpoint store")?,
    );
    info!(path = %config.store.checkpoint_path.display(), "Checkpoint store ready");

    let registry = Arc::new(FileAccountRegistry::new(&config.registry.accounts_path));
    info!(path = %config.registry.accounts_path.display(), "Account registry configured");

    let mut notifier = FanoutNotifier::new(vec![Arc::new(LogNotifier)]);
    if let Some(url) = &config.notifier.webhook_url {
        notifier.push(Arc::new(
            WebhookNotifier::new(url.clone()).context("Failed to build webhook notifier")?,
        ));
        info!("Webhook notifier enabled");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);

    Ok(Collaborators::new(store, registry, notifier))
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╔═╗┌─┐┌┐┌┌┬┐┬┌┐┌┌─┐┬
    ╚═╗├┤ │││ │ ││││├┤ │
    ╚═╝└─┘┘└┘ ┴ ┴┘└┘└─┘┴─┘
    Lending Pool Sentinel v0.1.0
    "#
    );
}
