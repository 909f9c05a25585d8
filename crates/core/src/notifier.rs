//! Alert delivery.
//!
//! Delivery is best-effort: the monitoring loops log failures and move on.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use sentinel_notify::{AlertKind, AlertPayload, WebhookClient};

use crate::types::{HealthFactorReading, LiquidationEvent, TrackedAccount};

/// Something worth telling an operator about.
#[derive(Debug, Clone)]
pub enum Alert {
    /// Health factor strictly below the account's threshold.
    LowHealthFactor(HealthFactorReading),
    /// A tracked account was liquidated.
    Liquidation {
        account: TrackedAccount,
        event: LiquidationEvent,
    },
}

impl Alert {
    pub fn account(&self) -> &TrackedAccount {
        match self {
            Self::LowHealthFactor(reading) => &reading.account.account,
            Self::Liquidation { account, .. } => account,
        }
    }

    /// Webhook body for this alert.
    pub fn to_payload(&self) -> AlertPayload {
        let account = self.account();
        let kind = match self {
            Self::LowHealthFactor(reading) => AlertKind::LowHealthFactor {
                health_factor: reading.health_factor,
                threshold: reading.account.health_factor_threshold,
            },
            Self::Liquidation { event, .. } => AlertKind::Liquidation {
                block_number: event.block_number,
                tx_hash: event.call.tx_hash,
                collateral_asset: event.call.collateral_asset,
                debt_asset: event.call.debt_asset,
                liquidator: event.call.liquidator,
            },
        };

        AlertPayload::new(
            account.chain.name(),
            account.version.as_str(),
            account.address,
            kind,
        )
    }
}

/// Alert sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Send an alert, logging instead of propagating failures.
pub(crate) async fn deliver(notifier: &dyn Notifier, alert: &Alert) {
    if let Err(e) = notifier.notify(alert).await {
        let account = alert.account();
        warn!(
            chain = %account.chain,
            version = %account.version,
            account = %account.address,
            error = %e,
            "Alert delivery failed"
        );
    }
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()> {
        match alert {
            Alert::LowHealthFactor(reading) => {
                let account = &reading.account.account;
                warn!(
                    chain = %account.chain,
                    version = %account.version,
                    account = %account.address,
                    health_factor = reading.health_factor,
                    threshold = reading.account.health_factor_threshold,
                    "Health factor below threshold"
                );
            }
            Alert::Liquidation { account, event } => {
                warn!(
                    chain = %account.chain,
                    version = %account.version,
                    account = %account.address,
                    block = event.block_number,
                    tx = %event.call.tx_hash,
                    liquidator = %event.call.liquidator,
                    "Tracked account liquidated"
                );
            }
        }
        Ok(())
    }
}

/// Posts alerts to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: WebhookClient,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: WebhookClient::new(url)?,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()> {
        self.client.send(&alert.to_payload()).await
    }
}

/// Forwards each alert to every inner notifier.
///
/// One failing sink does not stop the others; the first error is returned.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()> {
        let results = futures::future::join_all(
            self.notifiers.iter().map(|notifier| notifier.notify(alert)),
        )
        .await;

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(sinks = self.notifiers.len(), "Alert fanned out");
                Ok(())
            }
        }
    }
}
