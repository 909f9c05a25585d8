//! Webhook client posting alert payloads as JSON.

use std::time::Duration;

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Default request timeout for webhook deliveries.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// What triggered the alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    /// Health factor dropped below the account's threshold.
    LowHealthFactor { health_factor: f64, threshold: f64 },
    /// The account was liquidated on-chain.
    Liquidation {
        block_number: u64,
        tx_hash: B256,
        collateral_asset: Address,
        debt_asset: Address,
        liquidator: Address,
    },
}

/// JSON body posted to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    /// Chain name (e.g. "ETHEREUM")
    pub chain: String,
    /// Pool version tag (e.g. "V3")
    pub protocol_version: String,
    /// Tracked account
    pub account: Address,
    /// Alert details
    #[serde(flatten)]
    pub kind: AlertKind,
    /// When the alert was raised
    pub raised_at: DateTime<Utc>,
}

impl AlertPayload {
    pub fn new(
        chain: impl Into<String>,
        protocol_version: impl Into<String>,
        account: Address,
        kind: AlertKind,
    ) -> Self {
        Self {
            chain: chain.into(),
            protocol_version: protocol_version.into(),
            account,
            kind,
            raised_at: Utc::now(),
        }
    }
}

/// HTTP webhook client.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
}

impl WebhookClient {
    /// Create a client posting to `url`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Post an alert. Non-2xx responses are errors.
    #[instrument(skip(self, payload), fields(account = %payload.account, chain = %payload.chain))]
    pub async fn send(&self, payload: &AlertPayload) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Failed to reach webhook {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Webhook {} answered {}", self.url, status);
        }

        debug!(status = %status, "Alert delivered");
        Ok(())
    }
}
