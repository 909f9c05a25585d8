//! Runtime timing and batching parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters shared by every chain monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Delay between health factor cycles (seconds)
    #[serde(default = "default_health_factor_interval")]
    pub health_factor_interval_secs: u64,

    /// Accounts per health factor query
    #[serde(default = "default_health_factor_batch_size")]
    pub health_factor_batch_size: usize,

    /// First reconnect delay after a lost subscription (milliseconds)
    #[serde(default = "default_reconnect_initial_delay")]
    pub reconnect_initial_delay_ms: u64,

    /// Upper bound for the reconnect delay (milliseconds)
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,

    /// Split historical log queries into windows of this many blocks.
    /// Unset means one query per catch-up.
    #[serde(default)]
    pub max_log_block_range: Option<u64>,
}

fn default_health_factor_interval() -> u64 {
    60
}
fn default_health_factor_batch_size() -> usize {
    100
}
fn default_reconnect_initial_delay() -> u64 {
    1_000
}
fn default_reconnect_max_delay() -> u64 {
    60_000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_factor_interval_secs: default_health_factor_interval(),
            health_factor_batch_size: default_health_factor_batch_size(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
            max_log_block_range: None,
        }
    }
}

impl MonitorConfig {
    pub fn health_factor_interval(&self) -> Duration {
        Duration::from_secs(self.health_factor_interval_secs)
    }
    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_delay_ms)
    }
    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    /// Reject values the loops cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.health_factor_batch_size == 0 {
            anyhow::bail!("monitor.health_factor_batch_size must be at least 1");
        }
        if self.health_factor_interval_secs == 0 {
            anyhow::bail!("monitor.health_factor_interval_secs must be at least 1");
        }
        if self.max_log_block_range == Some(0) {
            anyhow::bail!("monitor.max_log_block_range must be at least 1 when set");
        }
        if self.reconnect_initial_delay_ms == 0 {
            anyhow::bail!("monitor.reconnect_initial_delay_ms must be at least 1");
        }
        if self.reconnect_initial_delay_ms > self.reconnect_max_delay_ms {
            anyhow::bail!(
                "monitor.reconnect_initial_delay_ms ({}) exceeds reconnect_max_delay_ms ({})",
                self.reconnect_initial_delay_ms,
                self.reconnect_max_delay_ms
            );
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(
            interval_secs = self.health_factor_interval_secs,
            batch_size = self.health_factor_batch_size,
            "Health factor polling"
        );
        tracing::info!(
            initial_ms = self.reconnect_initial_delay_ms,
            max_ms = self.reconnect_max_delay_ms,
            max_log_block_range = ?self.max_log_block_range,
            "Liquidation monitoring"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.health_factor_interval(), Duration::from_secs(60));
        assert_eq!(config.health_factor_batch_size, 100);
        assert!(config.max_log_block_range.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_table_uses_defaults() {
        let config: MonitorConfig = toml::from_str("health_factor_batch_size = 25").unwrap();
        assert_eq!(config.health_factor_batch_size, 25);
        assert_eq!(config.health_factor_interval_secs, 60);
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = MonitorConfig {
            health_factor_batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_reconnect_delay_rejected() {
        let config = MonitorConfig {
            reconnect_initial_delay_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reconnect_initial_delay_ms"));
    }
}
