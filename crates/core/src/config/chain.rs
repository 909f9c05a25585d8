//! Per-chain endpoints and pool deployments.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use sentinel_chain::ProtocolVersion;

use crate::error::MonitorError;
use crate::types::{Chain, PoolDeployment};

/// One `[[chains]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Network
    pub chain: Chain,
    /// HTTP RPC endpoint; falls back to `<CHAIN>_HTTP_RPC`
    #[serde(default)]
    pub http_rpc: Option<String>,
    /// WebSocket RPC endpoint; falls back to `<CHAIN>_WS_RPC`
    #[serde(default)]
    pub ws_rpc: Option<String>,
    /// Multicall3 deployment (canonical address when unset)
    #[serde(default)]
    pub multicall: Option<Address>,
    /// First `eth_subscribe` parameter for log subscriptions
    #[serde(default = "default_log_subscription_method")]
    pub log_subscription_method: String,
    /// V2 pool, if deployed on this chain
    #[serde(default)]
    pub v2: Option<PoolConfig>,
    /// V3 pool, if deployed on this chain
    #[serde(default)]
    pub v3: Option<PoolConfig>,
}

fn default_log_subscription_method() -> String {
    sentinel_chain::subscription::DEFAULT_LOG_SUBSCRIPTION.to_string()
}

/// Pool deployment for one protocol version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool contract address
    pub pool: Address,
    /// Deployment block, used when no checkpoint exists yet
    #[serde(default)]
    pub start_block: u64,
}

/// Resolved endpoint pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcUrls {
    pub http: String,
    pub ws: String,
}

impl ChainConfig {
    /// Config with no explicit endpoints and no pools.
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            http_rpc: None,
            ws_rpc: None,
            multicall: None,
            log_subscription_method: default_log_subscription_method(),
            v2: None,
            v3: None,
        }
    }

    /// Expand `${VAR}` references in endpoint values.
    pub fn expand_env_vars(&mut self) {
        if let Some(ref mut http) = self.http_rpc {
            *http = expand_env(http);
        }
        if let Some(ref mut ws) = self.ws_rpc {
            *ws = expand_env(ws);
        }
    }

    /// Resolve both endpoints, falling back to the chain's env vars.
    ///
    /// Missing either one is a deployment error.
    pub fn rpc_urls(&self) -> Result<RpcUrls, MonitorError> {
        let http = resolve_endpoint(self.http_rpc.as_deref(), &self.chain.http_rpc_env());
        let ws = resolve_endpoint(self.ws_rpc.as_deref(), &self.chain.ws_rpc_env());

        match (http, ws) {
            (Some(http), Some(ws)) => Ok(RpcUrls { http, ws }),
            (None, _) => Err(MonitorError::Startup(format!(
                "{}: no HTTP RPC endpoint configured (set http_rpc or {})",
                self.chain,
                self.chain.http_rpc_env()
            ))),
            (_, None) => Err(MonitorError::Startup(format!(
                "{}: no WebSocket RPC endpoint configured (set ws_rpc or {})",
                self.chain,
                self.chain.ws_rpc_env()
            ))),
        }
    }

    /// Configured pools in monitoring order.
    pub fn pools(&self) -> Vec<PoolDeployment> {
        ProtocolVersion::ALL
            .iter()
            .filter_map(|version| {
                let pool = match version {
                    ProtocolVersion::V2 => self.v2,
                    ProtocolVersion::V3 => self.v3,
                }?;
                Some(PoolDeployment::new(*version, pool.pool, pool.start_block))
            })
            .collect()
    }
}

/// Explicit value first, then the env var. Empty strings and unexpanded
/// `${VAR}` references count as missing.
fn resolve_endpoint(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured
        .filter(|s| is_usable(s))
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok().filter(|s| is_usable(s)))
}

fn is_usable(endpoint: &str) -> bool {
    !endpoint.trim().is_empty() && !endpoint.contains("${")
}

/// Expand ${VAR_NAME} patterns with environment variable values.
pub(crate) fn expand_env(s: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };
    let mut result = s.to_string();

    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env() {
        // Unique var names, tests run in parallel
        std::env::set_var("SENTINEL_CHAIN_TEST_KEY", "abc123");
        assert_eq!(
            expand_env("https://rpc.example.org/${SENTINEL_CHAIN_TEST_KEY}"),
            "https://rpc.example.org/abc123"
        );
        assert_eq!(expand_env("${SENTINEL_CHAIN_UNSET_VAR}"), "${SENTINEL_CHAIN_UNSET_VAR}");
        assert_eq!(expand_env("no_vars"), "no_vars");
        std::env::remove_var("SENTINEL_CHAIN_TEST_KEY");
    }

    #[test]
    fn test_explicit_endpoints_win() {
        let mut config = ChainConfig::new(Chain::Optimism);
        config.http_rpc = Some("https://op.example.org".to_string());
        config.ws_rpc = Some("wss://op.example.org".to_string());

        let urls = config.rpc_urls().unwrap();
        assert_eq!(urls.http, "https://op.example.org");
        assert_eq!(urls.ws, "wss://op.example.org");
    }

    #[test]
    fn test_env_fallback() {
        std::env::set_var("BASE_HTTP_RPC", "https://base.example.org");
        std::env::set_var("BASE_WS_RPC", "wss://base.example.org");

        let urls = ChainConfig::new(Chain::Base).rpc_urls().unwrap();
        assert_eq!(urls.http, "https://base.example.org");
        assert_eq!(urls.ws, "wss://base.example.org");

        std::env::remove_var("BASE_HTTP_RPC");
        std::env::remove_var("BASE_WS_RPC");
    }

    #[test]
    fn test_missing_ws_endpoint_is_startup_error() {
        let mut config = ChainConfig::new(Chain::Avalanche);
        config.http_rpc = Some("https://avax.example.org".to_string());
        config.ws_rpc = Some("${SENTINEL_CHAIN_NEVER_SET}".to_string());

        let err = config.rpc_urls().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("AVALANCHE_WS_RPC"));
    }

    #[test]
    fn test_pools_skip_missing_versions() {
        let config: ChainConfig = toml::from_str(
            r#"
            chain = "polygon"

            [v3]
            pool = "0x794a61358D6845594F94dc1DB02A252b5b4814aD"
            start_block = 25826028
            "#,
        )
        .unwrap();

        let pools = config.pools();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].version, ProtocolVersion::V3);
        assert_eq!(pools[0].start_block, 25_826_028);
        assert_eq!(config.log_subscription_method, "getLogs");
    }
}
