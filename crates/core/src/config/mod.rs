//! Configuration for the chain monitors.
//!
//! - Monitor parameters (polling interval, batch size, reconnect backoff)
//! - Chain configuration (RPC endpoints, pool deployments)
//! - File loader tying everything together

mod chain;
mod loader;
mod monitor;

pub use chain::{ChainConfig, PoolConfig, RpcUrls};
pub use loader::{
    NotifierConfig, RegistryConfig, SentinelConfig, StoreConfig, DEFAULT_CONFIG_PATH,
};
pub use monitor::MonitorConfig;
