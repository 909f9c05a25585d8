//! In-crate fakes for the monitoring tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{address, Address, Bytes, LogData, B256, U256};
use alloy::rpc::types::Log;
use async_trait::async_trait;
use parking_lot::Mutex;

use sentinel_chain::{ChainEndpoint, ChainError, LogFilter, ProtocolVersion, RawMessageStream};

use crate::accounts::{AccountRegistry, MemoryAccountRegistry};
use crate::context::{ChainContext, Collaborators};
use crate::notifier::{Alert, Notifier};
use crate::store::MemoryCheckpointStore;
use crate::types::{Chain, PoolDeployment, TrackedAccount, TrackedAccountWithThreshold};

pub const POOL_V2: Address = address!("7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9");
pub const POOL_V3: Address = address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2");
pub const V2_START_BLOCK: u64 = 100;
pub const V3_START_BLOCK: u64 = 200;

fn word(addr: Address) -> B256 {
    B256::left_padding_from(addr.as_slice())
}

/// A `LiquidationCall` log as a node would return it.
pub fn liquidation_log(pool: Address, user: Address, block: u64, log_index: u64) -> Log {
    let mut data = Vec::with_capacity(128);
    data.extend_from_slice(&U256::from(1_000u64).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(2_000u64).to_be_bytes::<32>());
    data.extend_from_slice(word(Address::repeat_byte(0xee)).as_slice());
    data.extend_from_slice(&U256::ZERO.to_be_bytes::<32>());

    let inner = alloy::primitives::Log {
        address: pool,
        data: LogData::new_unchecked(
            vec![
                ProtocolVersion::V2.liquidation_topic(),
                word(Address::repeat_byte(0xc0)),
                word(Address::repeat_byte(0xd0)),
                word(user),
            ],
            Bytes::from(data),
        ),
    };

    Log {
        inner,
        block_number: Some(block),
        transaction_hash: Some(B256::from(U256::from(block * 1_000 + log_index))),
        log_index: Some(log_index),
        ..Default::default()
    }
}

/// `eth_subscription` notification frame carrying `log`.
pub fn notification(log: &Log) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "eth_subscription",
        "params": {
            "subscription": "0x9cef478923ff08bf67fde6c64013158d",
            "result": log,
        }
    })
    .to_string()
}

struct ScriptedSubscription {
    latest_block: Option<u64>,
    messages: Vec<Result<String, ChainError>>,
}

/// Chain endpoint answering from scripted state.
#[derive(Default)]
pub struct ScriptedEndpoint {
    latest_block: AtomicU64,
    health_factors: Mutex<HashMap<Address, f64>>,
    failing_users: Mutex<HashSet<Address>>,
    batches: Mutex<Vec<(Address, Vec<Address>)>>,
    logs: Mutex<Vec<Log>>,
    log_queries: Mutex<Vec<(u64, u64)>>,
    failing_log_queries: AtomicUsize,
    failing_from_block: Mutex<Option<u64>>,
    subscriptions: Mutex<VecDeque<Result<ScriptedSubscription, ChainError>>>,
    subscribe_calls: AtomicUsize,
}

impl ScriptedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latest_block(&self, block: u64) {
        self.latest_block.store(block, Ordering::SeqCst);
    }

    pub fn set_health_factor(&self, user: Address, health_factor: f64) {
        self.health_factors.lock().insert(user, health_factor);
    }

    /// Any batch containing `user` fails.
    pub fn fail_batches_containing(&self, user: Address) {
        self.failing_users.lock().insert(user);
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().push(log);
    }

    /// The next `count` historical queries fail.
    pub fn fail_next_log_queries(&self, count: usize) {
        self.failing_log_queries.store(count, Ordering::SeqCst);
    }

    /// Every historical query starting at or after `block` fails.
    pub fn fail_log_queries_from(&self, block: u64) {
        *self.failing_from_block.lock() = Some(block);
    }

    /// Queue a subscription that yields `messages` then closes.
    pub fn script_subscription(&self, messages: Vec<Result<String, ChainError>>) {
        self.subscriptions.lock().push_back(Ok(ScriptedSubscription {
            latest_block: None,
            messages,
        }));
    }

    /// Like [`Self::script_subscription`], moving the chain head to
    /// `latest_block` when the subscription opens.
    pub fn script_subscription_at(&self, latest_block: u64, messages: Vec<Result<String, ChainError>>) {
        self.subscriptions.lock().push_back(Ok(ScriptedSubscription {
            latest_block: Some(latest_block),
            messages,
        }));
    }

    /// Queue a failed subscription attempt.
    pub fn fail_next_subscription(&self, error: ChainError) {
        self.subscriptions.lock().push_back(Err(error));
    }

    pub fn batches(&self) -> Vec<(Address, Vec<Address>)> {
        self.batches.lock().clone()
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.log_queries.lock().clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainEndpoint for ScriptedEndpoint {
    async fn block_number(&self) -> sentinel_chain::Result<u64> {
        Ok(self.latest_block.load(Ordering::SeqCst))
    }

    async fn health_factors(&self, pool: Address, users: &[Address]) -> sentinel_chain::Result<Vec<f64>> {
        self.batches.lock().push((pool, users.to_vec()));

        let failing = self.failing_users.lock();
        if users.iter().any(|user| failing.contains(user)) {
            return Err(ChainError::Contract("execution reverted".to_string()));
        }

        let factors = self.health_factors.lock();
        Ok(users
            .iter()
            .map(|user| factors.get(user).copied().unwrap_or(f64::INFINITY))
            .collect())
    }

    async fn get_logs(&self, filter: LogFilter, from_block: u64, to_block: u64) -> sentinel_chain::Result<Vec<Log>> {
        self.log_queries.lock().push((from_block, to_block));

        let remaining = self.failing_log_queries.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_log_queries.store(remaining - 1, Ordering::SeqCst);
            return Err(ChainError::Transport("query timeout".to_string()));
        }
        if matches!(*self.failing_from_block.lock(), Some(block) if from_block >= block) {
            return Err(ChainError::Transport("block range too large".to_string()));
        }

        Ok(self
            .logs
            .lock()
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                log.address() == filter.address
                    && log.topics().first() == Some(&filter.topic)
                    && (from_block..=to_block).contains(&block)
            })
            .cloned()
            .collect())
    }

    async fn subscribe_logs(&self, _filter: LogFilter) -> sentinel_chain::Result<RawMessageStream> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);

        let next = self.subscriptions.lock().pop_front();
        match next {
            Some(Ok(subscription)) => {
                if let Some(block) = subscription.latest_block {
                    self.set_latest_block(block);
                }
                Ok(Box::pin(futures::stream::iter(subscription.messages)))
            }
            Some(Err(e)) => Err(e),
            None => Err(ChainError::SubscriptionRejected("no scripted subscription left".to_string())),
        }
    }
}

/// Notifier remembering every alert.
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records alerts, then reports a delivery failure.
    pub fn failing() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn low_health_factor_accounts(&self) -> Vec<Address> {
        self.alerts
            .lock()
            .iter()
            .filter_map(|alert| match alert {
                Alert::LowHealthFactor(reading) => Some(reading.account.account.address),
                Alert::Liquidation { .. } => None,
            })
            .collect()
    }

    pub fn liquidated_accounts(&self) -> Vec<Address> {
        self.alerts
            .lock()
            .iter()
            .filter_map(|alert| match alert {
                Alert::Liquidation { account, .. } => Some(account.address),
                Alert::LowHealthFactor(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()> {
        self.alerts.lock().push(alert.clone());
        if self.fail {
            anyhow::bail!("webhook unreachable");
        }
        Ok(())
    }
}

/// Memory registry whose calls can be made to fail.
#[derive(Default)]
pub struct ToggleRegistry {
    pub inner: MemoryAccountRegistry,
    pub fail_listing: AtomicBool,
    pub fail_lookups: AtomicBool,
}

#[async_trait]
impl AccountRegistry for ToggleRegistry {
    async fn tracked_accounts_with_thresholds(
        &self,
        chain: Chain,
    ) -> anyhow::Result<Vec<TrackedAccountWithThreshold>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            anyhow::bail!("registry unavailable");
        }
        self.inner.tracked_accounts_with_thresholds(chain).await
    }

    async fn find_tracked(
        &self,
        chain: Chain,
        version: ProtocolVersion,
        address: Address,
    ) -> anyhow::Result<Option<TrackedAccount>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            anyhow::bail!("registry unavailable");
        }
        self.inner.find_tracked(chain, version, address).await
    }
}

/// Ethereum context with both pools wired to fakes.
pub struct Harness {
    pub ctx: Arc<ChainContext>,
    pub endpoint: Arc<ScriptedEndpoint>,
    pub store: Arc<MemoryCheckpointStore>,
    pub registry: Arc<ToggleRegistry>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::new())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        let endpoint = Arc::new(ScriptedEndpoint::new());
        let store = Arc::new(MemoryCheckpointStore::new());
        let registry = Arc::new(ToggleRegistry::default());
        let notifier = Arc::new(notifier);

        let ctx = Arc::new(ChainContext::new(
            Chain::Ethereum,
            endpoint.clone(),
            vec![
                PoolDeployment::new(ProtocolVersion::V2, POOL_V2, V2_START_BLOCK),
                PoolDeployment::new(ProtocolVersion::V3, POOL_V3, V3_START_BLOCK),
            ],
            Collaborators::new(store.clone(), registry.clone(), notifier.clone()),
        ));

        Self {
            ctx,
            endpoint,
            store,
            registry,
            notifier,
        }
    }

    pub fn track(&self, version: ProtocolVersion, address: Address, threshold: f64) {
        self.registry
            .inner
            .track(TrackedAccount::new(Chain::Ethereum, version, address), threshold);
    }

    pub fn pool(&self, version: ProtocolVersion) -> PoolDeployment {
        match version {
            ProtocolVersion::V2 => PoolDeployment::new(version, POOL_V2, V2_START_BLOCK),
            ProtocolVersion::V3 => PoolDeployment::new(version, POOL_V3, V3_START_BLOCK),
        }
    }

    pub async fn checkpoint(&self, version: ProtocolVersion) -> Option<u64> {
        use crate::store::CheckpointStore;
        self.store
            .get(&self.ctx.checkpoint_key(version))
            .await
            .unwrap()
    }

    pub async fn set_checkpoint(&self, version: ProtocolVersion, block: u64) {
        use crate::store::CheckpointStore;
        self.store
            .set(&self.ctx.checkpoint_key(version), block)
            .await
            .unwrap();
    }
}
