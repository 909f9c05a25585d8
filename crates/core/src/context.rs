//! Per-chain context shared by every monitoring task of one chain.

use std::sync::Arc;

use sentinel_chain::{ChainEndpoint, ProtocolVersion};

use crate::accounts::AccountRegistry;
use crate::notifier::Notifier;
use crate::store::CheckpointStore;
use crate::types::{Chain, CheckpointKey, PoolDeployment};

/// Externally provided collaborators, shared across chains.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn CheckpointStore>,
    pub registry: Arc<dyn AccountRegistry>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        registry: Arc<dyn AccountRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            registry,
            notifier,
        }
    }
}

/// Everything one chain's tasks need: its endpoint, its pools and the
/// collaborators.
pub struct ChainContext {
    pub chain: Chain,
    pub endpoint: Arc<dyn ChainEndpoint>,
    pub pools: Vec<PoolDeployment>,
    pub store: Arc<dyn CheckpointStore>,
    pub registry: Arc<dyn AccountRegistry>,
    pub notifier: Arc<dyn Notifier>,
}

impl ChainContext {
    pub fn new(
        chain: Chain,
        endpoint: Arc<dyn ChainEndpoint>,
        pools: Vec<PoolDeployment>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            chain,
            endpoint,
            pools,
            store: collaborators.store,
            registry: collaborators.registry,
            notifier: collaborators.notifier,
        }
    }

    pub fn checkpoint_key(&self, version: ProtocolVersion) -> CheckpointKey {
        CheckpointKey::new(self.chain, version)
    }

    /// Pool deployment for `version`, if configured on this chain.
    pub fn pool(&self, version: ProtocolVersion) -> Option<&PoolDeployment> {
        self.pools.iter().find(|pool| pool.version == version)
    }
}
