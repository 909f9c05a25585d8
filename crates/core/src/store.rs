//! Checkpoint store: last fully processed block per (chain, version).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::types::CheckpointKey;

/// Keyed block number persistence.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last processed block, or `None` on first run.
    async fn get(&self, key: &CheckpointKey) -> Result<Option<u64>>;

    /// Record `block` as fully processed.
    async fn set(&self, key: &CheckpointKey, block: u64) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    blocks: DashMap<CheckpointKey, u64>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, key: &CheckpointKey) -> Result<Option<u64>> {
        Ok(self.blocks.get(key).map(|entry| *entry))
    }

    async fn set(&self, key: &CheckpointKey, block: u64) -> Result<()> {
        self.blocks.insert(*key, block);
        Ok(())
    }
}

/// JSON file mapping `LAST_<CHAIN>_<VERSION>_CHECKED_BLOCK` to a block number.
///
/// Each write replaces the file through a temp file and a rename, so a crash
/// leaves either the old or the new content. File I/O runs on the blocking
/// pool; `write_lock` keeps snapshots landing in the order they were taken.
#[derive(Debug)]
pub struct JsonFileCheckpointStore {
    path: Arc<PathBuf>,
    blocks: Mutex<BTreeMap<String, u64>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileCheckpointStore {
    /// Open the store, reading existing checkpoints if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let blocks = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read checkpoints from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Corrupt checkpoint file {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = blocks.len(), "Checkpoint store opened");

        Ok(Self {
            path: Arc::new(path),
            blocks: Mutex::new(blocks),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }
}

fn persist(path: &Path, blocks: &BTreeMap<String, u64>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(blocks)?;
    std::fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn get(&self, key: &CheckpointKey) -> Result<Option<u64>> {
        Ok(self.blocks.lock().get(&key.to_string()).copied())
    }

    async fn set(&self, key: &CheckpointKey, block: u64) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let name = key.to_string();

        let (previous, snapshot) = {
            let mut blocks = self.blocks.lock();
            let previous = blocks.insert(name.clone(), block);
            (previous, blocks.clone())
        };

        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || persist(&path, &snapshot))
            .await
            .context("Checkpoint write task failed")
            .and_then(|result| result);

        if let Err(e) = written {
            let mut blocks = self.blocks.lock();
            match previous {
                Some(prev) => blocks.insert(name, prev),
                None => blocks.remove(&name),
            };
            return Err(e);
        }
        Ok(())
    }
}
