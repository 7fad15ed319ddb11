// Snapshot Store Port (Persistence Gateway)

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Key-value blob store holding serialized collections
///
/// The engine only ever reads at startup and writes after a mutation;
/// it never interprets how or where the bytes are kept.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the blob stored under `key`, `None` if absent
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`
    async fn save(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Delete the blob stored under `key` (no-op if absent)
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local snapshot store (tests, ephemeral runs)
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the blob under `key`, for inspecting what was persisted
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(key).cloned())
    }

    /// Seed a blob directly, bypassing the engine
    pub fn put(&self, key: &str, data: impl Into<Vec<u8>>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(key.to_string(), data.into());
        }
    }
}

fn poisoned() -> AppError {
    AppError::Internal("snapshot store lock poisoned".to_string())
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().map_err(|_| poisoned())?;
        Ok(blobs.get(key).cloned())
    }

    async fn save(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs.remove(key);
        Ok(())
    }
}
