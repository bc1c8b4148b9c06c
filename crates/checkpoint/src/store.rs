//! Checkpoint storage trait and the in-memory backend.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::CheckpointFile;

/// Identifies the single active checkpoint of a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointID {
    /// Source type (e.g., "jsonl")
    pub source_type: String,
    /// Capture session name (e.g., a replication slot)
    pub session: String,
}

impl CheckpointID {
    pub fn new(source_type: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            session: session.into(),
        }
    }
}

impl std::fmt::Display for CheckpointID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source_type, self.session)
    }
}

/// Trait for checkpoint storage operations.
///
/// `store_checkpoint` replaces whatever was stored under the same id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn store_checkpoint(&self, id: &CheckpointID, file: &CheckpointFile) -> Result<()>;

    /// Returns None if nothing is stored under `id`.
    async fn read_checkpoint(&self, id: &CheckpointID) -> Result<Option<CheckpointFile>>;

    /// Forget the checkpoint stored under `id`, if any.
    async fn clear_checkpoint(&self, id: &CheckpointID) -> Result<()>;
}

/// Process-local checkpoint storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<CheckpointID, CheckpointFile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CheckpointID, CheckpointFile>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("checkpoint memory store lock poisoned"))
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn store_checkpoint(&self, id: &CheckpointID, file: &CheckpointFile) -> Result<()> {
        self.lock()?.insert(id.clone(), file.clone());
        Ok(())
    }

    async fn read_checkpoint(&self, id: &CheckpointID) -> Result<Option<CheckpointFile>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn clear_checkpoint(&self, id: &CheckpointID) -> Result<()> {
        self.lock()?.remove(id);
        Ok(())
    }
}
