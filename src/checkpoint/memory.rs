use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore};
use crate::error::PalaverError;

/// In-memory checkpoints for testing and local development.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with a stored checkpoint.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn initialize(&self) -> Result<(), PalaverError> {
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, PalaverError> {
        Ok(self.entries.read().await.get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), PalaverError> {
        self.entries
            .write()
            .await
            .insert(thread_id.to_string(), checkpoint.clone());
        Ok(())
    }
}
