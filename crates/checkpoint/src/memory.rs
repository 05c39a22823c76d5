//! In-memory checkpoint storage.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::{CheckpointID, CheckpointStore, StoredCheckpoint};
use crate::CheckpointFile;

/// Process-local CheckpointStore.
///
/// Nothing survives the process. Used by tests and by `sync --dry-run`,
/// where the run resumes from the checkpoint directory's files (see
/// [`from_files`](Self::from_files)) without ever writing to it.
#[derive(Default)]
pub struct MemoryStore {
    checkpoints: Mutex<HashMap<CheckpointID, StoredCheckpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with checkpoint files read elsewhere.
    ///
    /// `created_at` is kept, so the latest-checkpoint lookup sees the same
    /// order it would see against the original store.
    pub fn from_files(files: impl IntoIterator<Item = CheckpointFile>) -> Result<Self> {
        let mut checkpoints = HashMap::new();
        for file in files {
            let id = CheckpointID {
                stream: file.stream.clone(),
                phase: file.phase.as_str().to_string(),
            };
            let stored = StoredCheckpoint {
                checkpoint_data: serde_json::to_string(&file.checkpoint)?,
                stream: file.stream,
                phase: id.phase.clone(),
                created_at: file.created_at,
            };
            checkpoints.insert(id, stored);
        }
        Ok(Self {
            checkpoints: Mutex::new(checkpoints),
        })
    }

    /// Number of stored checkpoints.
    pub fn len(&self) -> usize {
        self.checkpoints.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn store_checkpoint(&self, id: &CheckpointID, checkpoint_data: String) -> Result<()> {
        let stored = StoredCheckpoint {
            checkpoint_data,
            stream: id.stream.clone(),
            phase: id.phase.clone(),
            created_at: Utc::now(),
        };
        self.checkpoints
            .lock()
            .map_err(|_| anyhow::anyhow!("Checkpoint store lock poisoned"))?
            .insert(id.clone(), stored);
        Ok(())
    }

    async fn read_checkpoint(&self, id: &CheckpointID) -> Result<Option<StoredCheckpoint>> {
        Ok(self
            .checkpoints
            .lock()
            .map_err(|_| anyhow::anyhow!("Checkpoint store lock poisoned"))?
            .get(id)
            .cloned())
    }
}
