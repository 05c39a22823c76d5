//! Filesystem-based checkpoint storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;

use crate::store::{CheckpointID, CheckpointStore, StoredCheckpoint};

/// Filesystem implementation of CheckpointStore trait.
///
/// Keeps exactly one JSON file per stream and phase,
/// `checkpoint_{stream}_{phase}.json`. Each write goes to a temporary
/// sibling first and is renamed into place, so a reader never observes a
/// half-written checkpoint.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Create a new FilesystemStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &CheckpointID) -> PathBuf {
        self.dir
            .join(format!("checkpoint_{}_{}.json", id.stream, id.phase))
    }
}

#[async_trait]
impl CheckpointStore for FilesystemStore {
    async fn store_checkpoint(&self, id: &CheckpointID, checkpoint_data: String) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create checkpoint directory {}", self.dir.display())
        })?;

        let stored = StoredCheckpoint {
            checkpoint_data,
            stream: id.stream.clone(),
            phase: id.phase.clone(),
            created_at: Utc::now(),
        };

        let filename = self.path_for(id);
        let tmp = filename.with_extension("json.tmp");

        std::fs::write(&tmp, serde_json::to_string_pretty(&stored)?)
            .with_context(|| format!("Failed to write checkpoint {}", tmp.display()))?;
        std::fs::rename(&tmp, &filename)
            .with_context(|| format!("Failed to move checkpoint into {}", filename.display()))?;

        tracing::debug!("Stored checkpoint to {}", filename.display());
        Ok(())
    }

    async fn read_checkpoint(&self, id: &CheckpointID) -> Result<Option<StoredCheckpoint>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;
        let stored = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt checkpoint file {}", path.display()))?;
        Ok(Some(stored))
    }
}
