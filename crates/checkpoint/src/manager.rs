//! Generic sync manager for checkpoint operations.

use std::sync::Arc;

use crate::{
    store::CheckpointStore, Checkpoint, CheckpointFile, CheckpointID, CheckpointStorage,
    FilesystemStore, SyncConfig, SyncPhase,
};

/// Manager for handling sync operations with checkpoint tracking.
///
/// The `SyncManager` provides storage-agnostic checkpoint management on top
/// of whichever `CheckpointStore` the configuration selects.
///
/// # Example
///
/// ```rust,ignore
/// use checkpoint::{SyncConfig, SyncManager, SyncPhase};
///
/// let config = SyncConfig::incremental_with_checkpoints("/tmp/checkpoints".into());
/// let manager = SyncManager::new(config);
///
/// // Save a checkpoint
/// let checkpoint = PoapsXdaiCheckpoint { created: 1650000000 };
/// manager.emit_checkpoint(&checkpoint, SyncPhase::PageCommitted).await?;
///
/// // Load whichever checkpoint was written last
/// let loaded: Option<PoapsXdaiCheckpoint> = manager.read_latest_checkpoint().await?;
/// ```
pub struct SyncManager {
    config: SyncConfig,
    store: Option<Arc<dyn CheckpointStore>>,
}

impl SyncManager {
    /// Create a new sync manager, building the store the configuration names.
    pub fn new(config: SyncConfig) -> Self {
        let store: Option<Arc<dyn CheckpointStore>> = match &config.checkpoint_storage {
            CheckpointStorage::Disabled => None,
            CheckpointStorage::Filesystem { dir } => Some(Arc::new(FilesystemStore::new(dir))),
        };
        Self { config, store }
    }

    /// Create a sync manager on top of an explicit store.
    pub fn with_store(config: SyncConfig, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            config,
            store: Some(store),
        }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Emit checkpoint for any stream-specific checkpoint type.
    ///
    /// This is a **SAVING** operation. A no-op when `emit_checkpoints` is false.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Checkpoint storage is disabled while emission is requested
    /// - Failed to write checkpoint
    pub async fn emit_checkpoint<C: Checkpoint>(
        &self,
        checkpoint: &C,
        phase: SyncPhase,
    ) -> anyhow::Result<()> {
        if !self.config.emit_checkpoints {
            return Ok(());
        }

        let store = self.store.as_ref().ok_or_else(|| {
            anyhow::anyhow!("No checkpoint directory configured (checkpoint storage is disabled)")
        })?;

        let id = CheckpointID {
            stream: C::STREAM_NAME.to_string(),
            phase: phase.as_str().to_string(),
        };
        store
            .store_checkpoint(&id, serde_json::to_string(checkpoint)?)
            .await?;

        tracing::info!(
            "Emitted {} checkpoint for {}: {}",
            phase,
            C::STREAM_NAME,
            checkpoint.to_cli_string()
        );

        Ok(())
    }

    /// Read the checkpoint file stored for a stream and phase, if any.
    pub async fn read_checkpoint_file(
        &self,
        stream: &str,
        phase: SyncPhase,
    ) -> anyhow::Result<Option<CheckpointFile>> {
        let Some(store) = self.store.as_ref() else {
            return Ok(None);
        };

        let id = CheckpointID {
            stream: stream.to_string(),
            phase: phase.as_str().to_string(),
        };
        match store.read_checkpoint(&id).await? {
            Some(stored) => Ok(Some(CheckpointFile::from_stored(stored)?)),
            None => Ok(None),
        }
    }

    /// Read and parse the checkpoint of one phase.
    ///
    /// This is a **LOADING** operation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No checkpoint is stored for the phase
    /// - Checkpoint stream doesn't match `C::STREAM_NAME`
    /// - Failed to deserialize checkpoint data
    pub async fn read_checkpoint<C: Checkpoint>(&self, phase: SyncPhase) -> anyhow::Result<C> {
        let file = self
            .read_checkpoint_file(C::STREAM_NAME, phase.clone())
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("No checkpoint found for {} phase: {phase}", C::STREAM_NAME)
            })?;
        file.parse::<C>()
    }

    /// Read the most recently written checkpoint of a stream across all phases.
    ///
    /// Returns `Ok(None)` when nothing is stored or storage is disabled.
    pub async fn read_latest_checkpoint<C: Checkpoint>(&self) -> anyhow::Result<Option<C>> {
        let mut latest: Option<CheckpointFile> = None;

        for phase in [SyncPhase::PageCommitted, SyncPhase::RunComplete] {
            if let Some(file) = self.read_checkpoint_file(C::STREAM_NAME, phase).await? {
                let newer = latest
                    .as_ref()
                    .map(|current| file.created_at >= current.created_at)
                    .unwrap_or(true);
                if newer {
                    latest = Some(file);
                }
            }
        }

        latest.map(|file| file.parse::<C>()).transpose()
    }
}
