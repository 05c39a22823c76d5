//! Checkpoint file wrapper for storage-agnostic serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Checkpoint, StoredCheckpoint, SyncPhase};

/// Storage-agnostic checkpoint file wrapper.
///
/// This struct wraps stream-specific checkpoints with metadata
/// for storage and retrieval. The format is:
/// - Self-describing (includes `stream` field)
/// - Extensible (uses JSON Value for checkpoint data)
///
/// # File Format
///
/// ```json
/// {
///     "stream": "poaps_xdai",
///     "checkpoint": { "created": 1650000000 },
///     "phase": "PageCommitted",
///     "created_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Stream identifier (e.g., "poaps_xdai")
    pub stream: String,
    /// Serialized checkpoint data as JSON Value
    pub checkpoint: serde_json::Value,
    /// Sync phase when this checkpoint was created
    pub phase: SyncPhase,
    /// Timestamp when this checkpoint file was created
    pub created_at: DateTime<Utc>,
}

impl CheckpointFile {
    /// Create new checkpoint file from a stream-specific checkpoint.
    pub fn new<C: Checkpoint>(checkpoint: &C, phase: SyncPhase) -> anyhow::Result<Self> {
        Ok(Self {
            stream: C::STREAM_NAME.to_string(),
            checkpoint: serde_json::to_value(checkpoint)?,
            phase,
            created_at: Utc::now(),
        })
    }

    /// Rebuild a checkpoint file from its stored representation.
    pub fn from_stored(stored: StoredCheckpoint) -> anyhow::Result<Self> {
        Ok(Self {
            checkpoint: serde_json::from_str(&stored.checkpoint_data)?,
            phase: stored.phase.parse()?,
            stream: stored.stream,
            created_at: stored.created_at,
        })
    }

    /// Parse checkpoint into a stream-specific type.
    ///
    /// Validates that the stored `stream` matches `C::STREAM_NAME`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The `stream` doesn't match `C::STREAM_NAME`
    /// - The checkpoint data can't be deserialized into type `C`
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.stream != C::STREAM_NAME {
            anyhow::bail!(
                "Checkpoint type mismatch: expected '{}', found '{}'",
                C::STREAM_NAME,
                self.stream
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }

    /// Get the stream name of this checkpoint file.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Get the phase when this checkpoint was created.
    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    /// Get the timestamp when this checkpoint file was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
