//! Checkpoint management for decentraland-tap
//!
//! Provides storage-agnostic checkpoint handling for incremental streams.
//!
//! # Architecture
//!
//! This crate provides a generic checkpoint system that:
//! - Defines the `Checkpoint` trait for stream-specific checkpoint types
//! - Provides `CheckpointFile` wrapper for storage-agnostic serialization
//! - Manages checkpoint saving/loading via `SyncManager`
//! - Supports multiple storage backends via `CheckpointStore` trait
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - Stores one JSON file per stream and phase
//! - `MemoryStore` - Keeps checkpoints in process memory (tests, dry runs)
//!
//! Each stream (`poaps_xdai`, `poaps_metadata`) implements its own
//! checkpoint type with the `Checkpoint` trait.

mod config;
mod file;
mod filesystem;
mod manager;
mod memory;
mod phase;
pub mod store;


// Re-export config types
pub use config::{CheckpointStorage, SyncConfig};

// Re-export file types
pub use file::CheckpointFile;

// Re-export manager types
pub use manager::SyncManager;

// Re-export phase types
pub use phase::SyncPhase;

// Re-export store trait and types
pub use store::{CheckpointID, CheckpointStore, StoredCheckpoint};

// Re-export storage implementations
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

/// Trait that stream-specific checkpoints must implement.
///
/// A checkpoint is the persisted bookmark of one stream: the largest
/// replication key value that was fully emitted.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct BlocksCheckpoint {
///     pub height: i64,
/// }
///
/// impl Checkpoint for BlocksCheckpoint {
///     const STREAM_NAME: &'static str = "blocks";
///
///     fn to_cli_string(&self) -> String {
///         self.height.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { height: s.trim().parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Stream identifier (e.g., "poaps_xdai", "poaps_metadata").
    ///
    /// This constant is used to:
    /// - Name the checkpoint in storage
    /// - Validate checkpoint type when loading from storage
    const STREAM_NAME: &'static str;

    /// Convert to CLI-friendly string format.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    /// This format is used for:
    /// - Command-line arguments (e.g., `--incremental-from`)
    /// - Logging and debugging output
    fn to_cli_string(&self) -> String;

    /// Parse from CLI string format.
    ///
    /// Should parse the format produced by `to_cli_string()`.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}

// ============================================================================
// Standalone helper functions for reading checkpoint files
// ============================================================================

/// Read every checkpoint file stored in a directory.
///
/// Standalone function that doesn't require a `SyncConfig`. Used by the
/// `state` command to print whatever is persisted without knowing the
/// concrete checkpoint types up front.
///
/// Files are returned sorted by stream name, then phase. A missing directory
/// yields an empty list.
pub fn list_checkpoint_files<P: AsRef<std::path::Path>>(
    checkpoint_dir: P,
) -> anyhow::Result<Vec<CheckpointFile>> {
    let dir = checkpoint_dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_checkpoint = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("checkpoint_") && name.ends_with(".json"))
            .unwrap_or(false);
        if !is_checkpoint {
            continue;
        }

        let content = std::fs::read_to_string(&path)?;
        let stored: StoredCheckpoint = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid checkpoint file {}: {e}", path.display()))?;
        files.push(CheckpointFile::from_stored(stored)?);
    }

    files.sort_by(|a, b| {
        a.stream
            .cmp(&b.stream)
            .then_with(|| a.phase.as_str().cmp(b.phase.as_str()))
    });
    Ok(files)
}
