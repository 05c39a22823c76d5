//! The incremental stream contract.
//!
//! A stream owns its pagination state exclusively for one run. The runner
//! asks it for pages until it reports exhaustion, and persists the
//! replication cursor between pages through the stream's checkpoint type.

use std::fmt::{Debug, Display};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::schema::StreamSchema;

/// How a stream resumes between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMethod {
    /// Resume from the last persisted replication value.
    Incremental,
}

impl ReplicationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationMethod::Incremental => "INCREMENTAL",
        }
    }
}

/// Static description of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Stream name, also the name used for its checkpoints.
    pub name: &'static str,
    /// Primary key fields of the emitted records.
    pub key_properties: &'static [&'static str],
    /// Field that orders the records and is persisted as the bookmark.
    pub replication_key: &'static str,
    pub replication_method: ReplicationMethod,
    /// Records are promised non-decreasing in `replication_key` within a run.
    /// This is what allows a checkpoint after every page.
    pub is_sorted: bool,
}

/// A paginated source stream that can resume from a checkpoint.
///
/// Implementations issue one request per [`next_page`](Self::next_page) call
/// and never retry; transport failures propagate to the caller.
#[async_trait]
pub trait IncrementalStream: Send {
    /// Record emitted downstream.
    type Record: Serialize + Send + Sync;

    /// Replication value extracted from a record.
    type Cursor: Ord + Clone + Display + Debug + Send + Sync;

    /// Persisted form of the cursor.
    type Checkpoint: checkpoint::Checkpoint + Send + Sync;

    /// Key handed to dependent streams for each record.
    type Context: Serialize + Send;

    fn descriptor(&self) -> &StreamDescriptor;

    fn schema(&self) -> &StreamSchema;

    /// Cursor this run started from, `None` on a first run.
    fn start_cursor(&self) -> Option<Self::Cursor>;

    /// Fetch the next page.
    ///
    /// Returns `Ok(None)` once pagination is exhausted; after that the stream
    /// issues no further requests.
    async fn next_page(&mut self) -> anyhow::Result<Option<Vec<Self::Record>>>;

    /// Replication value of a record.
    fn cursor_of(&self, record: &Self::Record) -> Self::Cursor;

    /// Checkpoint recording `cursor` as the resume position.
    fn checkpoint_at(&self, cursor: &Self::Cursor) -> Self::Checkpoint;

    /// Child context derived from a record, if the stream has dependents.
    fn child_context(&self, _record: &Self::Record) -> Option<Self::Context> {
        None
    }
}
