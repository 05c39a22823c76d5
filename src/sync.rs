//! Stream runner.
//!
//! A stream is synced page by page from its start bookmark until it reports
//! no more pages. Every page goes through the same steps:
//!
//! 1. The replication values of the whole page are checked against the
//!    [`SortednessGuard`] and every record against the stream schema. A
//!    failure aborts the run before anything from the page is written.
//! 2. RECORD messages are written and child contexts handed to the sink.
//! 3. Both outputs are flushed. Only then does the bookmark move to the
//!    page's last replication value, a `page_committed` checkpoint get
//!    persisted and a STATE message get written.
//!
//! An interrupted run therefore resumes from the last completed page. The
//! boundary record of that page may be emitted again (at-least-once).
//!
//! When the stream is exhausted a `run_complete` checkpoint is persisted.
//!
//! STATE messages carry the bookmarks of every known stream, not only the
//! ones synced in this run. They are seeded from the Singer state handed in
//! with `--state`, then from stored checkpoints.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use checkpoint::{Checkpoint, CheckpointFile, SyncManager, SyncPhase};
use clap::ValueEnum;
use decentraland_poaps_source::{
    HttpTransport, PoapsMetadataCheckpoint, PoapsMetadataStream, PoapsXdaiCheckpoint,
    PoapsXdaiStream,
};
use serde_json::{json, Map, Value};
use sync_core::{IncrementalStream, Message, SortednessGuard, SyncError};

use crate::config::TapConfig;
use crate::output::{ContextSink, MessageWriter};

/// Bookmarks of every stream synced in this run, as carried by STATE messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bookmarks {
    streams: Map<String, Value>,
}

impl Bookmarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest checkpoint of every stream found among stored checkpoint files.
    pub fn from_checkpoint_files(files: &[CheckpointFile]) -> Self {
        let mut latest: Vec<&CheckpointFile> = Vec::new();
        for file in files {
            match latest.iter_mut().find(|f| f.stream() == file.stream()) {
                Some(current) if file.created_at() > current.created_at() => *current = file,
                Some(_) => {}
                None => latest.push(file),
            }
        }

        let mut bookmarks = Self::new();
        for file in latest {
            bookmarks.set(file.stream(), file.checkpoint.clone());
        }
        bookmarks
    }

    /// Bookmarks of a Singer state `{"bookmarks": {stream: bookmark, ..}}`.
    pub fn from_state(state: &Value) -> anyhow::Result<Self> {
        let Some(state) = state.as_object() else {
            anyhow::bail!("State must be a JSON object, found {state}");
        };
        match state.get("bookmarks") {
            None | Some(Value::Null) => Ok(Self::new()),
            Some(Value::Object(streams)) => Ok(Self {
                streams: streams.clone(),
            }),
            Some(other) => anyhow::bail!("State bookmarks must be an object, found {other}"),
        }
    }

    /// Read a Singer state file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        Self::from_state(&state)
    }

    pub fn set(&mut self, stream: &str, bookmark: Value) {
        self.streams.insert(stream.to_string(), bookmark);
    }

    pub fn get(&self, stream: &str) -> Option<&Value> {
        self.streams.get(stream)
    }

    /// Bookmark of `C`'s stream as its checkpoint type.
    pub fn checkpoint<C: Checkpoint>(&self) -> anyhow::Result<Option<C>> {
        self.get(C::STREAM_NAME)
            .map(|bookmark| {
                serde_json::from_value(bookmark.clone()).with_context(|| {
                    format!("Invalid {} bookmark in state: {bookmark}", C::STREAM_NAME)
                })
            })
            .transpose()
    }

    /// `{"bookmarks": {stream: bookmark, ..}}`
    pub fn to_state(&self) -> Value {
        json!({ "bookmarks": self.streams })
    }
}

/// Outcome of syncing one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub stream: String,
    /// Pages that advanced the bookmark.
    pub pages: usize,
    pub records: usize,
    /// Final bookmark, `None` when the stream had nothing and no start.
    pub bookmark: Option<Value>,
}

/// Sync one stream to exhaustion.
pub async fn run_stream_sync<S, W, K>(
    stream: &mut S,
    manager: &SyncManager,
    writer: &mut MessageWriter<W>,
    contexts: &mut K,
    bookmarks: &mut Bookmarks,
) -> anyhow::Result<SyncSummary>
where
    S: IncrementalStream,
    W: Write,
    K: ContextSink,
{
    let descriptor = *stream.descriptor();
    let name = descriptor.name;

    tracing::info!(
        "Starting sync of {} from {}",
        name,
        stream
            .start_cursor()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "the beginning".to_string())
    );

    writer.write(&Message::schema(&descriptor, stream.schema()))?;

    let mut guard = SortednessGuard::new(&descriptor, stream.start_cursor());
    let mut summary = SyncSummary {
        stream: name.to_string(),
        pages: 0,
        records: 0,
        bookmark: None,
    };

    while let Some(page) = stream.next_page().await? {
        let cursors: Vec<S::Cursor> = page.iter().map(|r| stream.cursor_of(r)).collect();
        let advanced_to = guard.check_page(cursors.iter())?;

        let mut records = Vec::with_capacity(page.len());
        for record in &page {
            let value = serde_json::to_value(record)?;
            stream.schema().check(&value).map_err(SyncError::from)?;
            records.push(value);
        }

        for (record, value) in page.iter().zip(records) {
            writer.write(&Message::record(name, value))?;
            if let Some(context) = stream.child_context(record) {
                contexts.send(name, &context)?;
            }
        }
        summary.records += page.len();

        // Output of the page is flushed before any checkpoint covers it.
        writer.flush()?;
        contexts.flush()?;

        match advanced_to {
            Some(cursor) => {
                guard.commit(cursor.clone());
                let checkpoint = stream.checkpoint_at(&cursor);
                manager
                    .emit_checkpoint(&checkpoint, SyncPhase::PageCommitted)
                    .await?;
                bookmarks.set(name, serde_json::to_value(&checkpoint)?);
                writer.write(&Message::state(bookmarks.to_state()))?;
                summary.pages += 1;

                tracing::info!(
                    "{}: emitted {} records, bookmark {} = {}",
                    name,
                    page.len(),
                    descriptor.replication_key,
                    cursor
                );
            }
            None => {
                tracing::debug!(
                    "{}: page of {} records did not move the bookmark",
                    name,
                    page.len()
                );
            }
        }
    }

    if let Some(last) = guard.last() {
        let checkpoint = stream.checkpoint_at(last);
        manager
            .emit_checkpoint(&checkpoint, SyncPhase::RunComplete)
            .await?;
        let bookmark = serde_json::to_value(&checkpoint)?;
        bookmarks.set(name, bookmark.clone());
        writer.write(&Message::state(bookmarks.to_state()))?;
        summary.bookmark = Some(bookmark);
    }

    tracing::info!(
        "Finished sync of {}: {} records in {} pages",
        name,
        summary.records,
        summary.pages
    );

    Ok(summary)
}

/// Bookmark a stream starts from.
///
/// An explicit `--incremental-from` value wins. A full refresh starts from
/// the beginning. Otherwise the stream's bookmark in the given Singer state
/// is used, then the most recent stored checkpoint.
pub async fn resolve_start<C: Checkpoint>(
    manager: &SyncManager,
    incremental_from: Option<&str>,
    state: Option<&Bookmarks>,
) -> anyhow::Result<Option<C>> {
    if let Some(value) = incremental_from {
        return C::from_cli_string(value).map(Some);
    }
    if !manager.config().incremental {
        return Ok(None);
    }

    if let Some(checkpoint) = state.map(|s| s.checkpoint::<C>()).transpose()?.flatten() {
        tracing::info!(
            "Resuming {} from state bookmark {}",
            C::STREAM_NAME,
            checkpoint.to_cli_string()
        );
        return Ok(Some(checkpoint));
    }

    let start = manager.read_latest_checkpoint::<C>().await?;
    if let Some(checkpoint) = &start {
        tracing::info!(
            "Resuming {} from stored checkpoint {}",
            C::STREAM_NAME,
            checkpoint.to_cli_string()
        );
    }
    Ok(start)
}

/// Streams selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamSelection {
    #[value(name = "poaps_xdai")]
    PoapsXdai,
    #[value(name = "poaps_metadata")]
    PoapsMetadata,
    All,
}

impl StreamSelection {
    fn includes_xdai(self) -> bool {
        matches!(self, StreamSelection::PoapsXdai | StreamSelection::All)
    }

    fn includes_metadata(self) -> bool {
        matches!(self, StreamSelection::PoapsMetadata | StreamSelection::All)
    }
}

/// Carry the latest stored checkpoint of `C`'s stream unless the bookmarks
/// already hold one.
async fn seed_stored_bookmark<C: Checkpoint>(
    manager: &SyncManager,
    bookmarks: &mut Bookmarks,
) -> anyhow::Result<()> {
    if bookmarks.get(C::STREAM_NAME).is_some() {
        return Ok(());
    }
    if let Some(checkpoint) = manager.read_latest_checkpoint::<C>().await? {
        bookmarks.set(C::STREAM_NAME, serde_json::to_value(&checkpoint)?);
    }
    Ok(())
}

/// Sync the selected streams one after the other, `poaps_xdai` first.
///
/// `state` is a Singer state from a previous run. Its bookmarks seed the
/// start of the selected streams and are carried through every STATE
/// message written here.
#[allow(clippy::too_many_arguments)]
pub async fn run_sync<W, K>(
    config: &TapConfig,
    transport: Arc<dyn HttpTransport>,
    manager: &SyncManager,
    selection: StreamSelection,
    incremental_from: Option<&str>,
    state: Option<&Bookmarks>,
    writer: &mut MessageWriter<W>,
    contexts: &mut K,
) -> anyhow::Result<Vec<SyncSummary>>
where
    W: Write,
    K: ContextSink,
{
    if incremental_from.is_some() && selection == StreamSelection::All {
        anyhow::bail!("--incremental-from requires a single --stream");
    }

    let mut bookmarks = state.cloned().unwrap_or_default();
    seed_stored_bookmark::<PoapsXdaiCheckpoint>(manager, &mut bookmarks).await?;
    seed_stored_bookmark::<PoapsMetadataCheckpoint>(manager, &mut bookmarks).await?;
    let mut summaries = Vec::new();

    if selection.includes_xdai() {
        let start =
            resolve_start::<PoapsXdaiCheckpoint>(manager, incremental_from, state).await?;
        let mut stream =
            PoapsXdaiStream::new(transport.clone(), config.poaps_xdai_url.clone(), start);
        summaries.push(
            run_stream_sync(&mut stream, manager, writer, contexts, &mut bookmarks).await?,
        );
    }

    if selection.includes_metadata() {
        let start =
            resolve_start::<PoapsMetadataCheckpoint>(manager, incremental_from, state).await?;
        let mut stream =
            PoapsMetadataStream::new(transport.clone(), &config.poaps_details_url, start);
        summaries.push(
            run_stream_sync(&mut stream, manager, writer, contexts, &mut bookmarks).await?,
        );
    }

    writer.flush()?;
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkpoint::{MemoryStore, SyncConfig};
    use chrono::{TimeZone, Utc};

    fn file(stream: &str, phase: SyncPhase, secs: i64, checkpoint: Value) -> CheckpointFile {
        CheckpointFile {
            stream: stream.to_string(),
            checkpoint,
            phase,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_bookmarks_from_files_keep_newest_per_stream() {
        let files = vec![
            file("poaps_xdai", SyncPhase::PageCommitted, 20, json!({"created": 9})),
            file("poaps_xdai", SyncPhase::RunComplete, 10, json!({"created": 5})),
            file(
                "poaps_metadata",
                SyncPhase::RunComplete,
                5,
                json!({"start_date": "2021-01-05"}),
            ),
        ];

        let bookmarks = Bookmarks::from_checkpoint_files(&files);
        assert_eq!(bookmarks.get("poaps_xdai"), Some(&json!({"created": 9})));
        assert_eq!(
            bookmarks.to_state(),
            json!({"bookmarks": {
                "poaps_xdai": {"created": 9},
                "poaps_metadata": {"start_date": "2021-01-05"}
            }})
        );
    }

    #[test]
    fn test_resolve_start_prefers_explicit_value() {
        let manager =
            SyncManager::with_store(SyncConfig::default(), Arc::new(MemoryStore::new()));
        tokio_test::block_on(async {
            manager
                .emit_checkpoint(&PoapsXdaiCheckpoint { created: 10 }, SyncPhase::RunComplete)
                .await
                .unwrap();

            let stored = resolve_start::<PoapsXdaiCheckpoint>(&manager, None, None)
                .await
                .unwrap();
            assert_eq!(stored, Some(PoapsXdaiCheckpoint { created: 10 }));

            let explicit = resolve_start::<PoapsXdaiCheckpoint>(&manager, Some("42"), None)
                .await
                .unwrap();
            assert_eq!(explicit, Some(PoapsXdaiCheckpoint { created: 42 }));

            assert!(resolve_start::<PoapsXdaiCheckpoint>(&manager, Some("soon"), None)
                .await
                .is_err());
        });
    }

    #[test]
    fn test_bookmarks_from_state() {
        let bookmarks = Bookmarks::from_state(&json!({"bookmarks": {
            "poaps_xdai": {"created": 7},
            "poaps_metadata": {"start_date": "2021-01-05"}
        }}))
        .unwrap();
        assert_eq!(
            bookmarks.checkpoint::<PoapsXdaiCheckpoint>().unwrap(),
            Some(PoapsXdaiCheckpoint { created: 7 })
        );
        assert!(bookmarks
            .checkpoint::<PoapsMetadataCheckpoint>()
            .unwrap()
            .is_some());

        assert_eq!(Bookmarks::from_state(&json!({})).unwrap(), Bookmarks::new());
        assert!(Bookmarks::from_state(&json!({"bookmarks": [1]})).is_err());
        assert!(Bookmarks::from_state(&json!("bookmarks")).is_err());

        let bad = Bookmarks::from_state(&json!({"bookmarks": {"poaps_xdai": {"created": "x"}}}))
            .unwrap();
        assert!(bad.checkpoint::<PoapsXdaiCheckpoint>().is_err());
    }

    #[test]
    fn test_bookmarks_load_state_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, r#"{"bookmarks": {"poaps_xdai": {"created": 9}}}"#).unwrap();
        let bookmarks = Bookmarks::load(&path).unwrap();
        assert_eq!(bookmarks.get("poaps_xdai"), Some(&json!({"created": 9})));

        assert!(Bookmarks::load(&tmp.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_resolve_start_state_beats_stored_checkpoint() {
        let manager =
            SyncManager::with_store(SyncConfig::default(), Arc::new(MemoryStore::new()));
        let mut state = Bookmarks::new();
        state.set("poaps_xdai", json!({"created": 25}));
        tokio_test::block_on(async {
            manager
                .emit_checkpoint(&PoapsXdaiCheckpoint { created: 10 }, SyncPhase::RunComplete)
                .await
                .unwrap();

            let start = resolve_start::<PoapsXdaiCheckpoint>(&manager, None, Some(&state))
                .await
                .unwrap();
            assert_eq!(start, Some(PoapsXdaiCheckpoint { created: 25 }));

            let explicit =
                resolve_start::<PoapsXdaiCheckpoint>(&manager, Some("3"), Some(&state))
                    .await
                    .unwrap();
            assert_eq!(explicit, Some(PoapsXdaiCheckpoint { created: 3 }));

            // A state without this stream falls through to the stored checkpoint.
            let stored = resolve_start::<PoapsXdaiCheckpoint>(
                &manager,
                None,
                Some(&Bookmarks::new()),
            )
            .await
            .unwrap();
            assert_eq!(stored, Some(PoapsXdaiCheckpoint { created: 10 }));
        });
    }

    #[test]
    fn test_resolve_start_without_incremental_is_none() {
        let manager = SyncManager::with_store(
            SyncConfig::full_refresh("unused".to_string()),
            Arc::new(MemoryStore::new()),
        );
        tokio_test::block_on(async {
            manager
                .emit_checkpoint(&PoapsXdaiCheckpoint { created: 10 }, SyncPhase::RunComplete)
                .await
                .unwrap();
            assert_eq!(
                resolve_start::<PoapsXdaiCheckpoint>(&manager, None, None)
                    .await
                    .unwrap(),
                None
            );
        });
    }
}
