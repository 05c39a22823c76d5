//! Command-line interface for decentraland-tap
//!
//! # Usage Examples
//!
//! ## Sync
//! ```bash
//! # Both streams, resuming from stored checkpoints
//! decentraland-tap sync --config config.json > output.jsonl
//!
//! # One stream from an explicit bookmark
//! decentraland-tap sync --config config.json \
//!   --stream poaps_xdai --incremental-from 1650000000
//!
//! # Resume from a Singer state kept by the orchestrator
//! decentraland-tap sync --config config.json --no-checkpoints \
//!   --state state.json > output.jsonl
//!
//! # Ignore stored checkpoints and write child contexts to a file
//! decentraland-tap sync --config config.json \
//!   --full-refresh --child-contexts poap_ids.jsonl
//! ```
//!
//! ## Inspect
//! ```bash
//! decentraland-tap discover
//! decentraland-tap state --checkpoint-dir .decentraland-tap-checkpoints
//! ```
//!
//! ## Checkpoint Formats
//! - poaps_xdai: `1650000000` (`created`, epoch seconds)
//! - poaps_metadata: `05-Jan-2021` (`start_date`)

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use checkpoint::{list_checkpoint_files, MemoryStore, SyncConfig, SyncManager};
use clap::{Parser, Subcommand};
use decentraland_poaps_source::{HttpTransport, ReqwestTransport};
use decentraland_tap::output::{ContextSink, DiscardContexts, JsonlContextSink, MessageWriter};
use decentraland_tap::{discover, run_sync, Bookmarks, StreamSelection, TapConfig, TapOpts};

const DEFAULT_CHECKPOINT_DIR: &str = ".decentraland-tap-checkpoints";

#[derive(Parser)]
#[command(name = "decentraland-tap")]
#[command(about = "A Singer tap for Decentraland POAP events and event metadata")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records and write Singer messages to stdout
    Sync {
        /// Upstream connection options
        #[command(flatten)]
        tap_opts: TapOpts,

        /// Stream to sync
        #[arg(long, value_enum, default_value = "all")]
        stream: StreamSelection,

        /// Directory to read and write checkpoint files
        #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
        checkpoint_dir: String,

        /// Neither read nor write checkpoints
        #[arg(long, conflicts_with_all = ["full_refresh", "dry_run"])]
        no_checkpoints: bool,

        /// Ignore stored checkpoints and start from the beginning
        #[arg(long)]
        full_refresh: bool,

        /// Start bookmark of the selected stream (see Checkpoint Formats)
        #[arg(long, value_name = "VALUE")]
        incremental_from: Option<String>,

        /// Singer state `{"bookmarks": {..}}` to resume from, ahead of stored checkpoints
        #[arg(long, value_name = "PATH", conflicts_with = "full_refresh")]
        state: Option<PathBuf>,

        /// Write the child contexts of poaps_xdai records to this file (JSONL)
        #[arg(long, value_name = "PATH")]
        child_contexts: Option<PathBuf>,

        /// Resume from the checkpoint directory but keep new checkpoints in memory
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the catalog of streams and their schemas
    Discover,

    /// Print the latest stored bookmark of every stream as a Singer state
    State {
        /// Directory holding checkpoint files
        #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
        checkpoint_dir: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // stdout carries the Singer messages, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            tap_opts,
            stream,
            checkpoint_dir,
            no_checkpoints,
            full_refresh,
            incremental_from,
            state,
            child_contexts,
            dry_run,
        } => {
            let config = TapConfig::resolve(&tap_opts)?;
            let state = state.as_deref().map(Bookmarks::load).transpose()?;

            let manager = if dry_run {
                let files = list_checkpoint_files(&checkpoint_dir)?;
                tracing::info!(
                    "Dry-run mode: resuming from {} stored checkpoints, keeping new ones in memory",
                    files.len()
                );
                let store = MemoryStore::from_files(files)?;
                let sync_config = if full_refresh {
                    SyncConfig::full_refresh(checkpoint_dir)
                } else {
                    SyncConfig::incremental_with_checkpoints(checkpoint_dir)
                };
                SyncManager::with_store(sync_config, Arc::new(store))
            } else if no_checkpoints {
                SyncManager::new(SyncConfig::without_checkpoints())
            } else if full_refresh {
                SyncManager::new(SyncConfig::full_refresh(checkpoint_dir))
            } else {
                SyncManager::new(SyncConfig::incremental_with_checkpoints(checkpoint_dir))
            };

            run_sync_command(
                &config,
                &manager,
                stream,
                incremental_from.as_deref(),
                state.as_ref(),
                child_contexts,
            )
            .await?;
        }
        Commands::Discover => {
            let catalog = discover::catalog();
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Commands::State { checkpoint_dir } => {
            let files = list_checkpoint_files(&checkpoint_dir)?;
            if files.is_empty() {
                tracing::warn!("No checkpoint files found in {checkpoint_dir}");
            }
            let state = Bookmarks::from_checkpoint_files(&files).to_state();
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }

    Ok(())
}

async fn run_sync_command(
    config: &TapConfig,
    manager: &SyncManager,
    selection: StreamSelection,
    incremental_from: Option<&str>,
    state: Option<&Bookmarks>,
    child_contexts: Option<PathBuf>,
) -> anyhow::Result<()> {
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(&config.transport_opts())?);

    let stdout = std::io::stdout();
    let mut writer = MessageWriter::new(BufWriter::new(stdout.lock()));

    let summaries = match child_contexts {
        Some(path) => {
            let file = File::create(&path).with_context(|| {
                format!("Failed to create child context file: {}", path.display())
            })?;
            let mut sink = JsonlContextSink::new(BufWriter::new(file));
            let summaries = run_sync(
                config,
                transport,
                manager,
                selection,
                incremental_from,
                state,
                &mut writer,
                &mut sink,
            )
            .await?;
            sink.flush()?;
            summaries
        }
        None => {
            run_sync(
                config,
                transport,
                manager,
                selection,
                incremental_from,
                state,
                &mut writer,
                &mut DiscardContexts,
            )
            .await?
        }
    };

    writer.flush()?;

    for summary in &summaries {
        tracing::info!(
            "{}: {} records, {} pages, bookmark {}",
            summary.stream,
            summary.records,
            summary.pages,
            summary
                .bookmark
                .as_ref()
                .map(|b| b.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    }

    Ok(())
}
