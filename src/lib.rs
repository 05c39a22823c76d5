//! decentraland-tap library
//!
//! A Singer tap extracting Decentraland POAP data into newline-delimited JSON
//! messages on stdout.
//!
//! # Streams
//!
//! - `poaps_xdai` - POAP events from the xDai subgraph (GraphQL, paged on
//!   the `created` timestamp)
//! - `poaps_metadata` - event metadata from the POAP REST API (paged on the
//!   `start_date` of the last record)
//!
//! Both streams are incremental. Progress is persisted after every page
//! through the `checkpoint` crate, so an interrupted run resumes where it
//! stopped.
//!
//! # CLI Usage
//!
//! ```bash
//! # Sync both streams, resuming from stored checkpoints
//! decentraland-tap sync --config config.json
//!
//! # Re-sync metadata from a given date
//! decentraland-tap sync --config config.json \
//!   --stream poaps_metadata --incremental-from 05-Jan-2021
//!
//! # Print the catalog
//! decentraland-tap discover
//! ```

use std::path::PathBuf;

use clap::Parser;

pub mod config;
pub mod discover;
pub mod output;
pub mod sync;

pub use config::TapConfig;
pub use sync::{run_stream_sync, run_sync, Bookmarks, StreamSelection, SyncSummary};

/// Connection options shared by the commands that talk to the upstream APIs.
#[derive(Parser, Clone, Debug, Default)]
pub struct TapOpts {
    /// Config file (.json or .toml)
    #[arg(long, env = "DECENTRALAND_TAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// GraphQL endpoint of the xDai POAP subgraph
    #[arg(long, env = "POAPS_XDAI_URL")]
    pub poaps_xdai_url: Option<String>,

    /// Base URL of the POAP REST API
    #[arg(long, env = "POAPS_DETAILS_URL")]
    pub poaps_details_url: Option<String>,

    /// Per-request timeout, e.g. "30s" or "2m" (default: 30s)
    #[arg(long, env = "POAPS_REQUEST_TIMEOUT")]
    pub request_timeout: Option<String>,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,
}
