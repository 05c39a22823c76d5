//! Sync phase enumeration for checkpoint tracking.

use serde::{Deserialize, Serialize};

/// Point in a sync run at which a checkpoint was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Written after every page that was fully emitted.
    ///
    /// If the process dies between pages, this is the durable resume
    /// position. A page that was only partly emitted never produces one.
    PageCommitted,

    /// Written once the stream reports that pagination is exhausted.
    RunComplete,
}

impl SyncPhase {
    /// Get the string representation of this phase.
    ///
    /// Used for checkpoint file naming (e.g., `checkpoint_poaps_xdai_page_committed.json`)
    /// and log output.
    pub fn as_str(&self) -> &str {
        match self {
            SyncPhase::PageCommitted => "page_committed",
            SyncPhase::RunComplete => "run_complete",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page_committed" => Ok(SyncPhase::PageCommitted),
            "run_complete" => Ok(SyncPhase::RunComplete),
            other => Err(anyhow::anyhow!("Unknown sync phase: {other}")),
        }
    }
}
