//! Parent-to-child key of the `poaps_xdai` stream.

use serde::{Deserialize, Serialize};

use crate::xdai::PoapEvent;

/// Identifies one POAP event for per-event extraction by dependent streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoapEventContext {
    pub poap_id: String,
}

impl From<&PoapEvent> for PoapEventContext {
    fn from(event: &PoapEvent) -> Self {
        Self {
            poap_id: event.id.clone(),
        }
    }
}
