//! Classified errors of the pagination core.
//!
//! These surface through `anyhow::Error` at the crate seams; callers that
//! need to tell them apart use `err.downcast_ref::<SyncError>()`.

use crate::schema::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A page token that does not follow `%d-%b-%Y`. Fatal for the run.
    #[error("Invalid page token '{token}': {source}")]
    InvalidPageToken {
        token: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A record date field that cannot be parsed. Fatal for the run.
    #[error("Invalid {field} '{value}' in {stream} record: {source}")]
    InvalidRecordDate {
        stream: String,
        field: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The upstream returned a record below the last seen or checkpointed
    /// replication value, breaking the stream's sortedness guarantee.
    #[error(
        "Out-of-order record in {stream}: {replication_key} {current} is less than previous value {previous}"
    )]
    OutOfOrder {
        stream: String,
        replication_key: String,
        previous: String,
        current: String,
    },

    /// A full page did not move pagination forward, so requesting the next
    /// page would return the same records again. The stalled page itself has
    /// already been handed out.
    #[error(
        "Pagination of {stream} stalled at {position}: a full page of {page_size} records did not advance it"
    )]
    StalledPagination {
        stream: String,
        position: String,
        page_size: usize,
    },

    /// The response body did not have the expected shape.
    #[error("Unexpected response for {stream}: {reason}")]
    UnexpectedResponse { stream: String, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl SyncError {
    /// Whether this error is a sortedness violation.
    pub fn is_out_of_order(&self) -> bool {
        matches!(self, SyncError::OutOfOrder { .. })
    }
}
