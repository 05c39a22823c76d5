//! `poaps_xdai`: POAP events from the xDai subgraph.
//!
//! The subgraph is queried with a single parameterized GraphQL query. Each
//! request asks for up to [`PAGE_SIZE`] events with `created >= cursor`,
//! ascending by `created`. After a full page the cursor moves to the largest
//! `created` in it, so the boundary events are fetched again on the next
//! request (at-least-once delivery).

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use sync_core::{
    FieldSchema, FieldType, IncrementalStream, ReplicationMethod, StreamDescriptor, StreamSchema,
    SyncError,
};

use crate::context::PoapEventContext;
use crate::transport::HttpTransport;

/// Events requested per page. Must match `first:` in [`EVENTS_QUERY`].
pub const PAGE_SIZE: usize = 1000;

pub const EVENTS_QUERY: &str = r#"
query ($updatedAt: Int!)
{
    events (
        first: 1000,
        orderBy: created,
        orderDirection: asc,
        where:{
            created_gte: $updatedAt
        }
    ){
        id
        tokenCount
        transferCount
        created
    }
}
"#;

pub const POAPS_XDAI: StreamDescriptor = StreamDescriptor {
    name: "poaps_xdai",
    key_properties: &["id"],
    replication_key: "created",
    replication_method: ReplicationMethod::Incremental,
    is_sorted: true,
};

pub const POAPS_XDAI_SCHEMA: StreamSchema = StreamSchema {
    stream: "poaps_xdai",
    fields: &[
        FieldSchema::required("id", FieldType::String),
        FieldSchema::optional("tokenCount", FieldType::Integer),
        FieldSchema::optional("transferCount", FieldType::Integer),
        FieldSchema::required("created", FieldType::Integer),
    ],
};

/// One POAP event as indexed by the subgraph.
///
/// The subgraph encodes `BigInt` fields as JSON strings; they are coerced
/// to integers on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoapEvent {
    pub id: String,
    #[serde(deserialize_with = "deserialize_big_int")]
    pub token_count: i64,
    #[serde(deserialize_with = "deserialize_big_int")]
    pub transfer_count: i64,
    /// Creation time, epoch seconds.
    #[serde(deserialize_with = "deserialize_big_int")]
    pub created: i64,
}

fn deserialize_big_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BigInt {
        Number(i64),
        Text(String),
    }

    match BigInt::deserialize(deserializer)? {
        BigInt::Number(n) => Ok(n),
        BigInt::Text(s) => s
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid BigInt '{s}': {e}"))),
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<EventsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct EventsData {
    events: Vec<PoapEvent>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

/// Decode a `{data: {events: [...]}}` response body.
pub fn parse_events_response(body: Value) -> Result<Vec<PoapEvent>, SyncError> {
    let response: GraphQlResponse =
        serde_json::from_value(body).map_err(|e| SyncError::UnexpectedResponse {
            stream: POAPS_XDAI.name.to_string(),
            reason: e.to_string(),
        })?;

    match response.data {
        Some(data) => Ok(data.events),
        None => {
            let reason = if response.errors.is_empty() {
                "response has no data".to_string()
            } else {
                response
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            Err(SyncError::UnexpectedResponse {
                stream: POAPS_XDAI.name.to_string(),
                reason,
            })
        }
    }
}

/// Persisted bookmark of `poaps_xdai`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoapsXdaiCheckpoint {
    /// Largest `created` value fully emitted.
    pub created: i64,
}

impl checkpoint::Checkpoint for PoapsXdaiCheckpoint {
    const STREAM_NAME: &'static str = "poaps_xdai";

    fn to_cli_string(&self) -> String {
        self.created.to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let created = s
            .trim()
            .parse::<i64>()
            .map_err(|e| anyhow::anyhow!("Invalid poaps_xdai checkpoint '{s}': {e}"))?;
        Ok(Self { created })
    }
}

/// Cursor-paginated stream over the subgraph's `events` entity.
pub struct PoapsXdaiStream {
    transport: Arc<dyn HttpTransport>,
    url: String,
    start: Option<i64>,
    cursor: i64,
    exhausted: bool,
    /// Set when a full page sat on the current cursor.
    stalled: bool,
}

impl PoapsXdaiStream {
    /// Create the stream; without a checkpoint it starts at `created >= 0`.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        url: impl Into<String>,
        start: Option<PoapsXdaiCheckpoint>,
    ) -> Self {
        let start = start.map(|c| c.created);
        Self {
            transport,
            url: url.into(),
            start,
            cursor: start.unwrap_or(0),
            exhausted: false,
            stalled: false,
        }
    }

    /// Cursor the next request filters on.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Body of the next request.
    pub fn request_body(&self) -> Value {
        json!({
            "query": EVENTS_QUERY,
            "variables": { "updatedAt": self.cursor },
        })
    }

    /// Update pagination state from a fetched page.
    fn advance(&mut self, events: &[PoapEvent]) {
        if events.len() < PAGE_SIZE {
            self.exhausted = true;
            return;
        }

        let max_created = events
            .iter()
            .map(|e| e.created)
            .max()
            .unwrap_or(self.cursor);

        if max_created <= self.cursor {
            // A full page sitting on a single timestamp would be requested forever.
            self.stalled = true;
            return;
        }

        self.cursor = max_created;
    }
}

#[async_trait]
impl IncrementalStream for PoapsXdaiStream {
    type Record = PoapEvent;
    type Cursor = i64;
    type Checkpoint = PoapsXdaiCheckpoint;
    type Context = PoapEventContext;

    fn descriptor(&self) -> &StreamDescriptor {
        &POAPS_XDAI
    }

    fn schema(&self) -> &StreamSchema {
        &POAPS_XDAI_SCHEMA
    }

    fn start_cursor(&self) -> Option<i64> {
        self.start
    }

    async fn next_page(&mut self) -> anyhow::Result<Option<Vec<PoapEvent>>> {
        if self.stalled {
            return Err(SyncError::StalledPagination {
                stream: POAPS_XDAI.name.to_string(),
                position: format!("created={}", self.cursor),
                page_size: PAGE_SIZE,
            }
            .into());
        }
        if self.exhausted {
            return Ok(None);
        }

        tracing::debug!("poaps_xdai: requesting events with created >= {}", self.cursor);
        let body = self
            .transport
            .post_json(&self.url, &self.request_body())
            .await
            .with_context(|| format!("poaps_xdai request at created >= {} failed", self.cursor))?;

        let events = parse_events_response(body)?;
        tracing::info!(
            "poaps_xdai: fetched {} events at created >= {}",
            events.len(),
            self.cursor
        );

        self.advance(&events);
        if events.is_empty() {
            return Ok(None);
        }
        Ok(Some(events))
    }

    fn cursor_of(&self, record: &PoapEvent) -> i64 {
        record.created
    }

    fn checkpoint_at(&self, cursor: &i64) -> PoapsXdaiCheckpoint {
        PoapsXdaiCheckpoint { created: *cursor }
    }

    fn child_context(&self, record: &PoapEvent) -> Option<PoapEventContext> {
        Some(PoapEventContext::from(record))
    }
}
