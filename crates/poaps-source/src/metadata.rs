//! `poaps_metadata`: POAP event metadata from the REST API.
//!
//! `GET {base}/paginated-events` is called with a `from_date` lower bound,
//! ascending by `start_date`, [`PAGE_SIZE`] items at a time. The page token
//! for the next request is the raw `start_date` of the last item of the
//! current page.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_core::{
    FieldSchema, FieldType, IncrementalStream, ReplicationMethod, StreamDescriptor, StreamSchema,
    SyncError,
};

use crate::transport::HttpTransport;

pub const PAGE_SIZE: usize = 500;

pub const EVENTS_PATH: &str = "/paginated-events";

/// Format of page tokens and of `start_date` in API responses, e.g. `05-Jan-2021`.
pub const PAGE_TOKEN_FORMAT: &str = "%d-%b-%Y";

/// Format of the `from_date` query parameter. The API expects the lowercase `z`.
pub const FROM_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%Sz";

pub const POAPS_METADATA: StreamDescriptor = StreamDescriptor {
    name: "poaps_metadata",
    key_properties: &["id"],
    replication_key: "start_date",
    replication_method: ReplicationMethod::Incremental,
    is_sorted: true,
};

pub const POAPS_METADATA_SCHEMA: StreamSchema = StreamSchema {
    stream: "poaps_metadata",
    fields: &[
        FieldSchema::required("id", FieldType::Integer),
        FieldSchema::optional("fancy_id", FieldType::String),
        FieldSchema::optional("name", FieldType::String),
        FieldSchema::optional("event_url", FieldType::String),
        FieldSchema::optional("image_url", FieldType::String),
        FieldSchema::optional("country", FieldType::String),
        FieldSchema::optional("city", FieldType::String),
        FieldSchema::optional("description", FieldType::String),
        FieldSchema::optional("year", FieldType::Integer),
        FieldSchema::required("start_date", FieldType::Date),
        FieldSchema::optional("end_date", FieldType::String),
        FieldSchema::optional("expiry_date", FieldType::String),
        FieldSchema::optional("from_admin", FieldType::Boolean),
        FieldSchema::optional("virtual_event", FieldType::Boolean),
        FieldSchema::optional("event_template_id", FieldType::Integer),
        FieldSchema::optional("event_host_id", FieldType::Integer),
        FieldSchema::optional("private_event", FieldType::Boolean),
    ],
};

// ============================================================================
// Page token
// ============================================================================

/// Parsed page token: the lower bound date of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageToken(NaiveDate);

impl PageToken {
    /// Lower bound used when there is no token yet.
    pub fn beginning() -> Self {
        Self(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN))
    }

    /// Parse a `%d-%b-%Y` token.
    pub fn parse(token: &str) -> Result<Self, SyncError> {
        NaiveDate::parse_from_str(token, PAGE_TOKEN_FORMAT)
            .map(Self)
            .map_err(|source| SyncError::InvalidPageToken {
                token: token.to_string(),
                source,
            })
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The `from_date` query parameter for this token.
    pub fn from_date_param(&self) -> String {
        self.0
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.format(FROM_DATE_FORMAT).to_string())
            .unwrap_or_default()
    }
}

impl From<NaiveDate> for PageToken {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl std::fmt::Display for PageToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(PAGE_TOKEN_FORMAT))
    }
}

// ============================================================================
// Records
// ============================================================================

/// Metadata item as returned by the API, before post-processing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPoapMetadata {
    pub id: i64,
    pub fancy_id: Option<String>,
    pub name: Option<String>,
    pub event_url: Option<String>,
    pub image_url: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub year: Option<i64>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub expiry_date: Option<String>,
    pub from_admin: Option<bool>,
    pub virtual_event: Option<bool>,
    pub event_template_id: Option<i64>,
    pub event_host_id: Option<i64>,
    pub private_event: Option<bool>,
}

/// Emitted metadata record; `start_date` is a structured date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoapMetadata {
    pub id: i64,
    pub fancy_id: Option<String>,
    pub name: Option<String>,
    pub event_url: Option<String>,
    pub image_url: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub year: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: Option<String>,
    pub expiry_date: Option<String>,
    pub from_admin: Option<bool>,
    pub virtual_event: Option<bool>,
    pub event_template_id: Option<i64>,
    pub event_host_id: Option<i64>,
    pub private_event: Option<bool>,
}

impl RawPoapMetadata {
    /// Convert `start_date` into a date. A malformed date fails the record.
    pub fn post_process(self) -> Result<PoapMetadata, SyncError> {
        let start_date =
            NaiveDate::parse_from_str(&self.start_date, PAGE_TOKEN_FORMAT).map_err(|source| {
                SyncError::InvalidRecordDate {
                    stream: POAPS_METADATA.name.to_string(),
                    field: "start_date".to_string(),
                    value: self.start_date.clone(),
                    source,
                }
            })?;

        Ok(PoapMetadata {
            id: self.id,
            fancy_id: self.fancy_id,
            name: self.name,
            event_url: self.event_url,
            image_url: self.image_url,
            country: self.country,
            city: self.city,
            description: self.description,
            year: self.year,
            start_date,
            end_date: self.end_date,
            expiry_date: self.expiry_date,
            from_admin: self.from_admin,
            virtual_event: self.virtual_event,
            event_template_id: self.event_template_id,
            event_host_id: self.event_host_id,
            private_event: self.private_event,
        })
    }
}

#[derive(Deserialize)]
struct ItemsPage {
    items: Vec<RawPoapMetadata>,
}

/// Decode an `{items: [...]}` response body.
pub fn parse_items_response(body: Value) -> Result<Vec<RawPoapMetadata>, SyncError> {
    serde_json::from_value::<ItemsPage>(body)
        .map(|page| page.items)
        .map_err(|e| SyncError::UnexpectedResponse {
            stream: POAPS_METADATA.name.to_string(),
            reason: e.to_string(),
        })
}

/// Token for the page after `items`: the raw `start_date` of the last item.
pub fn next_page_token(items: &[RawPoapMetadata]) -> Option<String> {
    items.last().map(|item| item.start_date.clone())
}

// ============================================================================
// Checkpoint
// ============================================================================

/// Persisted bookmark of `poaps_metadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoapsMetadataCheckpoint {
    /// Latest `start_date` fully emitted.
    pub start_date: NaiveDate,
}

impl checkpoint::Checkpoint for PoapsMetadataCheckpoint {
    const STREAM_NAME: &'static str = "poaps_metadata";

    fn to_cli_string(&self) -> String {
        PageToken(self.start_date).to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let token = PageToken::parse(s.trim())?;
        Ok(Self {
            start_date: token.date(),
        })
    }
}

// ============================================================================
// Stream
// ============================================================================

/// Page-token-paginated stream over `/paginated-events`.
pub struct PoapsMetadataStream {
    transport: Arc<dyn HttpTransport>,
    url: String,
    start: Option<NaiveDate>,
    /// Raw token for the next request, `None` before the first page.
    page_token: Option<String>,
    exhausted: bool,
    /// Set when a full page handed back a token that did not advance.
    stalled: bool,
}

impl PoapsMetadataStream {
    /// Create the stream from the API base URL.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        start: Option<PoapsMetadataCheckpoint>,
    ) -> Self {
        let start = start.map(|c| c.start_date);
        let page_token = start.map(|date| PageToken(date).to_string());
        Self::with_page_token(transport, base_url, page_token, start)
    }

    /// Create the stream with an explicit raw page token.
    ///
    /// The token is only parsed when the first request is built, so a bad
    /// token fails the run at that point.
    pub fn with_page_token(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        page_token: Option<String>,
        start: Option<NaiveDate>,
    ) -> Self {
        Self {
            transport,
            url: format!("{}{}", base_url.trim_end_matches('/'), EVENTS_PATH),
            start,
            page_token,
            exhausted: false,
            stalled: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn page_token(&self) -> Option<&str> {
        self.page_token.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    fn current_token(&self) -> Result<PageToken, SyncError> {
        match self.page_token.as_deref() {
            Some(token) if !token.is_empty() => PageToken::parse(token),
            _ => Ok(PageToken::beginning()),
        }
    }

    /// Query parameters of the next request.
    pub fn url_params(&self) -> Result<Vec<(&'static str, String)>, SyncError> {
        let token = self.current_token()?;
        Ok(vec![
            ("limit", PAGE_SIZE.to_string()),
            ("from_date", token.from_date_param()),
            ("sort_field", "start_date".to_string()),
            ("sort_dir", "asc".to_string()),
        ])
    }

    /// Update pagination state after a page of `page_len` items.
    fn advance(
        &mut self,
        requested: PageToken,
        page_len: usize,
        next: Option<String>,
    ) -> Result<(), SyncError> {
        let Some(next) = next else {
            self.exhausted = true;
            return Ok(());
        };
        if page_len < PAGE_SIZE {
            self.exhausted = true;
            return Ok(());
        }

        let next_token = PageToken::parse(&next)?;
        if next_token <= requested {
            self.stalled = true;
            return Ok(());
        }

        self.page_token = Some(next);
        Ok(())
    }
}

#[async_trait]
impl IncrementalStream for PoapsMetadataStream {
    type Record = PoapMetadata;
    type Cursor = NaiveDate;
    type Checkpoint = PoapsMetadataCheckpoint;
    type Context = ();

    fn descriptor(&self) -> &StreamDescriptor {
        &POAPS_METADATA
    }

    fn schema(&self) -> &StreamSchema {
        &POAPS_METADATA_SCHEMA
    }

    fn start_cursor(&self) -> Option<NaiveDate> {
        self.start
    }

    async fn next_page(&mut self) -> anyhow::Result<Option<Vec<PoapMetadata>>> {
        if self.stalled {
            return Err(SyncError::StalledPagination {
                stream: POAPS_METADATA.name.to_string(),
                position: format!("page token {}", self.current_token()?),
                page_size: PAGE_SIZE,
            }
            .into());
        }
        if self.exhausted {
            return Ok(None);
        }

        let requested = self.current_token()?;
        let params = self.url_params()?;
        tracing::info!(
            "poaps_metadata: requesting page from {}",
            requested.from_date_param()
        );

        let body = self
            .transport
            .get_json(&self.url, &params)
            .await
            .with_context(|| format!("poaps_metadata request from {requested} failed"))?;

        let items = parse_items_response(body)?;
        let next = next_page_token(&items);
        let page_len = items.len();

        let records = items
            .into_iter()
            .map(RawPoapMetadata::post_process)
            .collect::<Result<Vec<_>, _>>()?;

        self.advance(requested, page_len, next)?;
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(records))
    }

    fn cursor_of(&self, record: &PoapMetadata) -> NaiveDate {
        record.start_date
    }

    fn checkpoint_at(&self, cursor: &NaiveDate) -> PoapsMetadataCheckpoint {
        PoapsMetadataCheckpoint {
            start_date: *cursor,
        }
    }
}
