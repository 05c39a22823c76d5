//! Test doubles and fixtures for the POAP streams.
//!
//! Used by the unit tests of this crate and by the integration tests of the
//! workspace, which run whole syncs against scripted upstream responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::transport::HttpTransport;
use crate::xdai::PoapEvent;

/// A request seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    Post { url: String, body: Value },
    Get { url: String, query: Vec<(String, String)> },
}

impl RecordedRequest {
    /// Value of a query parameter of a GET request.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        match self {
            RecordedRequest::Get { query, .. } => query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            RecordedRequest::Post { .. } => None,
        }
    }

    /// `variables` of a GraphQL POST.
    pub fn variables(&self) -> Option<&Value> {
        match self {
            RecordedRequest::Post { body, .. } => body.get("variables"),
            RecordedRequest::Get { .. } => None,
        }
    }
}

/// [`HttpTransport`] that replays queued responses in order and records
/// every request. Running out of responses is an error, which makes an
/// unexpected extra request fail the test.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = Value>) -> Self {
        let transport = Self::new();
        for response in responses {
            transport.push_response(response);
        }
        transport
    }

    pub fn push_response(&self, response: Value) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Ok(response));
        }
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: &str) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(message.to_string()));
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_response(&self, request: RecordedRequest) -> Result<Value> {
        self.requests
            .lock()
            .map_err(|_| anyhow::anyhow!("request log poisoned"))?
            .push(request);

        match self
            .responses
            .lock()
            .map_err(|_| anyhow::anyhow!("response queue poisoned"))?
            .pop_front()
        {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted response left")),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.next_response(RecordedRequest::Post {
            url: url.to_string(),
            body: body.clone(),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        self.next_response(RecordedRequest::Get {
            url: url.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Events with the given `created` values, ids unique within the call.
pub fn xdai_events(created: impl IntoIterator<Item = i64>) -> Vec<PoapEvent> {
    created
        .into_iter()
        .enumerate()
        .map(|(i, created)| PoapEvent {
            id: format!("{created}-{i}"),
            token_count: (i % 7) as i64,
            transfer_count: (i % 3) as i64,
            created,
        })
        .collect()
}

/// A subgraph response body, BigInts encoded as strings like the real one.
pub fn xdai_page(events: &[PoapEvent]) -> Value {
    let events: Vec<Value> = events
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "tokenCount": e.token_count.to_string(),
                "transferCount": e.transfer_count.to_string(),
                "created": e.created.to_string(),
            })
        })
        .collect();
    json!({ "data": { "events": events } })
}

/// One `/paginated-events` item.
pub fn metadata_item(id: i64, start_date: &str) -> Value {
    json!({
        "id": id,
        "fancy_id": format!("event-{id}"),
        "name": format!("Event {id}"),
        "event_url": "https://decentraland.org",
        "image_url": format!("https://assets.poap.example/{id}.png"),
        "country": "",
        "city": "",
        "description": "Attendance badge",
        "year": 2021,
        "start_date": start_date,
        "end_date": start_date,
        "expiry_date": "01-Jan-2030",
        "from_admin": false,
        "virtual_event": true,
        "event_template_id": null,
        "event_host_id": 12,
        "private_event": false
    })
}

/// A `/paginated-events` response body.
pub fn metadata_page(items: impl IntoIterator<Item = Value>) -> Value {
    json!({ "items": items.into_iter().collect::<Vec<_>>() })
}

/// `count` items, ids starting at `first_id`, all on `start_date`.
pub fn metadata_items(first_id: i64, count: usize, start_date: &str) -> Vec<Value> {
    (0..count as i64)
        .map(|i| metadata_item(first_id + i, start_date))
        .collect()
}
