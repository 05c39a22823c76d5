//! Messages written to the output channel.
//!
//! The output is newline-delimited JSON following the Singer tap format, so
//! any Singer target can load it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::StreamSchema;
use crate::stream::StreamDescriptor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// Announces the record layout of a stream before its first record.
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
        bookmark_properties: Vec<String>,
    },
    /// One extracted record.
    Record {
        stream: String,
        record: Value,
        time_extracted: DateTime<Utc>,
    },
    /// Bookmarks of all streams synced so far in this run.
    State { value: Value },
}

impl Message {
    pub fn schema(descriptor: &StreamDescriptor, schema: &StreamSchema) -> Self {
        Message::Schema {
            stream: descriptor.name.to_string(),
            schema: schema.to_json_schema(),
            key_properties: descriptor
                .key_properties
                .iter()
                .map(|k| k.to_string())
                .collect(),
            bookmark_properties: vec![descriptor.replication_key.to_string()],
        }
    }

    pub fn record(stream: &str, record: Value) -> Self {
        Message::Record {
            stream: stream.to_string(),
            record,
            time_extracted: Utc::now(),
        }
    }

    pub fn state(value: Value) -> Self {
        Message::State { value }
    }

    /// Stream the message belongs to; `None` for STATE.
    pub fn stream(&self) -> Option<&str> {
        match self {
            Message::Schema { stream, .. } | Message::Record { stream, .. } => {
                Some(stream.as_str())
            }
            Message::State { .. } => None,
        }
    }
}
