//! Output channels of a run: the Singer message stream and the child
//! context sink.

use std::io::Write;

use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};
use sync_core::Message;

/// Writes Singer messages as newline-delimited JSON.
pub struct MessageWriter<W: Write> {
    out: W,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write one message as a single line.
    ///
    /// STATE messages are flushed immediately so a consumer never sees a
    /// bookmark before the records it covers.
    pub fn write(&mut self, message: &Message) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, message).context("Failed to serialize message")?;
        self.out
            .write_all(b"\n")
            .context("Failed to write message")?;

        if matches!(message, Message::State { .. }) {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.out.flush().context("Failed to flush output")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Receiver of parent-to-child keys produced while a stream is synced.
pub trait ContextSink {
    /// Accept the context derived from one record of `parent_stream`.
    fn send<T: Serialize>(&mut self, parent_stream: &str, context: &T) -> anyhow::Result<()>;

    /// Make every context sent so far durable. Called before a checkpoint
    /// covering those contexts is persisted.
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Drops every context.
#[derive(Debug, Default)]
pub struct DiscardContexts;

impl ContextSink for DiscardContexts {
    fn send<T: Serialize>(&mut self, _parent_stream: &str, _context: &T) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes contexts as JSON lines `{"parent_stream": .., "context": {..}}`.
pub struct JsonlContextSink<W: Write> {
    out: W,
}

impl<W: Write> JsonlContextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ContextSink for JsonlContextSink<W> {
    fn send<T: Serialize>(&mut self, parent_stream: &str, context: &T) -> anyhow::Result<()> {
        let line = json!({
            "parent_stream": parent_stream,
            "context": serde_json::to_value(context)?,
        });
        serde_json::to_writer(&mut self.out, &line)?;
        self.out
            .write_all(b"\n")
            .context("Failed to write child context")
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.out.flush().context("Failed to flush child contexts")
    }
}

/// Keeps every context in memory.
#[derive(Debug, Default)]
pub struct CollectContexts {
    pub contexts: Vec<(String, Value)>,
}

impl ContextSink for CollectContexts {
    fn send<T: Serialize>(&mut self, parent_stream: &str, context: &T) -> anyhow::Result<()> {
        self.contexts
            .push((parent_stream.to_string(), serde_json::to_value(context)?));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decentraland_poaps_source::PoapEventContext;

    #[test]
    fn test_messages_are_one_per_line() {
        let mut writer = MessageWriter::new(Vec::new());
        writer
            .write(&Message::record("poaps_xdai", json!({"id": "1"})))
            .unwrap();
        writer
            .write(&Message::state(json!({"bookmarks": {}})))
            .unwrap();

        let out = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "RECORD");
        assert_eq!(lines[1]["type"], "STATE");
    }

    #[test]
    fn test_jsonl_context_sink() {
        let mut sink = JsonlContextSink::new(Vec::new());
        sink.send(
            "poaps_xdai",
            &PoapEventContext {
                poap_id: "42".to_string(),
            },
        )
        .unwrap();

        let out = String::from_utf8(sink.out).unwrap();
        let line: Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(
            line,
            json!({"parent_stream": "poaps_xdai", "context": {"poap_id": "42"}})
        );
    }
}
