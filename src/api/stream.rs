use crate::api::error::TransportFailure;
use crate::api::protocol::dedupe_calls;
use crate::types::{RawFunctionCall, Reply};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;

pub const OUTPUT_ITEM_DONE: &str = "response.output_item.done";
pub const RESPONSE_COMPLETED: &str = "response.completed";
pub const RESPONSE_FAILED: &str = "response.failed";
pub const RESPONSE_INCOMPLETE: &str = "response.incomplete";
pub const STREAM_ERROR: &str = "error";

/// Splits a server-sent-event byte stream into JSON event payloads.
#[derive(Default)]
pub struct StreamParser {
    buffer: String,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        let mut start = 0;

        while let Some(end) = self.buffer[start..].find("\n\n") {
            let event_end = start + end + 2;
            if let Some(event) = parse_event_block(&self.buffer[start..event_end]) {
                events.push(event);
            }
            start = event_end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        events
    }

    /// Parses whatever is left once the byte stream ends without a final
    /// blank line.
    pub fn finish(&mut self) -> Vec<Value> {
        let rest = std::mem::take(&mut self.buffer);
        parse_event_block(&rest).into_iter().collect()
    }
}

fn parse_event_block(block: &str) -> Option<Value> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_type = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");
    if data.trim() == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<Value>(&data) {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::debug!(
                event_type = event_type.unwrap_or("<none>"),
                %error,
                "skipping unparseable stream event"
            );
            None
        }
    }
}

/// Accumulates function calls from `response.output_item.done` and
/// `response.completed` events. The same call usually arrives through both;
/// `finish` coalesces them.
///
/// A stream that reports `error`, `response.failed` or `response.incomplete`,
/// or that ends before `response.completed`, finishes as a transport failure.
#[derive(Debug, Default)]
pub struct ReplyCollector {
    response_id: Option<String>,
    calls: Vec<RawFunctionCall>,
    completed: bool,
    failure: Option<StreamFailure>,
}

/// A failure the service reported inside an otherwise successful stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub status: Option<u16>,
    pub detail: String,
}

impl StreamFailure {
    fn into_transport(self) -> TransportFailure {
        match self.status {
            Some(status) => TransportFailure::Http {
                status,
                body: self.detail,
            },
            None => TransportFailure::Protocol(self.detail),
        }
    }
}

impl ReplyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &Value) {
        let Some(object) = event.as_object() else {
            return;
        };
        match object.get("type").and_then(Value::as_str).unwrap_or("") {
            OUTPUT_ITEM_DONE => {
                if let Some(call) = object.get("item").and_then(RawFunctionCall::from_output_item) {
                    self.calls.push(call);
                }
            }
            RESPONSE_COMPLETED => {
                self.completed = true;
                let Some(response) = object.get("response").and_then(Value::as_object) else {
                    return;
                };
                if let Some(id) = response.get("id").and_then(Value::as_str) {
                    self.response_id = Some(id.to_string());
                }
                if let Some(output) = response.get("output").and_then(Value::as_array) {
                    self.calls
                        .extend(output.iter().filter_map(RawFunctionCall::from_output_item));
                }
            }
            STREAM_ERROR => self.fail(error_failure(object.get("error").unwrap_or(event))),
            RESPONSE_FAILED => {
                let error = object.get("response").and_then(|response| response.get("error"));
                self.fail(error.map_or_else(
                    || StreamFailure {
                        status: None,
                        detail: "response failed".to_string(),
                    },
                    error_failure,
                ));
            }
            RESPONSE_INCOMPLETE => {
                let reason = object
                    .get("response")
                    .and_then(|response| response.pointer("/incomplete_details/reason"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                self.fail(StreamFailure {
                    status: None,
                    detail: format!("response incomplete: {reason}"),
                });
            }
            _ => {}
        }
    }

    /// Keeps the first reported failure; later ones are usually echoes of it.
    fn fail(&mut self, failure: StreamFailure) {
        if self.failure.is_none() {
            tracing::debug!(status = ?failure.status, detail = %failure.detail, "stream reported failure");
            self.failure = Some(failure);
        }
    }

    pub fn finish(self) -> Result<Reply, TransportFailure> {
        if let Some(failure) = self.failure {
            return Err(failure.into_transport());
        }
        if !self.completed {
            return Err(TransportFailure::Protocol(
                "stream ended before response.completed".to_string(),
            ));
        }
        Ok(Reply {
            id: self.response_id,
            output: dedupe_calls(self.calls),
        })
    }
}

/// Reads `{code, message, status}` from a stream error payload. Numeric
/// statuses are kept; quota codes map to 429.
fn error_failure(error: &Value) -> StreamFailure {
    let code = error.get("code").and_then(Value::as_str);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("stream error");
    let status = ["status", "status_code"]
        .iter()
        .find_map(|key| error.get(*key).and_then(Value::as_u64))
        .or_else(|| error.get("code").and_then(Value::as_u64))
        .and_then(|status| u16::try_from(status).ok())
        .or(match code {
            Some("rate_limit_exceeded" | "insufficient_quota") => Some(429),
            _ => None,
        });

    StreamFailure {
        status,
        detail: match code {
            Some(code) => format!("{code}: {message}"),
            None => message.to_string(),
        },
    }
}

/// Drains an event stream into a canonical reply. Unrecognized and malformed
/// events are skipped.
pub async fn collect_streamed_reply<S>(events: S) -> Result<Reply, TransportFailure>
where
    S: Stream<Item = Value>,
{
    let mut collector = ReplyCollector::new();
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        collector.push(&event);
    }
    collector.finish()
}

/// Frames a raw SSE body and collects it into a reply. A chunk read error
/// aborts with that error.
pub async fn read_sse_reply<S>(chunks: S) -> Result<Reply, TransportFailure>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    let mut parser = StreamParser::new();
    let mut collector = ReplyCollector::new();
    futures::pin_mut!(chunks);

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(TransportFailure::Request)?;
        for event in parser.process(&chunk) {
            collector.push(&event);
        }
    }
    for event in parser.finish() {
        collector.push(&event);
    }

    collector.finish()
}
