use super::error::{RoutingError, TransportFailure};
use super::logging::{debug_payload_enabled, emit_debug_payload};
use super::protocol::normalize_reply;
use super::stream::read_sse_reply;
use crate::config::Config;
use crate::tools;
use crate::types::{InputItem, Reply};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Some deployments reject empty instructions. The routing policy itself
/// travels as the developer message.
pub const INSTRUCTIONS: &str = "You are Codex, based on GPT-5.";

/// One remote round-trip. Implemented by [`ApiClient`] and by the scripted
/// mock used in tests.
#[async_trait]
pub trait ResponsesTransport: Send + Sync {
    async fn complete(&self, input: &[InputItem]) -> Result<Reply, RoutingError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    account_id: Option<String>,
    model: String,
    request_url: String,
    stream: bool,
    requests: Arc<AtomicUsize>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            account_id: config.account_id.clone(),
            model: config.model.clone(),
            request_url: resolve_request_url(&config.api_url),
            stream: config.stream,
            requests: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn build_payload(&self, input: &[InputItem]) -> Value {
        json!({
            "model": self.model,
            "instructions": INSTRUCTIONS,
            "store": false,
            "stream": self.stream,
            "input": input,
            "tools": tools::definitions(),
            "tool_choice": "auto",
            "parallel_tool_calls": false,
        })
    }

    async fn send(&self, input: &[InputItem]) -> Result<Reply, TransportFailure> {
        let payload = self.build_payload(input);
        let sequence = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        if debug_payload_enabled() {
            emit_debug_payload(&self.request_url, sequence, &payload);
        }

        let mut request = self
            .http
            .post(&self.request_url)
            .header("content-type", "application/json")
            .json(&payload);
        if self.stream {
            request = request.header("accept", "text/event-stream");
        }
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        if let Some(account_id) = &self.account_id {
            request = request.header("chatgpt-account-id", account_id);
        }

        let response = request.send().await.map_err(TransportFailure::Request)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportFailure::Http {
                status: status.as_u16(),
                body,
            });
        }

        let streamed = reply_is_event_stream(response.headers()).unwrap_or(self.stream);
        if streamed {
            read_sse_reply(response.bytes_stream()).await
        } else {
            let text = response.text().await.map_err(TransportFailure::Request)?;
            let body: Value = serde_json::from_str(&text).map_err(|error| {
                TransportFailure::Protocol(format!("reply was not JSON ({error}): {text}"))
            })?;
            Ok(normalize_reply(&body))
        }
    }
}

#[async_trait]
impl ResponsesTransport for ApiClient {
    async fn complete(&self, input: &[InputItem]) -> Result<Reply, RoutingError> {
        self.send(input)
            .await
            .map_err(|failure| RoutingError::classify(&self.request_url, &self.model, failure))
    }
}

/// The reply shape the server actually sent, which may ignore the requested
/// `stream` flag. `None` when the content type says neither.
fn reply_is_event_stream(headers: &reqwest::header::HeaderMap) -> Option<bool> {
    let content_type = headers
        .get(reqwest::header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .to_ascii_lowercase();
    if content_type.starts_with("text/event-stream") {
        Some(true)
    } else if content_type.contains("json") {
        Some(false)
    } else {
        None
    }
}

/// Accepts either the full responses endpoint or its base URL.
fn resolve_request_url(api_url: &str) -> String {
    let normalized = api_url.trim().trim_end_matches('/');
    if normalized.ends_with("/responses") {
        normalized.to_string()
    } else {
        format!("{normalized}/responses")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandoffCommands;
    use crate::types::Role;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn config(api_url: &str, stream: bool) -> Config {
        Config {
            api_url: api_url.to_string(),
            api_key: Some("test-key".to_string()),
            account_id: None,
            model: "gpt-5-codex-mini".to_string(),
            timeout_ms: 5_000,
            stream,
            max_turns: 6,
            handoff: HandoffCommands::default(),
            working_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn test_request_url_appends_responses_path() {
        assert_eq!(
            resolve_request_url("https://chatgpt.com/backend-api/codex/"),
            "https://chatgpt.com/backend-api/codex/responses"
        );
        assert_eq!(
            resolve_request_url(" http://localhost:8000/v1/responses "),
            "http://localhost:8000/v1/responses"
        );
    }

    #[test]
    fn test_reply_shape_follows_content_type() {
        use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

        let mut headers = HeaderMap::new();
        assert_eq!(reply_is_event_stream(&headers), None);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream; charset=utf-8"));
        assert_eq!(reply_is_event_stream(&headers), Some(true));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(reply_is_event_stream(&headers), Some(false));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(reply_is_event_stream(&headers), None);
    }

    #[test]
    fn test_payload_shape() {
        let client = ApiClient::new(&config("http://localhost:8000/v1", true)).expect("client");
        let input = vec![InputItem::message(Role::User, "hello")];
        let payload = client.build_payload(&input);

        assert_eq!(payload["model"], "gpt-5-codex-mini");
        assert_eq!(payload["instructions"], INSTRUCTIONS);
        assert_eq!(payload["store"], false);
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["tool_choice"], "auto");
        assert_eq!(payload["parallel_tool_calls"], false);
        assert_eq!(payload["input"][0]["role"], "user");
        assert_eq!(payload["input"][0]["content"][0]["type"], "input_text");
    }

    #[test]
    fn test_payload_tools_match_dispatchable_names() {
        let client = ApiClient::new(&config("http://localhost:8000/v1", false)).expect("client");
        let payload = client.build_payload(&[]);
        let names: BTreeSet<String> = payload["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .filter_map(|tool| tool.get("name").and_then(Value::as_str))
            .map(ToOwned::to_owned)
            .collect();
        let expected: BTreeSet<String> = tools::ToolName::ALL
            .iter()
            .map(|name| name.as_str().to_string())
            .collect();
        assert_eq!(names, expected);
    }
}
