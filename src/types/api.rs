use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
}

/// One item of the stateless `input` array sent on every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: Role,
        content: Vec<ContentPart>,
    },
    FunctionCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        name: String,
        arguments: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

impl InputItem {
    pub fn message(role: Role, text: impl Into<String>) -> Self {
        Self::Message {
            role,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }
}

/// A function call exactly as it appeared in a reply, before defaults are
/// applied. Missing fields stay `None` so de-duplication compares what the
/// service actually sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFunctionCall {
    pub id: Option<String>,
    pub call_id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
    pub status: Option<String>,
}

impl RawFunctionCall {
    /// Reads a `function_call` output item. Anything else, including
    /// non-objects, yields `None`.
    pub fn from_output_item(item: &Value) -> Option<Self> {
        let object = item.as_object()?;
        if object.get("type").and_then(Value::as_str) != Some("function_call") {
            return None;
        }
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(ToOwned::to_owned);
        Some(Self {
            id: text("id"),
            call_id: text("call_id"),
            name: text("name"),
            arguments: text("arguments"),
            status: text("status"),
        })
    }

    pub fn identity_key(&self) -> (&str, &str, &str, &str) {
        (
            self.call_id.as_deref().unwrap_or(""),
            self.id.as_deref().unwrap_or(""),
            self.name.as_deref().unwrap_or(""),
            self.arguments.as_deref().unwrap_or(""),
        )
    }
}

/// A function call ready for dispatch: name and arguments defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub id: Option<String>,
    pub call_id: Option<String>,
    pub name: String,
    pub arguments: String,
    pub status: Option<String>,
}

impl FunctionCall {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            call_id: Some(call_id.into()),
            name: name.into(),
            arguments: arguments.into(),
            status: None,
        }
    }

    /// The id the continuation is keyed on: `call_id`, else `id`.
    pub fn continuation_id(&self) -> Option<&str> {
        self.call_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| self.id.as_deref().filter(|v| !v.is_empty()))
    }
}

/// Canonical reply shape shared by streamed and non-streamed responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub id: Option<String>,
    pub output: Vec<RawFunctionCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    pub handled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Success that ends the routing run.
    pub fn handled(data: Value) -> Self {
        Self {
            ok: true,
            handled: true,
            data: Some(data),
            error: None,
        }
    }

    /// Success that leaves the decision to the next turn.
    pub fn info(data: Value) -> Self {
        Self {
            ok: true,
            handled: false,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            handled: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.ok && self.handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_item_serializes_input_text_parts() {
        let item = InputItem::message(Role::Developer, "policy");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "message",
                "role": "developer",
                "content": [{ "type": "input_text", "text": "policy" }]
            })
        );
    }

    #[test]
    fn test_function_call_echo_omits_missing_ids() {
        let item = InputItem::FunctionCall {
            id: None,
            call_id: Some("call_1".to_string()),
            name: "send_feedback".to_string(),
            arguments: "{}".to_string(),
            status: Some("completed".to_string()),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "function_call");
        assert!(value.get("id").is_none());
        assert_eq!(value["call_id"], "call_1");
        assert_eq!(value["status"], "completed");
    }

    #[test]
    fn test_raw_call_ignores_non_function_items() {
        assert!(RawFunctionCall::from_output_item(&json!({"type": "message"})).is_none());
        assert!(RawFunctionCall::from_output_item(&json!("function_call")).is_none());
        let call = RawFunctionCall::from_output_item(&json!({
            "type": "function_call",
            "name": 42,
            "arguments": "{}",
            "call_id": "c1"
        }))
        .expect("function call item");
        assert_eq!(call.name, None);
        assert_eq!(call.call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_continuation_id_prefers_call_id() {
        let mut call = FunctionCall::new("call_a", "send_feedback", "{}");
        call.id = Some("fc_1".to_string());
        assert_eq!(call.continuation_id(), Some("call_a"));
        call.call_id = None;
        assert_eq!(call.continuation_id(), Some("fc_1"));
        call.id = Some(String::new());
        assert_eq!(call.continuation_id(), None);
    }

    #[test]
    fn test_tool_result_serialization_skips_empty_fields() {
        let value = serde_json::to_value(ToolResult::failure("nope")).unwrap();
        assert_eq!(value, json!({"ok": false, "handled": false, "error": "nope"}));
    }
}
