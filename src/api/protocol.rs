use crate::types::{FunctionCall, InputItem, RawFunctionCall, Reply, Role};
use serde_json::Value;
use std::collections::HashSet;

pub const REQUEST_LABEL: &str = "Transcribed request:";
pub const CONTEXT_LABEL: &str = "Ambient context:";

/// Turn-1 input: the routing policy as a developer message, then the
/// utterance with its ambient context.
pub fn build_initial_input(
    utterance: &str,
    ambient_context: &str,
    developer_prompt: &str,
) -> Vec<InputItem> {
    vec![
        InputItem::message(Role::Developer, developer_prompt),
        InputItem::message(
            Role::User,
            format!("{REQUEST_LABEL}\n{utterance}\n\n{CONTEXT_LABEL}\n{ambient_context}"),
        ),
    ]
}

/// Normalizes a non-streamed `{id?, output:[...]}` body. Non-object bodies
/// and non-array outputs yield an empty reply.
pub fn normalize_reply(body: &Value) -> Reply {
    let Some(object) = body.as_object() else {
        return Reply::default();
    };
    let id = object.get("id").and_then(Value::as_str).map(ToOwned::to_owned);
    let output = object
        .get("output")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(RawFunctionCall::from_output_item)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Reply {
        id,
        output: dedupe_calls(output),
    }
}

/// Keeps the first occurrence of each `(call_id, id, name, arguments)` tuple.
pub fn dedupe_calls(calls: Vec<RawFunctionCall>) -> Vec<RawFunctionCall> {
    let mut seen: HashSet<(String, String, String, String)> = HashSet::new();
    calls
        .into_iter()
        .filter(|call| {
            let (call_id, id, name, arguments) = call.identity_key();
            seen.insert((
                call_id.to_string(),
                id.to_string(),
                name.to_string(),
                arguments.to_string(),
            ))
        })
        .collect()
}

/// Function calls ready for dispatch: arguments default to `{}`, unnamed
/// calls are dropped.
pub fn extract_function_calls(reply: &Reply) -> Vec<FunctionCall> {
    reply
        .output
        .iter()
        .map(|raw| FunctionCall {
            id: raw.id.clone(),
            call_id: raw.call_id.clone(),
            name: raw.name.clone().unwrap_or_default(),
            arguments: raw.arguments.clone().unwrap_or_else(|| "{}".to_string()),
            status: raw.status.clone(),
        })
        .filter(|call| !call.name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentPart;
    use serde_json::json;

    #[test]
    fn test_initial_input_has_developer_then_user_message() {
        let input = build_initial_input("terminal git status", "{\"editor\":{}}", "POLICY");
        assert_eq!(input.len(), 2);
        assert_eq!(input[0], InputItem::message(Role::Developer, "POLICY"));
        match &input[1] {
            InputItem::Message { role, content } => {
                assert_eq!(*role, Role::User);
                let ContentPart::InputText { text } = &content[0];
                assert_eq!(
                    text,
                    "Transcribed request:\nterminal git status\n\nAmbient context:\n{\"editor\":{}}"
                );
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_reply_filters_and_dedupes() {
        let body = json!({
            "id": "resp_1",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "function_call", "call_id": "c1", "name": "send_feedback", "arguments": "{\"message\":\"hi\"}"},
                "garbage",
                {"type": "function_call", "call_id": "c1", "name": "send_feedback", "arguments": "{\"message\":\"hi\"}"}
            ]
        });
        let reply = normalize_reply(&body);
        assert_eq!(reply.id.as_deref(), Some("resp_1"));
        assert_eq!(reply.output.len(), 1);
    }

    #[test]
    fn test_normalize_reply_tolerates_bad_envelopes() {
        assert_eq!(normalize_reply(&json!("nope")), Reply::default());
        let reply = normalize_reply(&json!({"id": "r", "output": {"type": "function_call"}}));
        assert_eq!(reply.id.as_deref(), Some("r"));
        assert!(reply.output.is_empty());
    }

    #[test]
    fn test_extract_defaults_arguments_and_drops_unnamed() {
        let reply = normalize_reply(&json!({
            "output": [
                {"type": "function_call", "call_id": "a", "name": "read_clipboard"},
                {"type": "function_call", "call_id": "b", "arguments": "{}"},
                {"type": "function_call", "call_id": "c", "name": "", "arguments": "{}"}
            ]
        }));
        let calls = extract_function_calls(&reply);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_clipboard");
        assert_eq!(calls[0].arguments, "{}");
        assert_eq!(calls[0].call_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_dedupe_distinguishes_by_arguments() {
        let call = |args: &str| RawFunctionCall {
            call_id: Some("c".to_string()),
            name: Some("execute_keypress".to_string()),
            arguments: Some(args.to_string()),
            ..RawFunctionCall::default()
        };
        let calls = dedupe_calls(vec![call("{\"keys\":\"a\"}"), call("{\"keys\":\"b\"}"), call("{\"keys\":\"a\"}")]);
        assert_eq!(calls.len(), 2);
    }
}
