use anyhow::Result;
use serde_json::{json, Value};

use super::args::required_string;
use crate::host::Host;
use crate::types::ToolResult;

pub(super) async fn execute_host_command(host: &dyn Host, args: &Value) -> Result<ToolResult> {
    let command_id = required_string(args, "commandId", &["commandId", "command", "id"])?;
    if !host.has_command(command_id).await {
        return Ok(ToolResult::failure(format!(
            "Unknown host command: {command_id}"
        )));
    }

    let command_args = normalize_command_args(args.get("args"));
    match host.execute_command(command_id, &command_args).await {
        Ok(result) => Ok(ToolResult::handled(json!({
            "commandId": command_id,
            "argsCount": command_args.len(),
            "result": simplify_result(&result),
        }))),
        Err(error) => Ok(ToolResult::failure(format!(
            "Failed to execute host command '{command_id}': {error:#}"
        ))),
    }
}

fn normalize_command_args(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

/// Scalars pass through; containers are summarized so large host results
/// never flow back into the conversation.
fn simplify_result(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::String(format!("[array:{}]", items.len())),
        Value::Object(_) => Value::String("[object]".to_string()),
        scalar => scalar.clone(),
    }
}
