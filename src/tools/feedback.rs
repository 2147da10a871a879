use anyhow::Result;
use serde_json::{json, Value};

use super::args::required_string;
use crate::host::Host;
use crate::types::ToolResult;

pub(super) async fn send_feedback(host: &dyn Host, args: &Value) -> Result<ToolResult> {
    let message = required_string(args, "message", &["message", "text"])?;
    host.show_message(message).await?;
    Ok(ToolResult::handled(json!({ "message": message })))
}
