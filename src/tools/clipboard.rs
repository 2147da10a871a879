use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::args::required_string_preserve;
use crate::host::Host;
use crate::types::ToolResult;

/// Clipboard contents feed the next turn; reading never ends the run.
pub(super) async fn read_clipboard(host: &dyn Host) -> Result<ToolResult> {
    let text = host
        .read_clipboard()
        .await
        .context("Failed to read clipboard")?;
    Ok(ToolResult::info(json!({
        "length": text.chars().count(),
        "text": text,
    })))
}

pub(super) async fn write_clipboard(host: &dyn Host, args: &Value) -> Result<ToolResult> {
    let text = required_string_preserve(args, "text", &["text", "content"])?;
    host.write_clipboard(text)
        .await
        .context("Failed to write clipboard")?;
    Ok(ToolResult::handled(json!({ "length": text.chars().count() })))
}
