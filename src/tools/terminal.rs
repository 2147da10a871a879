use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::args::required_string;
use crate::context::terminal::TerminalContextTracker;
use crate::host::Host;
use crate::types::ToolResult;

/// Types the command into the active terminal (creating one if needed)
/// without running it, and records it in that session's transcript.
pub(super) async fn insert_terminal_command(
    host: &dyn Host,
    terminals: &TerminalContextTracker,
    args: &Value,
) -> Result<ToolResult> {
    let command = required_string(args, "command", &["command", "cmd"])?;

    let terminal = match host.active_terminal().await {
        Some(terminal) => terminal,
        None => host
            .create_terminal()
            .await
            .context("Failed to create terminal")?,
    };

    host.send_terminal_text(&terminal.session, command).await?;
    terminals.record_command(&terminal.session, command);

    Ok(ToolResult::handled(json!({
        "inserted": command,
        "terminal": terminal.name,
    })))
}
