use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use super::args::first_string;
use super::keypress::strip_leading_word;
use crate::config::HandoffCommands;
use crate::host::Host;
use crate::types::ToolResult;

/// Delivers the prompt to the assistant surface: focus it when possible,
/// write the prompt to a temp file, then hand that file to the add-file
/// command.
pub(super) async fn execute_agent_handoff(
    host: &dyn Host,
    handoff: &HandoffCommands,
    args: &Value,
) -> Result<ToolResult> {
    let prompt = strip_agent_prefix(first_string(args, &["prompt", "text"]).unwrap_or(""));
    if prompt.is_empty() {
        return Ok(ToolResult::failure("prompt is required."));
    }
    if !host.has_command(&handoff.add_file).await {
        return Ok(ToolResult::failure(format!(
            "Handoff command unavailable: {}",
            handoff.add_file
        )));
    }

    if host.has_command(&handoff.focus).await {
        host.execute_command(&handoff.focus, &[])
            .await
            .with_context(|| format!("Failed to run {}", handoff.focus))?;
    }

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let prompt_file = host
        .write_temp_file(&format!("voice-prompt-agent-{millis}.md"), prompt)
        .await
        .context("Failed to write handoff prompt file")?;
    let prompt_path = prompt_file.display().to_string();

    let attempts = [
        json!(prompt_path),
        json!({ "uri": prompt_path }),
        json!({ "resource": prompt_path }),
        json!({ "fileUri": prompt_path }),
        json!({ "path": prompt_path }),
    ];

    let mut last_error = None;
    for payload in attempts {
        match host
            .execute_command(&handoff.add_file, std::slice::from_ref(&payload))
            .await
        {
            Ok(_) => return Ok(delivered(prompt, &handoff.add_file)),
            Err(error) => {
                tracing::debug!(command = %handoff.add_file, %payload, %error, "handoff payload rejected");
                last_error = Some(error);
            }
        }
    }

    // Some surfaces read the active editor when invoked without arguments.
    let fallback = async {
        host.open_document(&prompt_file).await?;
        host.execute_command(&handoff.add_file, &[]).await
    };
    match fallback.await {
        Ok(_) => Ok(delivered(prompt, &handoff.add_file)),
        Err(error) => Ok(ToolResult::failure(format!(
            "{} failed. Last errors: [payload] {} | [fallback] {error:#}",
            handoff.add_file,
            last_error.map_or_else(|| "none".to_string(), |e| format!("{e:#}")),
        ))),
    }
}

fn delivered(prompt: &str, via: &str) -> ToolResult {
    ToolResult::handled(json!({ "prompt": prompt, "via": via }))
}

/// Drops a leading `agent` word and an optional colon.
pub fn strip_agent_prefix(value: &str) -> &str {
    strip_leading_word(value, "agent").trim()
}
