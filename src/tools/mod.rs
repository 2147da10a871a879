mod args;
mod clipboard;
mod commands;
mod definitions;
mod editor;
mod feedback;
mod handoff;
pub mod keypress;
mod search;
mod terminal;

pub use definitions::definitions;
pub use handoff::strip_agent_prefix;
pub use keypress::{encode_keys, KeyAction, KeyStroke};
pub use search::MAX_WORKSPACE_FILES;

use crate::config::HandoffCommands;
use crate::context::terminal::TerminalContextTracker;
use crate::host::Host;
use crate::types::{FunctionCall, ToolResult};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

/// The fixed tool set the model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    InsertTerminalCommand,
    ExecuteEditorControl,
    ApplyEditorEdit,
    SearchProjectFiles,
    SearchAvailableCommands,
    ExecuteHostCommand,
    ExecuteAgentHandoff,
    ExecuteKeypress,
    ReadClipboard,
    WriteClipboard,
    SendFeedback,
}

impl ToolName {
    pub const ALL: [ToolName; 11] = [
        Self::InsertTerminalCommand,
        Self::ExecuteEditorControl,
        Self::ApplyEditorEdit,
        Self::SearchProjectFiles,
        Self::SearchAvailableCommands,
        Self::ExecuteHostCommand,
        Self::ExecuteAgentHandoff,
        Self::ExecuteKeypress,
        Self::ReadClipboard,
        Self::WriteClipboard,
        Self::SendFeedback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsertTerminalCommand => "insert_terminal_command",
            Self::ExecuteEditorControl => "execute_editor_control",
            Self::ApplyEditorEdit => "apply_editor_edit",
            Self::SearchProjectFiles => "search_project_files",
            Self::SearchAvailableCommands => "search_available_commands",
            Self::ExecuteHostCommand => "execute_host_command",
            Self::ExecuteAgentHandoff => "execute_agent_handoff",
            Self::ExecuteKeypress => "execute_keypress",
            Self::ReadClipboard => "read_clipboard",
            Self::WriteClipboard => "write_clipboard",
            Self::SendFeedback => "send_feedback",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs tool calls against a host. Every outcome, including bad input and
/// host failures, comes back as a [`ToolResult`].
#[derive(Clone)]
pub struct Dispatcher {
    host: Arc<dyn Host>,
    terminals: Arc<TerminalContextTracker>,
    handoff: HandoffCommands,
}

impl Dispatcher {
    pub fn new(
        host: Arc<dyn Host>,
        terminals: Arc<TerminalContextTracker>,
        handoff: HandoffCommands,
    ) -> Self {
        Self {
            host,
            terminals,
            handoff,
        }
    }

    pub async fn dispatch(&self, call: &FunctionCall) -> ToolResult {
        let Some(tool) = ToolName::parse(&call.name) else {
            tracing::debug!(name = %call.name, "unsupported tool call");
            return ToolResult::failure("Unsupported tool call.");
        };
        let Some(args) = parse_arguments(&call.arguments) else {
            tracing::debug!(%tool, arguments = %call.arguments, "invalid tool arguments");
            return ToolResult::failure("Invalid tool arguments JSON.");
        };
        self.execute(tool, &args).await
    }

    pub async fn execute(&self, tool: ToolName, args: &Value) -> ToolResult {
        match self.run(tool, args).await {
            Ok(result) => result,
            Err(error) => {
                let message = format!("{error:#}");
                tracing::debug!(%tool, error = %message, "tool failed");
                ToolResult::failure(message)
            }
        }
    }

    async fn run(&self, tool: ToolName, args: &Value) -> Result<ToolResult> {
        let host = self.host.as_ref();
        match tool {
            ToolName::InsertTerminalCommand => {
                terminal::insert_terminal_command(host, &self.terminals, args).await
            }
            ToolName::ExecuteEditorControl => editor::execute_editor_control(host, args).await,
            ToolName::ApplyEditorEdit => editor::apply_editor_edit(host, args).await,
            ToolName::SearchProjectFiles => search::search_project_files(host, args).await,
            ToolName::SearchAvailableCommands => {
                search::search_available_commands(host, args).await
            }
            ToolName::ExecuteHostCommand => commands::execute_host_command(host, args).await,
            ToolName::ExecuteAgentHandoff => {
                handoff::execute_agent_handoff(host, &self.handoff, args).await
            }
            ToolName::ExecuteKeypress => keypress::execute_keypress(host, args).await,
            ToolName::ReadClipboard => clipboard::read_clipboard(host).await,
            ToolName::WriteClipboard => clipboard::write_clipboard(host, args).await,
            ToolName::SendFeedback => feedback::send_feedback(host, args).await,
        }
    }
}

/// Arguments must decode to a JSON object; blank arguments mean `{}`.
fn parse_arguments(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return Some(Value::Object(Default::default()));
    }
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(Value::is_object)
}
