//! The turn loop: send the conversation, dispatch the calls the model
//! returns, feed results back, and stop at the first handled action.

mod prompt;

pub use prompt::ROUTER_DEVELOPER_PROMPT;

use crate::api::protocol::{build_initial_input, extract_function_calls};
use crate::api::{ResponsesTransport, RoutingError};
use crate::config::{Config, HandoffCommands, DEFAULT_MAX_TURNS};
use crate::context::{
    build_ambient_context, TerminalContextTracker, EDITOR_LINES_AFTER, EDITOR_LINES_BEFORE,
    TERMINAL_MAX_LINES,
};
use crate::host::Host;
use crate::tools::Dispatcher;
use crate::types::{FunctionCall, InputItem, ToolResult};
use std::sync::Arc;

const UNSERIALIZABLE_RESULT: &str =
    r#"{"ok":false,"handled":false,"error":"unserializable tool result"}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    pub max_turns: usize,
    pub editor_lines_before: usize,
    pub editor_lines_after: usize,
    pub terminal_max_lines: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            editor_lines_before: EDITOR_LINES_BEFORE,
            editor_lines_after: EDITOR_LINES_AFTER,
            terminal_max_lines: TERMINAL_MAX_LINES,
        }
    }
}

impl RouterOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_turns: config.max_turns.max(1),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhandledReason {
    /// The model answered without calling any tool.
    NoToolCall,
    TurnBudgetExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Handled {
        tool: String,
        turns: usize,
        result: ToolResult,
    },
    Unhandled {
        reason: UnhandledReason,
        turns: usize,
    },
}

impl RouteOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }

    /// Remote round-trips the run made.
    pub fn turns(&self) -> usize {
        match self {
            Self::Handled { turns, .. } | Self::Unhandled { turns, .. } => *turns,
        }
    }
}

/// What one dispatched batch leaves behind.
enum TurnStep {
    Done { tool: String, result: ToolResult },
    Continue(Vec<InputItem>),
}

/// Routes utterances through a tool-calling model. Holds no per-run state,
/// so one router serves any number of sequential runs.
pub struct Router {
    transport: Arc<dyn ResponsesTransport>,
    host: Arc<dyn Host>,
    terminals: Arc<TerminalContextTracker>,
    dispatcher: Dispatcher,
    options: RouterOptions,
}

impl Router {
    pub fn new(
        transport: Arc<dyn ResponsesTransport>,
        host: Arc<dyn Host>,
        terminals: Arc<TerminalContextTracker>,
        handoff: HandoffCommands,
        options: RouterOptions,
    ) -> Self {
        let dispatcher = Dispatcher::new(host.clone(), terminals.clone(), handoff);
        Self {
            transport,
            host,
            terminals,
            dispatcher,
            options,
        }
    }

    pub async fn route(&self, utterance: &str) -> Result<RouteOutcome, RoutingError> {
        let ambient = build_ambient_context(
            self.host.as_ref(),
            &self.terminals,
            self.options.editor_lines_before,
            self.options.editor_lines_after,
            self.options.terminal_max_lines,
        )
        .await;
        let mut input = build_initial_input(utterance, &ambient, ROUTER_DEVELOPER_PROMPT);

        for turn in 0..self.options.max_turns {
            let turns = turn + 1;
            tracing::debug!(turn = turns, items = input.len(), "awaiting reply");
            let reply = self.transport.complete(&input).await?;

            let calls = extract_function_calls(&reply);
            if calls.is_empty() {
                tracing::info!(turns, "model made no tool call; unhandled");
                return Ok(RouteOutcome::Unhandled {
                    reason: UnhandledReason::NoToolCall,
                    turns,
                });
            }

            match self.dispatch_batch(turn, &calls).await {
                TurnStep::Done { tool, result } => {
                    tracing::info!(%tool, turns, "handled");
                    return Ok(RouteOutcome::Handled {
                        tool,
                        turns,
                        result,
                    });
                }
                TurnStep::Continue(next) => input = next,
            }
        }

        tracing::info!(
            turns = self.options.max_turns,
            "turn budget exhausted; unhandled"
        );
        Ok(RouteOutcome::Unhandled {
            reason: UnhandledReason::TurnBudgetExhausted,
            turns: self.options.max_turns,
        })
    }

    /// Runs calls in order. Each call is echoed with its output; the first
    /// handled result ends the batch and the calls after it never run.
    async fn dispatch_batch(&self, turn: usize, calls: &[FunctionCall]) -> TurnStep {
        let mut next = Vec::with_capacity(calls.len() * 2);

        for (index, call) in calls.iter().enumerate() {
            let result = self.dispatcher.dispatch(call).await;
            tracing::debug!(
                tool = %call.name,
                ok = result.ok,
                handled = result.handled,
                error = result.error.as_deref().unwrap_or_default(),
                "dispatched"
            );

            if result.is_terminal() {
                return TurnStep::Done {
                    tool: call.name.clone(),
                    result,
                };
            }
            next.extend(continuation_items(turn, index, call, &result));
        }

        TurnStep::Continue(next)
    }
}

/// The echoed call and its output, keyed on the call's id. Calls with
/// neither `call_id` nor `id` get a synthesized one so the pair still links.
pub fn continuation_items(
    turn: usize,
    index: usize,
    call: &FunctionCall,
    result: &ToolResult,
) -> [InputItem; 2] {
    let call_id = call
        .continuation_id()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("call_{turn}_{index}"));
    let output = serde_json::to_string(result).unwrap_or_else(|error| {
        tracing::debug!(%error, "tool result did not serialize");
        UNSERIALIZABLE_RESULT.to_string()
    });

    [
        InputItem::FunctionCall {
            id: call.id.clone(),
            call_id: Some(call_id.clone()),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            status: Some(
                call.status
                    .clone()
                    .unwrap_or_else(|| "completed".to_string()),
            ),
        },
        InputItem::FunctionCallOutput { call_id, output },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_continuation_prefers_call_id_then_id_then_synthesized() {
        let result = ToolResult::failure("nope");

        let call = FunctionCall::new("call_a", "send_feedback", "{}");
        let [echo, output] = continuation_items(0, 0, &call, &result);
        assert_eq!(
            serde_json::to_value(&echo).unwrap(),
            json!({
                "type": "function_call",
                "call_id": "call_a",
                "name": "send_feedback",
                "arguments": "{}",
                "status": "completed"
            })
        );
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({
                "type": "function_call_output",
                "call_id": "call_a",
                "output": "{\"ok\":false,\"handled\":false,\"error\":\"nope\"}"
            })
        );

        let mut by_id = call.clone();
        by_id.call_id = None;
        by_id.id = Some("fc_1".to_string());
        let [_, output] = continuation_items(0, 0, &by_id, &result);
        assert!(matches!(output, InputItem::FunctionCallOutput { call_id, .. } if call_id == "fc_1"));

        let mut anonymous = by_id;
        anonymous.id = None;
        let [_, output] = continuation_items(2, 1, &anonymous, &result);
        assert!(matches!(output, InputItem::FunctionCallOutput { call_id, .. } if call_id == "call_2_1"));
    }

    #[test]
    fn test_echo_keeps_reported_status() {
        let mut call = FunctionCall::new("call_a", "read_clipboard", "{}");
        call.status = Some("in_progress".to_string());
        let [echo, _] = continuation_items(0, 0, &call, &ToolResult::info(json!({})));
        assert!(matches!(echo, InputItem::FunctionCall { status: Some(status), .. } if status == "in_progress"));
    }

    #[test]
    fn test_default_options() {
        assert_eq!(RouterOptions::default().max_turns, 6);
        assert_eq!(RouterOptions::default().terminal_max_lines, 80);
    }
}
