use anyhow::Result;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use super::args::{self, first_string, required_string};
use crate::host::{position_after_insert, FocusTarget, Host, Position, Range};
use crate::types::ToolResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorAction {
    GotoLine,
    OpenFileAtLine,
    FocusTerminal,
    FocusEditor,
}

impl EditorAction {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "goto_line" => Some(Self::GotoLine),
            "open_file_at_line" => Some(Self::OpenFileAtLine),
            "focus_terminal" => Some(Self::FocusTerminal),
            "focus_editor" => Some(Self::FocusEditor),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::GotoLine => "goto_line",
            Self::OpenFileAtLine => "open_file_at_line",
            Self::FocusTerminal => "focus_terminal",
            Self::FocusEditor => "focus_editor",
        }
    }
}

pub(super) async fn execute_editor_control(host: &dyn Host, args: &Value) -> Result<ToolResult> {
    let Some(action) = first_string(args, &["action"]).and_then(EditorAction::parse) else {
        return Ok(ToolResult::failure(
            "Unsupported execute_editor_control action.",
        ));
    };

    match action {
        EditorAction::FocusTerminal | EditorAction::FocusEditor => {
            let target = if action == EditorAction::FocusTerminal {
                FocusTarget::Terminal
            } else {
                FocusTarget::Editor
            };
            host.focus(target).await?;
            Ok(ToolResult::handled(json!({ "action": action.as_str() })))
        }
        EditorAction::GotoLine => {
            let Some(editor) = host.active_editor().await else {
                return Ok(ToolResult::failure("No active editor."));
            };
            let line = args::line(args, &["line"], editor.document.line_count());
            let column = args::column(args, &["column", "col"]);
            host.set_cursor(Position::new(line, column)).await?;
            Ok(ToolResult::handled(json!({
                "action": action.as_str(),
                "line": line,
                "column": column,
            })))
        }
        EditorAction::OpenFileAtLine => {
            let file_path = required_string(args, "filePath", &["filePath", "path", "file"])?;
            let resolved = resolve_against_workspace(host.workspace_root().as_deref(), file_path);

            let editor = match host.open_document(&resolved).await {
                Ok(editor) => editor,
                Err(error) => {
                    tracing::debug!(path = %resolved.display(), %error, "open_file_at_line failed");
                    return Ok(ToolResult::failure(format!(
                        "File not found: {}. Call search_project_files with a partial path and retry with the matched file.",
                        resolved.display()
                    )));
                }
            };

            let line = args::line(args, &["line"], editor.document.line_count());
            let column = args::column(args, &["column", "col"]);
            host.set_cursor(Position::new(line, column)).await?;
            Ok(ToolResult::handled(json!({
                "action": action.as_str(),
                "filePath": resolved.display().to_string(),
                "line": line,
                "column": column,
            })))
        }
    }
}

fn resolve_against_workspace(root: Option<&Path>, file_path: &str) -> PathBuf {
    let path = Path::new(file_path);
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

/// Replaces a range in the active document and leaves the caret after the
/// inserted text.
pub(super) async fn apply_editor_edit(host: &dyn Host, args: &Value) -> Result<ToolResult> {
    let Some(editor) = host.active_editor().await else {
        return Ok(ToolResult::failure("No active editor."));
    };

    let line_count = editor.document.line_count();
    let start = Position::new(
        args::line(args, &["startLine"], line_count),
        args::column(args, &["startCol", "startCharacter", "startColumn"]),
    );
    let end = Position::new(
        args::line(args, &["endLine"], line_count),
        args::column(args, &["endCol", "endCharacter", "endColumn"]),
    );
    let new_text = first_string(args, &["newText", "text"]).unwrap_or("");

    if end < start {
        return Ok(ToolResult::failure("Invalid range: end before start."));
    }

    if !host.apply_edit(Range::new(start, end), new_text).await? {
        return Ok(ToolResult::failure("Failed to apply editor edit."));
    }

    let cursor = position_after_insert(editor.document.clamp(start), new_text);
    host.set_cursor(cursor).await?;

    Ok(ToolResult::handled(json!({
        "applied": true,
        "cursor": cursor,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_against_workspace_root() {
        let root = Path::new("/work/project");
        assert_eq!(
            resolve_against_workspace(Some(root), "src/main.rs"),
            PathBuf::from("/work/project/src/main.rs")
        );
        assert_eq!(
            resolve_against_workspace(Some(root), "/etc/hosts"),
            PathBuf::from("/etc/hosts")
        );
        assert_eq!(
            resolve_against_workspace(None, "src/main.rs"),
            PathBuf::from("src/main.rs")
        );
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in [
            EditorAction::GotoLine,
            EditorAction::OpenFileAtLine,
            EditorAction::FocusTerminal,
            EditorAction::FocusEditor,
        ] {
            assert_eq!(EditorAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(EditorAction::parse("scroll_up"), None);
    }
}
