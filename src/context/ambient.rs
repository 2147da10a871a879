use serde::Serialize;
use serde_json::json;

use super::terminal::{TerminalContextTracker, TerminalSnapshot};
use crate::host::{ActiveEditor, Host, Position};

pub const EDITOR_LINES_BEFORE: usize = 60;
pub const EDITOR_LINES_AFTER: usize = 60;
pub const TERMINAL_MAX_LINES: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub file_path: String,
    pub language_id: String,
    pub cursor_line: usize,
    pub cursor_col: usize,
    pub selection_start: Position,
    pub selection_end: Position,
    pub window_start_line: usize,
    pub window_end_line: usize,
    pub window_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorSnapshot {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub view: Option<EditorView>,
}

impl EditorSnapshot {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
            view: None,
        }
    }

    /// The editor with `before`/`after` lines of text around the cursor.
    pub fn capture(editor: Option<&ActiveEditor>, before: usize, after: usize) -> Self {
        let Some(editor) = editor else {
            return Self::unavailable("No active editor.");
        };
        let (window_start_line, window_end_line, window_text) =
            editor.document.window(editor.cursor.line, before, after);
        Self {
            available: true,
            reason: None,
            view: Some(EditorView {
                file_path: editor.file_path.clone(),
                language_id: editor.language_id.clone(),
                cursor_line: editor.cursor.line,
                cursor_col: editor.cursor.col,
                selection_start: editor.selection.start,
                selection_end: editor.selection.end,
                window_start_line,
                window_end_line,
                window_text,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbientContext {
    pub editor: EditorSnapshot,
    pub terminal: TerminalSnapshot,
}

impl AmbientContext {
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|error| {
            tracing::debug!(%error, "ambient context did not serialize");
            json!({ "editor": null, "terminal": null }).to_string()
        })
    }
}

/// Reads the editor once and the active terminal's transcript once.
pub async fn capture_ambient_context(
    host: &dyn Host,
    terminals: &TerminalContextTracker,
    lines_before: usize,
    lines_after: usize,
    terminal_max_lines: usize,
) -> AmbientContext {
    let editor = host.active_editor().await;
    let terminal = host.active_terminal().await;
    AmbientContext {
        editor: EditorSnapshot::capture(editor.as_ref(), lines_before, lines_after),
        terminal: terminals.snapshot(terminal.as_ref(), terminal_max_lines),
    }
}

pub async fn build_ambient_context(
    host: &dyn Host,
    terminals: &TerminalContextTracker,
    lines_before: usize,
    lines_after: usize,
    terminal_max_lines: usize,
) -> String {
    capture_ambient_context(host, terminals, lines_before, lines_after, terminal_max_lines)
        .await
        .to_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use serde_json::Value;

    #[tokio::test]
    async fn test_nothing_open_is_reported_unavailable() {
        let host = MemoryHost::new();
        let tracker = TerminalContextTracker::new();
        let text = build_ambient_context(&host, &tracker, 60, 60, 80).await;
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({
                "editor": { "available": false, "reason": "No active editor." },
                "terminal": { "available": false, "reason": "No active terminal." }
            })
        );
    }

    #[tokio::test]
    async fn test_editor_window_is_centered_on_cursor() {
        let text: String = (0..10).map(|i| format!("line {i}\n")).collect();
        let host = MemoryHost::new().with_active_document("/w/notes.txt", text.trim_end());
        host.set_cursor(Position::new(5, 3)).await.unwrap();
        let tracker = TerminalContextTracker::new();

        let context = capture_ambient_context(&host, &tracker, 2, 1, 80).await;
        let view = context.editor.view.unwrap();
        assert_eq!(view.cursor_line, 5);
        assert_eq!(view.cursor_col, 3);
        assert_eq!((view.window_start_line, view.window_end_line), (3, 6));
        assert_eq!(view.window_text, "line 3\nline 4\nline 5\nline 6");
        assert_eq!(view.language_id, "plaintext");
    }

    #[tokio::test]
    async fn test_terminal_transcript_is_included() {
        let host = MemoryHost::new().with_terminal("bash");
        let tracker = TerminalContextTracker::new();
        let terminal = host.active_terminal().await.unwrap();
        tracker.record_command(&terminal.session, "cargo test");
        tracker.on_output_chunk(&terminal.session, "\x1b[32mok\x1b[0m\r\n");

        let value: Value =
            serde_json::from_str(&build_ambient_context(&host, &tracker, 60, 60, 80).await)
                .unwrap();
        assert_eq!(value["terminal"]["available"], true);
        assert_eq!(value["terminal"]["lines"], json!(["$ cargo test", "ok"]));
        assert_eq!(value["terminal"]["source"], "stream");
        assert_eq!(value["editor"]["available"], false);
    }
}
