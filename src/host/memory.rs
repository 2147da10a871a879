use super::{
    language_id_for_path, ActiveEditor, CatalogEntry, FocusTarget, Host, Position, Range,
    TextDocument,
};
use crate::context::terminal::{SessionId, TerminalInfo};
use crate::tools::keypress::KeyAction;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct EditorState {
    path: PathBuf,
    cursor: Position,
}

#[derive(Debug)]
struct MemoryTerminal {
    info: TerminalInfo,
    input: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<PathBuf, TextDocument>,
    editor: Option<EditorState>,
    focus: Option<FocusTarget>,
    terminals: Vec<MemoryTerminal>,
    active_terminal: Option<usize>,
    clipboard: String,
    catalog: Vec<CatalogEntry>,
    failing_commands: HashMap<String, String>,
    args_rejecting_commands: HashSet<String>,
    executed: Vec<(String, Vec<Value>)>,
    workspace_root: Option<PathBuf>,
    workspace_files: Vec<String>,
    keys: Vec<KeyAction>,
    messages: Vec<String>,
    temp_files: Vec<(PathBuf, String)>,
    reject_edits: bool,
}

/// A host that keeps everything in memory and records every side effect.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<MemoryState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn configure(self, apply: impl FnOnce(&mut MemoryState)) -> Self {
        apply(&mut self.state());
        self
    }

    pub fn with_workspace(self, root: impl Into<PathBuf>, files: &[&str]) -> Self {
        let root = root.into();
        let files = files.iter().map(|file| file.to_string()).collect();
        self.configure(|state| {
            state.workspace_root = Some(root);
            state.workspace_files = files;
        })
    }

    pub fn with_document(self, path: impl Into<PathBuf>, text: &str) -> Self {
        let path = path.into();
        let document = TextDocument::new(text);
        self.configure(|state| {
            state.documents.insert(path, document);
        })
    }

    /// Adds the document and makes it the active editor, caret at 0:0.
    pub fn with_active_document(self, path: impl Into<PathBuf>, text: &str) -> Self {
        let path = path.into();
        self.with_document(path.clone(), text).configure(|state| {
            state.editor = Some(EditorState {
                path,
                cursor: Position::default(),
            });
        })
    }

    pub fn with_terminal(self, name: &str) -> Self {
        self.configure(|state| {
            let index = push_terminal(state, name);
            state.active_terminal = Some(index);
        })
    }

    pub fn with_clipboard(self, text: &str) -> Self {
        let text = text.to_string();
        self.configure(|state| state.clipboard = text)
    }

    pub fn with_catalog_entry(self, entry: CatalogEntry) -> Self {
        self.configure(|state| state.catalog.push(entry))
    }

    pub fn with_command(self, command_id: impl Into<String>) -> Self {
        self.with_catalog_entry(CatalogEntry::command(command_id))
    }

    /// Registers a command that always fails with `message`.
    pub fn failing_command(self, command_id: impl Into<String>, message: &str) -> Self {
        let command_id = command_id.into();
        let message = message.to_string();
        self.with_command(command_id.clone()).configure(|state| {
            state.failing_commands.insert(command_id, message);
        })
    }

    /// Makes an existing command fail whenever it receives arguments.
    pub fn rejecting_args(self, command_id: impl Into<String>) -> Self {
        let command_id = command_id.into();
        self.configure(|state| {
            state.args_rejecting_commands.insert(command_id);
        })
    }

    pub fn rejecting_edits(self) -> Self {
        self.configure(|state| state.reject_edits = true)
    }

    pub fn active_text(&self) -> Option<String> {
        let state = self.state();
        let editor = state.editor.as_ref()?;
        state.documents.get(&editor.path).map(TextDocument::text)
    }

    pub fn document_text(&self, path: &Path) -> Option<String> {
        self.state().documents.get(path).map(TextDocument::text)
    }

    pub fn cursor(&self) -> Option<Position> {
        self.state().editor.as_ref().map(|editor| editor.cursor)
    }

    pub fn focused(&self) -> Option<FocusTarget> {
        self.state().focus
    }

    pub fn terminals(&self) -> Vec<TerminalInfo> {
        self.state()
            .terminals
            .iter()
            .map(|terminal| terminal.info.clone())
            .collect()
    }

    /// Text typed into `session`, one entry per send.
    pub fn terminal_input(&self, session: &SessionId) -> Vec<String> {
        self.state()
            .terminals
            .iter()
            .find(|terminal| &terminal.info.session == session)
            .map(|terminal| terminal.input.clone())
            .unwrap_or_default()
    }

    pub fn clipboard(&self) -> String {
        self.state().clipboard.clone()
    }

    /// Successful command executions in order.
    pub fn executed_commands(&self) -> Vec<(String, Vec<Value>)> {
        self.state().executed.clone()
    }

    pub fn key_actions(&self) -> Vec<KeyAction> {
        self.state().keys.clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.state().messages.clone()
    }

    pub fn temp_files(&self) -> Vec<(PathBuf, String)> {
        self.state().temp_files.clone()
    }

    fn editor_snapshot(state: &MemoryState) -> Option<ActiveEditor> {
        let editor = state.editor.as_ref()?;
        let document = state.documents.get(&editor.path)?.clone();
        Some(ActiveEditor {
            file_path: editor.path.display().to_string(),
            language_id: language_id_for_path(&editor.path).to_string(),
            cursor: document.clamp(editor.cursor),
            selection: Range::caret(document.clamp(editor.cursor)),
            document,
        })
    }
}

fn push_terminal(state: &mut MemoryState, name: &str) -> usize {
    let index = state.terminals.len();
    state.terminals.push(MemoryTerminal {
        info: TerminalInfo {
            session: SessionId::new(format!("memory-{}", index + 1)),
            name: name.to_string(),
        },
        input: Vec::new(),
    });
    index
}

#[async_trait]
impl Host for MemoryHost {
    async fn active_editor(&self) -> Option<ActiveEditor> {
        Self::editor_snapshot(&self.state())
    }

    async fn set_cursor(&self, position: Position) -> Result<()> {
        let mut state = self.state();
        let Some(editor) = state.editor.as_mut() else {
            bail!("No active editor.");
        };
        editor.cursor = position;
        Ok(())
    }

    async fn open_document(&self, path: &Path) -> Result<ActiveEditor> {
        let mut state = self.state();
        if !state.documents.contains_key(path) {
            bail!("No such document: {}", path.display());
        }
        state.editor = Some(EditorState {
            path: path.to_path_buf(),
            cursor: Position::default(),
        });
        state.focus = Some(FocusTarget::Editor);
        Self::editor_snapshot(&state).ok_or_else(|| anyhow!("No active editor."))
    }

    async fn apply_edit(&self, range: Range, new_text: &str) -> Result<bool> {
        let mut state = self.state();
        if state.reject_edits {
            return Ok(false);
        }
        let Some(path) = state.editor.as_ref().map(|editor| editor.path.clone()) else {
            return Ok(false);
        };
        let Some(document) = state.documents.get_mut(&path) else {
            return Ok(false);
        };
        document.replace_range(range, new_text)?;
        Ok(true)
    }

    async fn focus(&self, target: FocusTarget) -> Result<()> {
        self.state().focus = Some(target);
        Ok(())
    }

    async fn active_terminal(&self) -> Option<TerminalInfo> {
        let state = self.state();
        let index = state.active_terminal?;
        state.terminals.get(index).map(|terminal| terminal.info.clone())
    }

    async fn create_terminal(&self) -> Result<TerminalInfo> {
        let mut state = self.state();
        let index = push_terminal(&mut state, "voice");
        state.active_terminal = Some(index);
        Ok(state.terminals[index].info.clone())
    }

    async fn send_terminal_text(&self, session: &SessionId, text: &str) -> Result<()> {
        let mut state = self.state();
        let Some(index) = state
            .terminals
            .iter()
            .position(|terminal| &terminal.info.session == session)
        else {
            bail!("Unknown terminal session: {session}");
        };
        state.terminals[index].input.push(text.to_string());
        state.active_terminal = Some(index);
        state.focus = Some(FocusTarget::Terminal);
        Ok(())
    }

    async fn read_clipboard(&self) -> Result<String> {
        Ok(self.state().clipboard.clone())
    }

    async fn write_clipboard(&self, text: &str) -> Result<()> {
        self.state().clipboard = text.to_string();
        Ok(())
    }

    async fn command_catalog(&self) -> Vec<CatalogEntry> {
        self.state().catalog.clone()
    }

    async fn execute_command(&self, command_id: &str, args: &[Value]) -> Result<Value> {
        let mut state = self.state();
        if let Some(message) = state.failing_commands.get(command_id) {
            bail!("{message}");
        }
        if !args.is_empty() && state.args_rejecting_commands.contains(command_id) {
            bail!("{command_id} does not accept arguments");
        }
        state.executed.push((command_id.to_string(), args.to_vec()));
        Ok(Value::Null)
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        self.state().workspace_root.clone()
    }

    async fn list_workspace_files(&self, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .state()
            .workspace_files
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn inject_keys(&self, action: &KeyAction) -> Result<()> {
        self.state().keys.push(action.clone());
        Ok(())
    }

    async fn write_temp_file(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = std::env::temp_dir().join(file_name);
        let mut state = self.state();
        state
            .documents
            .insert(path.clone(), TextDocument::new(contents));
        state.temp_files.push((path.clone(), contents.to_string()));
        Ok(path)
    }

    async fn show_message(&self, message: &str) -> Result<()> {
        self.state().messages.push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_edits_apply_to_active_document() {
        let host = MemoryHost::new().with_active_document("/w/a.txt", "hello world");
        let applied = host
            .apply_edit(
                Range::new(Position::new(0, 6), Position::new(0, 11)),
                "there",
            )
            .await
            .unwrap();
        assert!(applied);
        assert_eq!(host.active_text().unwrap(), "hello there");
        assert_eq!(
            host.document_text(Path::new("/w/a.txt")).unwrap(),
            "hello there"
        );
    }

    #[tokio::test]
    async fn test_terminals_are_created_on_demand() {
        let host = MemoryHost::new();
        assert!(host.active_terminal().await.is_none());
        let created = host.create_terminal().await.unwrap();
        assert_eq!(host.active_terminal().await, Some(created.clone()));
        host.send_terminal_text(&created.session, "pwd").await.unwrap();
        assert_eq!(host.terminal_input(&created.session), vec!["pwd"]);
        assert!(host
            .send_terminal_text(&SessionId::new("ghost"), "x")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_has_command_only_matches_commands() {
        let host = MemoryHost::new()
            .with_command("workspace.save")
            .with_catalog_entry(CatalogEntry::shortcut("workspace.format", "ctrl+shift+i"));
        assert!(host.has_command("workspace.save").await);
        assert!(!host.has_command("workspace.format").await);
    }

    #[tokio::test]
    async fn test_cursor_is_clamped_in_snapshot() {
        let host = MemoryHost::new().with_active_document("/w/a.rs", "ab");
        host.set_cursor(Position::new(4, 9)).await.unwrap();
        let editor = host.active_editor().await.unwrap();
        assert_eq!(editor.cursor, Position::new(0, 2));
        assert_eq!(editor.language_id, "rust");
    }
}
