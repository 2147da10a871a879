use super::{
    language_id_for_path, ActiveEditor, CatalogEntry, FocusTarget, Host, Position, Range,
    TextDocument,
};
use crate::config::HandoffCommands;
use crate::context::terminal::{CaptureHandle, SessionId, TerminalContextTracker, TerminalInfo};
use crate::tools::keypress::KeyAction;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

const SAVE_COMMAND: &str = "workspace.save";
const REVERT_COMMAND: &str = "workspace.revert";
const CLOSE_EDITOR_COMMAND: &str = "workspace.closeEditor";
const STDOUT_SESSION: &str = "stdout";

#[derive(Debug)]
struct OpenEditor {
    path: PathBuf,
    document: TextDocument,
    cursor: Position,
}

#[derive(Debug, Default)]
struct WorkspaceState {
    editor: Option<OpenEditor>,
    terminal_open: bool,
}

/// Headless host over a directory on disk. Edits are written through to the
/// file; terminal input is echoed to stdout.
pub struct WorkspaceHost {
    root: PathBuf,
    handoff: HandoffCommands,
    state: Mutex<WorkspaceState>,
}

impl WorkspaceHost {
    pub fn new(root: impl Into<PathBuf>, handoff: HandoffCommands) -> Self {
        Self {
            root: root.into(),
            handoff,
            state: Mutex::new(WorkspaceState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, WorkspaceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stdout_terminal() -> TerminalInfo {
        TerminalInfo {
            session: SessionId::new(STDOUT_SESSION),
            name: "stdout".to_string(),
        }
    }

    /// Runs `command_line` through `sh -c` in the stdout terminal. The
    /// command and its combined output are fed to `tracker`; output lines are
    /// echoed as they arrive.
    pub fn run_in_terminal(
        &self,
        tracker: &TerminalContextTracker,
        command_line: &str,
    ) -> Result<CaptureHandle> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(format!("{command_line} 2>&1"))
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run '{command_line}'"))?;
        let stdout = child.stdout.take().context("Shell output was not captured")?;
        self.state().terminal_open = true;

        tokio::spawn(async move {
            if let Err(error) = child.wait().await {
                tracing::debug!(%error, "terminal command wait failed");
            }
        });

        let output = futures::stream::unfold(
            BufReader::new(stdout).lines(),
            |mut lines| async move {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        println!("[terminal] {line}");
                        Some((Ok(format!("{line}\n")), lines))
                    }
                    Ok(None) => None,
                    Err(error) => Some((Err(error), lines)),
                }
            },
        );

        Ok(tracker.on_execution_started(&Self::stdout_terminal().session, command_line, output))
    }

    fn editor_path(&self) -> Option<PathBuf> {
        self.state().editor.as_ref().map(|editor| editor.path.clone())
    }

    async fn save_active(&self) -> Result<Value> {
        let active = {
            let state = self.state();
            state
                .editor
                .as_ref()
                .map(|editor| (editor.path.clone(), editor.document.text()))
        };
        let Some((path, text)) = active else {
            bail!("No active editor.");
        };
        tokio::fs::write(&path, text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(Value::String(path.display().to_string()))
    }

    async fn revert_active(&self) -> Result<Value> {
        let Some(path) = self.editor_path() else {
            bail!("No active editor.");
        };
        let text = read_document(&path).await?;
        if let Some(editor) = self.state().editor.as_mut() {
            editor.document = TextDocument::new(&text);
            editor.cursor = editor.document.clamp(editor.cursor);
        }
        Ok(Value::Null)
    }

    async fn add_prompt_file(&self, args: &[Value]) -> Result<Value> {
        let path = match args.first() {
            Some(payload) => payload_path(payload)
                .map(PathBuf::from)
                .with_context(|| format!("Unsupported payload for {}", self.handoff.add_file))?,
            None => self.editor_path().context("No active editor.")?,
        };
        let prompt = read_document(&path).await?;
        println!("[handoff] {}", prompt.trim());
        tracing::info!(path = %path.display(), "prompt handed off");
        Ok(Value::String(path.display().to_string()))
    }
}

/// Accepts a bare path or any of the `uri`/`resource`/`fileUri`/`path`
/// object shapes.
fn payload_path(payload: &Value) -> Option<&str> {
    let raw = match payload {
        Value::String(path) => Some(path.as_str()),
        Value::Object(map) => ["uri", "resource", "fileUri", "path"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    }?;
    Some(raw.strip_prefix("file://").unwrap_or(raw))
}

async fn read_document(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn should_skip_workspace_entry(root: &Path, dir: &Path, name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }

    if dir != root {
        return false;
    }

    matches!(
        name,
        "target" | "node_modules" | "__pycache__" | "venv" | "build" | "dist" | "out"
    )
}

/// Directory walk used when `rg` is unavailable.
fn walk_workspace_files(root: &Path, limit: usize) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut children: Vec<_> = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .collect();
        children.sort_by_key(|entry| std::cmp::Reverse(entry.path()));

        for child in children {
            let name = child.file_name().to_string_lossy().to_string();
            if should_skip_workspace_entry(root, &dir, &name) {
                continue;
            }
            let path = child.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_string_lossy().to_string());
                if files.len() >= limit {
                    return Ok(files);
                }
            }
        }
    }

    Ok(files)
}

async fn list_with_rg(root: &Path, limit: usize) -> Result<Vec<String>> {
    let output = Command::new("rg")
        .current_dir(root)
        .arg("--files")
        .arg("--color")
        .arg("never")
        .output()
        .await
        .context("Failed to execute rg command")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        bail!("rg --files failed: {stderr}");
    }
    let mut files: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    files.sort();
    files.truncate(limit);
    Ok(files)
}

#[cfg(target_os = "linux")]
async fn send_keys(action: &KeyAction) -> Result<()> {
    let mut command = Command::new("ydotool");
    match action {
        KeyAction::Press(strokes) => {
            command.arg("key");
            command.args(strokes.iter().map(|stroke| stroke.to_ydotool_arg()));
        }
        KeyAction::Type(text) => {
            command.arg("type").arg("--").arg(text);
        }
    }
    let details = match command.output().await {
        Ok(output) if output.status.success() => return Ok(()),
        Ok(output) => String::from_utf8_lossy(&output.stderr).trim().to_string(),
        Err(error) => error.to_string(),
    };
    bail!(
        "Failed to send keypress via ydotool. Ensure ydotoold is running and YDOTOOL_SOCKET is set correctly. Details: {details}"
    )
}

#[cfg(not(target_os = "linux"))]
async fn send_keys(_action: &KeyAction) -> Result<()> {
    bail!("execute_keypress is Linux-only in this build.")
}

async fn run_with_stdin(program: &str, args: &[&str], input: &str) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute {program}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).await?;
    }
    let output = child.wait_with_output().await?;
    if !output.status.success() {
        bail!(
            "{program} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

async fn run_for_stdout(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to execute {program}"))?;
    if !output.status.success() {
        bail!(
            "{program} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[async_trait]
impl Host for WorkspaceHost {
    async fn active_editor(&self) -> Option<ActiveEditor> {
        let state = self.state();
        let editor = state.editor.as_ref()?;
        let cursor = editor.document.clamp(editor.cursor);
        Some(ActiveEditor {
            file_path: editor.path.display().to_string(),
            language_id: language_id_for_path(&editor.path).to_string(),
            document: editor.document.clone(),
            cursor,
            selection: Range::caret(cursor),
        })
    }

    async fn set_cursor(&self, position: Position) -> Result<()> {
        let mut state = self.state();
        let Some(editor) = state.editor.as_mut() else {
            bail!("No active editor.");
        };
        editor.cursor = editor.document.clamp(position);
        Ok(())
    }

    async fn open_document(&self, path: &Path) -> Result<ActiveEditor> {
        let text = read_document(path).await?;
        {
            let mut state = self.state();
            state.editor = Some(OpenEditor {
                path: path.to_path_buf(),
                document: TextDocument::new(&text),
                cursor: Position::default(),
            });
        }
        self.active_editor()
            .await
            .context("No active editor.")
    }

    async fn apply_edit(&self, range: Range, new_text: &str) -> Result<bool> {
        {
            let mut state = self.state();
            let Some(editor) = state.editor.as_mut() else {
                return Ok(false);
            };
            editor.document.replace_range(range, new_text)?;
        }
        self.save_active().await?;
        Ok(true)
    }

    async fn focus(&self, target: FocusTarget) -> Result<()> {
        // Focus only matters for the terminal, which exists once shown.
        if target == FocusTarget::Terminal {
            self.state().terminal_open = true;
        }
        Ok(())
    }

    async fn active_terminal(&self) -> Option<TerminalInfo> {
        self.state()
            .terminal_open
            .then(Self::stdout_terminal)
    }

    async fn create_terminal(&self) -> Result<TerminalInfo> {
        self.state().terminal_open = true;
        Ok(Self::stdout_terminal())
    }

    async fn send_terminal_text(&self, session: &SessionId, text: &str) -> Result<()> {
        if session.as_str() != STDOUT_SESSION {
            bail!("Unknown terminal session: {session}");
        }
        println!("[terminal] {text}");
        self.state().terminal_open = true;
        Ok(())
    }

    async fn read_clipboard(&self) -> Result<String> {
        if cfg!(target_os = "macos") {
            run_for_stdout("pbpaste", &[]).await
        } else {
            run_for_stdout("wl-paste", &["--no-newline"]).await
        }
    }

    async fn write_clipboard(&self, text: &str) -> Result<()> {
        if cfg!(target_os = "macos") {
            run_with_stdin("pbcopy", &[], text).await
        } else {
            run_with_stdin("wl-copy", &[], text).await
        }
    }

    async fn command_catalog(&self) -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::command(SAVE_COMMAND)
                .with_title("Save")
                .with_category("File"),
            CatalogEntry::shortcut(SAVE_COMMAND, "ctrl+s").with_title("Save"),
            CatalogEntry::command(REVERT_COMMAND)
                .with_title("Revert File")
                .with_category("File"),
            CatalogEntry::command(CLOSE_EDITOR_COMMAND)
                .with_title("Close Editor")
                .with_category("View"),
            CatalogEntry::command(self.handoff.focus.clone())
                .with_title("Focus Assistant")
                .with_source("handoff"),
            CatalogEntry::command(self.handoff.add_file.clone())
                .with_title("Add File to Assistant Thread")
                .with_source("handoff"),
        ]
    }

    async fn execute_command(&self, command_id: &str, args: &[Value]) -> Result<Value> {
        match command_id {
            SAVE_COMMAND => self.save_active().await,
            REVERT_COMMAND => self.revert_active().await,
            CLOSE_EDITOR_COMMAND => {
                self.state().editor = None;
                Ok(Value::Null)
            }
            id if id == self.handoff.focus => {
                tracing::info!(command = id, "assistant surface focused");
                Ok(Value::Null)
            }
            id if id == self.handoff.add_file => self.add_prompt_file(args).await,
            other => bail!("Unknown command: {other}"),
        }
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        Some(self.root.clone())
    }

    async fn list_workspace_files(&self, limit: usize) -> Result<Vec<String>> {
        match list_with_rg(&self.root, limit).await {
            Ok(files) => Ok(files),
            Err(error) => {
                tracing::debug!(%error, "rg unavailable, walking workspace");
                let root = self.root.clone();
                tokio::task::spawn_blocking(move || walk_workspace_files(&root, limit))
                    .await
                    .context("Workspace walk task failed")?
            }
        }
    }

    async fn inject_keys(&self, action: &KeyAction) -> Result<()> {
        send_keys(action).await
    }

    async fn write_temp_file(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = std::env::temp_dir().join(file_name);
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    async fn show_message(&self, message: &str) -> Result<()> {
        println!("{message}");
        Ok(())
    }
}
