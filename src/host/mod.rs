//! Capabilities the tools act through. The host owns all editor, terminal,
//! clipboard and command state; the routing engine only asks and mutates.

mod document;
mod memory;
mod workspace;

pub use document::{position_after_insert, Position, Range, TextDocument};
pub use memory::MemoryHost;
pub use workspace::WorkspaceHost;

use crate::context::terminal::{SessionId, TerminalInfo};
use crate::tools::keypress::KeyAction;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// The editor that currently has focus, as a value copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEditor {
    pub file_path: String,
    pub language_id: String,
    pub document: TextDocument,
    pub cursor: Position,
    pub selection: Range,
}

/// Editor language id guessed from the file extension.
pub fn language_id_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "jsx" => "javascriptreact",
        "go" => "go",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "java" => "java",
        "sh" | "bash" | "zsh" => "shellscript",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "html" => "html",
        "css" => "css",
        _ => "plaintext",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Editor,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Command,
    Shortcut,
}

/// One searchable entry: a command, or a keyboard shortcut bound to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub kind: CatalogKind,
    pub command_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CatalogEntry {
    pub fn command(command_id: impl Into<String>) -> Self {
        Self {
            kind: CatalogKind::Command,
            command_id: command_id.into(),
            title: None,
            category: None,
            keys: None,
            when: None,
            source: None,
        }
    }

    pub fn shortcut(command_id: impl Into<String>, keys: impl Into<String>) -> Self {
        Self {
            kind: CatalogKind::Shortcut,
            keys: Some(keys.into()),
            ..Self::command(command_id)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[async_trait]
pub trait Host: Send + Sync {
    async fn active_editor(&self) -> Option<ActiveEditor>;

    /// Moves the caret of the active editor and reveals it.
    async fn set_cursor(&self, position: Position) -> Result<()>;

    /// Opens `path` and makes it the active editor.
    async fn open_document(&self, path: &Path) -> Result<ActiveEditor>;

    /// Replaces `range` in the active document. `Ok(false)` means the host
    /// declined the edit.
    async fn apply_edit(&self, range: Range, new_text: &str) -> Result<bool>;

    async fn focus(&self, target: FocusTarget) -> Result<()>;

    async fn active_terminal(&self) -> Option<TerminalInfo>;

    async fn create_terminal(&self) -> Result<TerminalInfo>;

    /// Shows the terminal and types `text` into it without executing it.
    async fn send_terminal_text(&self, session: &SessionId, text: &str) -> Result<()>;

    async fn read_clipboard(&self) -> Result<String>;

    async fn write_clipboard(&self, text: &str) -> Result<()>;

    async fn command_catalog(&self) -> Vec<CatalogEntry>;

    async fn has_command(&self, command_id: &str) -> bool {
        self.command_catalog().await.iter().any(|entry| {
            entry.kind == CatalogKind::Command && entry.command_id == command_id
        })
    }

    async fn execute_command(&self, command_id: &str, args: &[Value]) -> Result<Value>;

    fn workspace_root(&self) -> Option<PathBuf>;

    /// Workspace-relative file paths, at most `limit` of them.
    async fn list_workspace_files(&self, limit: usize) -> Result<Vec<String>>;

    async fn inject_keys(&self, action: &KeyAction) -> Result<()>;

    async fn write_temp_file(&self, file_name: &str, contents: &str) -> Result<PathBuf>;

    async fn show_message(&self, message: &str) -> Result<()>;
}
