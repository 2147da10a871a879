//! What the model sees about the user's surroundings: the active editor and
//! the active terminal's recent transcript.

pub mod ambient;
pub mod terminal;

pub use ambient::{
    build_ambient_context, capture_ambient_context, AmbientContext, EditorSnapshot, EditorView,
    EDITOR_LINES_AFTER, EDITOR_LINES_BEFORE, TERMINAL_MAX_LINES,
};
pub use terminal::{
    strip_ansi, CaptureHandle, CaptureSource, SessionId, TerminalContextTracker, TerminalInfo,
    TerminalSnapshot, TerminalView, BUFFER_CAPACITY,
};
