use futures::{Stream, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lines kept per session; older lines are evicted first.
pub const BUFFER_CAPACITY: usize = 800;

/// Opaque identity of one open terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The terminal the host currently considers active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalInfo {
    pub session: SessionId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    Stream,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalView {
    pub name: String,
    pub line_count: usize,
    pub lines: Vec<String>,
    pub source: CaptureSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalSnapshot {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub view: Option<TerminalView>,
}

impl TerminalSnapshot {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
            view: None,
        }
    }
}

#[derive(Debug, Default)]
struct SessionBuffer {
    lines: VecDeque<String>,
    saw_output: bool,
}

impl SessionBuffer {
    fn push(&mut self, line: String) {
        if self.lines.len() == BUFFER_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

#[derive(Debug, Default)]
struct SessionEntry {
    buffer: Mutex<SessionBuffer>,
    closed: CancellationToken,
}

impl SessionEntry {
    fn buffer(&self) -> MutexGuard<'_, SessionBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append_output(&self, chunk: &str) {
        let lines = normalize_chunk(chunk);
        if lines.is_empty() {
            return;
        }
        let mut buffer = self.buffer();
        buffer.saw_output = true;
        for line in lines {
            buffer.push(line);
        }
    }
}

/// Rolling per-session transcript of terminal activity.
///
/// The session map lock is held only to find or insert a session entry; all
/// appends and snapshots then serialize on that session's own lock, so
/// unrelated terminals never wait on each other.
#[derive(Debug, Default)]
pub struct TerminalContextTracker {
    sessions: Mutex<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl TerminalContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<SessionEntry>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, session: &SessionId) -> Arc<SessionEntry> {
        self.sessions()
            .entry(session.clone())
            .or_default()
            .clone()
    }

    fn existing(&self, session: &SessionId) -> Option<Arc<SessionEntry>> {
        self.sessions().get(session).cloned()
    }

    pub fn record_command(&self, session: &SessionId, command: &str) {
        self.entry(session).buffer().push(format!("$ {command}"));
    }

    pub fn on_output_chunk(&self, session: &SessionId, chunk: &str) {
        self.entry(session).append_output(chunk);
    }

    /// Last `max_lines` lines of the active session, or the unavailable shape
    /// when there is no active terminal.
    pub fn snapshot(&self, active: Option<&TerminalInfo>, max_lines: usize) -> TerminalSnapshot {
        let Some(terminal) = active else {
            return TerminalSnapshot::unavailable("No active terminal.");
        };

        let (line_count, lines, saw_output) = match self.existing(&terminal.session) {
            Some(entry) => {
                let buffer = entry.buffer();
                let skip = buffer.lines.len().saturating_sub(max_lines);
                (
                    buffer.lines.len(),
                    buffer.lines.iter().skip(skip).cloned().collect(),
                    buffer.saw_output,
                )
            }
            None => (0, Vec::new(), false),
        };

        TerminalSnapshot {
            available: true,
            reason: None,
            view: Some(TerminalView {
                name: terminal.name.clone(),
                line_count,
                lines,
                source: if saw_output {
                    CaptureSource::Stream
                } else {
                    CaptureSource::None
                },
            }),
        }
    }

    /// Evicts the session buffer and stops every capture attached to it.
    pub fn on_session_closed(&self, session: &SessionId) {
        if let Some(entry) = self.sessions().remove(session) {
            entry.closed.cancel();
        }
    }

    pub fn has_session(&self, session: &SessionId) -> bool {
        self.sessions().contains_key(session)
    }

    /// A shell execution began in `session`: records its command line, then
    /// captures that execution's output.
    pub fn on_execution_started<S, E>(
        &self,
        session: &SessionId,
        command_line: &str,
        output: S,
    ) -> CaptureHandle
    where
        S: Stream<Item = Result<String, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let command_line = command_line.trim();
        if !command_line.is_empty() {
            self.record_command(session, command_line);
        }
        self.attach(session, output)
    }

    /// Spawns a capture task that feeds `output` into the session buffer
    /// until the stream ends, the handle is cancelled, or the session closes.
    /// Read errors end the capture quietly.
    pub fn attach<S, E>(&self, session: &SessionId, output: S) -> CaptureHandle
    where
        S: Stream<Item = Result<String, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let entry = self.entry(session);
        let cancel = entry.closed.child_token();
        let task_cancel = cancel.clone();
        let session = session.clone();

        let task = tokio::spawn(async move {
            let mut output = Box::pin(output);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        tracing::debug!(session = %session, "terminal capture cancelled");
                        break;
                    }
                    chunk = output.next() => match chunk {
                        Some(Ok(chunk)) => entry.append_output(&chunk),
                        Some(Err(error)) => {
                            tracing::debug!(session = %session, %error, "terminal capture read failed");
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        CaptureHandle { cancel, task }
    }
}

/// Owner handle for one capture task.
pub struct CaptureHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the capture task to stop.
    pub async fn join(self) {
        if let Err(error) = self.task.await {
            tracing::debug!(%error, "terminal capture task aborted");
        }
    }
}

/// Strips escape sequences, normalizes line endings and returns the
/// non-empty lines of one output chunk.
fn normalize_chunk(chunk: &str) -> Vec<String> {
    let stripped = strip_ansi(chunk).replace("\r\n", "\n").replace('\r', "\n");
    stripped
        .trim()
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Removes CSI and OSC sequences plus two-byte escapes. An escape cut off at
/// the end of the chunk is dropped along with whatever followed it.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\x1b' => match chars.next() {
                Some('[') => {
                    // parameters and intermediates, then one final byte
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' {
                            if chars.peek() == Some(&'\\') {
                                chars.next();
                            }
                            break;
                        }
                    }
                }
                Some(c) if ('\x20'..='\x2f').contains(&c) => {
                    chars.next();
                }
                Some(_) | None => {}
            },
            '\n' | '\r' | '\t' => out.push(ch),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;

    fn terminal(id: &str) -> TerminalInfo {
        TerminalInfo {
            session: SessionId::new(id),
            name: format!("{id} shell"),
        }
    }

    fn lines_of(tracker: &TerminalContextTracker, id: &str, max: usize) -> Vec<String> {
        tracker
            .snapshot(Some(&terminal(id)), max)
            .view
            .map(|view| view.lines)
            .unwrap_or_default()
    }

    #[test]
    fn test_strip_ansi_handles_csi_osc_and_truncation() {
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[0m done"), "ok done");
        assert_eq!(strip_ansi("\x1b]0;title\x07prompt$ "), "prompt$ ");
        assert_eq!(strip_ansi("\x1b]633;A\x1b\\ls"), "ls");
        assert_eq!(strip_ansi("\x1b(Bplain"), "plain");
        assert_eq!(strip_ansi("tail \x1b[38;5"), "tail ");
        assert_eq!(strip_ansi("bell\x07!"), "bell!");
    }

    #[test]
    fn test_output_chunk_is_split_into_non_empty_lines() {
        let tracker = TerminalContextTracker::new();
        let session = SessionId::new("t1");
        tracker.on_output_chunk(&session, "\x1b[31mfirst\r\n\r\nsecond\rthird\n");
        tracker.on_output_chunk(&session, "   \r\n");
        assert_eq!(lines_of(&tracker, "t1", 10), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_buffer_keeps_most_recent_lines_in_order() {
        let tracker = TerminalContextTracker::new();
        let session = SessionId::new("t1");
        for i in 0..(BUFFER_CAPACITY + 25) {
            tracker.on_output_chunk(&session, &format!("line {i}"));
        }
        let lines = lines_of(&tracker, "t1", usize::MAX);
        assert_eq!(lines.len(), BUFFER_CAPACITY);
        assert_eq!(lines.first().map(String::as_str), Some("line 25"));
        assert_eq!(
            lines.last().map(String::as_str),
            Some(format!("line {}", BUFFER_CAPACITY + 24).as_str())
        );
    }

    #[test]
    fn test_snapshot_source_and_unavailable_shape() {
        let tracker = TerminalContextTracker::new();
        assert_eq!(
            serde_json::to_value(tracker.snapshot(None, 80)).unwrap(),
            serde_json::json!({"available": false, "reason": "No active terminal."})
        );

        let session = SessionId::new("t1");
        tracker.record_command(&session, "git status");
        let snapshot = tracker.snapshot(Some(&terminal("t1")), 80);
        let view = snapshot.view.expect("view");
        assert_eq!(view.lines, vec!["$ git status"]);
        assert_eq!(view.source, CaptureSource::None);

        tracker.on_output_chunk(&session, "On branch main");
        let value = serde_json::to_value(tracker.snapshot(Some(&terminal("t1")), 1)).unwrap();
        assert_eq!(value["source"], "stream");
        assert_eq!(value["lineCount"], 2);
        assert_eq!(value["lines"], serde_json::json!(["On branch main"]));
    }

    #[test]
    fn test_session_close_evicts_buffer() {
        let tracker = TerminalContextTracker::new();
        let session = SessionId::new("t1");
        tracker.record_command(&session, "ls");
        tracker.on_session_closed(&session);
        assert!(!tracker.has_session(&session));
        assert!(lines_of(&tracker, "t1", 10).is_empty());
    }

    #[tokio::test]
    async fn test_attached_stream_is_captured_until_end() {
        let tracker = TerminalContextTracker::new();
        let session = SessionId::new("t1");
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>("compiling\n".to_string()),
            Ok("\x1b[32mfinished\x1b[0m\n".to_string()),
        ]);
        tracker.attach(&session, chunks).join().await;
        assert_eq!(lines_of(&tracker, "t1", 10), vec!["compiling", "finished"]);
    }

    #[tokio::test]
    async fn test_execution_start_records_command_before_its_output() {
        let tracker = TerminalContextTracker::new();
        let session = SessionId::new("t1");
        let chunks = stream::iter(vec![Ok::<_, std::io::Error>("test result: ok\n".to_string())]);
        tracker
            .on_execution_started(&session, " cargo test \n", chunks)
            .join()
            .await;
        assert_eq!(
            lines_of(&tracker, "t1", 10),
            vec!["$ cargo test", "test result: ok"]
        );
    }

    #[tokio::test]
    async fn test_capture_stops_when_session_closes() {
        let tracker = TerminalContextTracker::new();
        let session = SessionId::new("t1");
        let handle = tracker.attach(&session, stream::pending::<Result<String, std::io::Error>>());
        tracker.on_session_closed(&session);
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("capture should stop after close");
    }

    #[tokio::test]
    async fn test_sessions_capture_concurrently_without_interference() {
        let tracker = Arc::new(TerminalContextTracker::new());
        let mut handles = Vec::new();
        for id in ["a", "b", "c"] {
            let session = SessionId::new(id);
            let chunks: Vec<Result<String, std::io::Error>> =
                (0..200).map(|i| Ok(format!("{id}-{i}\n"))).collect();
            handles.push(tracker.attach(&session, stream::iter(chunks)));
        }

        let writer = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                for i in 0..50 {
                    tracker.record_command(&SessionId::new("a"), &format!("cmd {i}"));
                    tokio::task::yield_now().await;
                }
            })
        };

        for handle in handles {
            handle.join().await;
        }
        writer.await.expect("writer task");

        assert_eq!(lines_of(&tracker, "a", usize::MAX).len(), 250);
        for id in ["b", "c"] {
            let lines = lines_of(&tracker, id, usize::MAX);
            let expected: Vec<String> = (0..200).map(|i| format!("{id}-{i}")).collect();
            assert_eq!(lines, expected);
        }
    }
}
