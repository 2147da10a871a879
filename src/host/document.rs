use anyhow::{bail, Result};
use serde::Serialize;

/// Zero-based line and character column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn caret(position: Position) -> Self {
        Self::new(position, position)
    }
}

/// Line-addressed text buffer. Always holds at least one (possibly empty)
/// line; columns count characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    lines: Vec<String>,
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::new("")
    }
}

impl TextDocument {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(ToOwned::to_owned).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn line_len(&self, index: usize) -> usize {
        self.line(index).map_or(0, |line| line.chars().count())
    }

    /// Pulls a position inside the document: the line into
    /// `[0, line_count - 1]`, the column onto the line.
    pub fn clamp(&self, position: Position) -> Position {
        let line = position.line.min(self.line_count().saturating_sub(1));
        Position::new(line, position.col.min(self.line_len(line)))
    }

    fn byte_offset(&self, position: Position) -> usize {
        let position = self.clamp(position);
        let before: usize = self.lines[..position.line]
            .iter()
            .map(|line| line.len() + 1)
            .sum();
        let line = &self.lines[position.line];
        let within = line
            .char_indices()
            .nth(position.col)
            .map_or(line.len(), |(index, _)| index);
        before + within
    }

    /// Replaces `range` with `new_text`. Positions are clamped into the
    /// document first; a range that ends before it starts is rejected.
    pub fn replace_range(&mut self, range: Range, new_text: &str) -> Result<()> {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end);
        if end < start {
            bail!("Invalid range: end before start.");
        }

        let mut text = self.text();
        let start_offset = self.byte_offset(start);
        let end_offset = self.byte_offset(end);
        text.replace_range(start_offset..end_offset, new_text);
        *self = Self::new(&text);
        Ok(())
    }

    /// `(start_line, end_line, text)` of the lines around `center`.
    pub fn window(&self, center: usize, before: usize, after: usize) -> (usize, usize, String) {
        let last = self.line_count().saturating_sub(1);
        let center = center.min(last);
        let start = center.saturating_sub(before);
        let end = center.saturating_add(after).min(last);
        (start, end, self.lines[start..=end].join("\n"))
    }
}

/// Where the caret lands after inserting `text` at `start`.
pub fn position_after_insert(start: Position, text: &str) -> Position {
    match text.rsplit_once('\n') {
        None => Position::new(start.line, start.col + text.chars().count()),
        Some((head, tail)) => Position::new(
            start.line + head.matches('\n').count() + 1,
            tail.chars().count(),
        ),
    }
}
