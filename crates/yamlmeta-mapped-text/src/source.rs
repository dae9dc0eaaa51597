//! Root source texts and line/column lookups

use serde::{Deserialize, Serialize};

/// A 0-indexed line/column position.
///
/// Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
}

impl LineCol {
    pub fn new(line: usize, column: usize) -> Self {
        LineCol { line, column }
    }
}

/// The original, untransformed text that every [`crate::MappedText`] chain
/// eventually points back to.
///
/// Stores the byte offsets of every line break so that offset to line/column
/// conversion is a binary search instead of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    value: String,
    file_name: Option<String>,
    line_breaks: Vec<usize>,
}

impl SourceText {
    pub fn new(value: impl Into<String>, file_name: Option<String>) -> Self {
        let value = value.into();
        let line_breaks = value
            .char_indices()
            .filter_map(|(idx, ch)| if ch == '\n' { Some(idx) } else { None })
            .collect();
        SourceText {
            value,
            file_name,
            line_breaks,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Number of lines; a text without newlines has one line.
    pub fn line_count(&self) -> usize {
        self.line_breaks.len() + 1
    }

    /// Byte offset at which `line` starts, if the line exists.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        match line {
            0 => Some(0),
            n => self.line_breaks.get(n - 1).map(|b| b + 1),
        }
    }

    /// Text of `line` without its terminating newline (or `\r\n`).
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = self.line_start(line)?;
        let end = self
            .line_breaks
            .get(line)
            .copied()
            .unwrap_or(self.value.len());
        let text = &self.value[start..end];
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Convert a byte offset into a line/column pair.
    ///
    /// Returns None if the offset is past the end of the text. An offset that
    /// sits on a newline belongs to the line the newline terminates.
    pub fn line_col(&self, offset: usize) -> Option<LineCol> {
        if offset > self.value.len() {
            return None;
        }
        let line = match self.line_breaks.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx,
        };
        let line_start = if line == 0 {
            0
        } else {
            self.line_breaks[line - 1] + 1
        };
        let column = self
            .value
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - line_start);
        Some(LineCol { line, column })
    }

    /// Convert a line/column pair back into a byte offset.
    pub fn offset_of(&self, position: LineCol) -> Option<usize> {
        let start = self.line_start(position.line)?;
        let line = self.line_text(position.line)?;
        if position.column == line.chars().count() {
            return Some(start + line.len());
        }
        line.char_indices()
            .nth(position.column)
            .map(|(idx, _)| start + idx)
    }
}

/// Render lines `first..=last` of `text` with right-aligned 1-based line
/// numbers, the way editors show a snippet of a file.
pub fn format_line_range(text: &str, first: usize, last: usize) -> Vec<FormattedLine> {
    let lines: Vec<&str> = text.split('\n').collect();
    let last = last.min(lines.len().saturating_sub(1));
    if first > last {
        return Vec::new();
    }
    let width = (last + 1).to_string().len();
    (first..=last)
        .map(|line| {
            let content = lines[line].strip_suffix('\r').unwrap_or(lines[line]);
            FormattedLine {
                line,
                gutter: format!("{:>width$}: ", line + 1, width = width),
                content: content.to_string(),
            }
        })
        .collect()
}

/// One line produced by [`format_line_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLine {
    pub line: usize,
    pub gutter: String,
    pub content: String,
}
