//! Spans over mapped and original text

use crate::source::{LineCol, SourceText};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;

/// A half-open byte range `[start, end)` in some text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Inclusive containment: a cursor at `end` is still inside the span.
    pub fn contains_inclusive(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }
}

/// A position in a root [`SourceText`].
#[derive(Debug, Clone)]
pub struct OriginalOffset {
    pub source: Arc<SourceText>,
    pub offset: usize,
}

impl OriginalOffset {
    pub fn line_col(&self) -> Option<LineCol> {
        self.source.line_col(self.offset)
    }
}

impl PartialEq for OriginalOffset {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source) && self.offset == other.offset
    }
}

/// A span resolved all the way back to a root source text.
#[derive(Debug, Clone)]
pub struct SourceSpan {
    pub source: Arc<SourceText>,
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn file_name(&self) -> Option<&str> {
        self.source.file_name()
    }

    pub fn start_line_col(&self) -> LineCol {
        self.source.line_col(self.start).unwrap_or_default()
    }

    pub fn end_line_col(&self) -> LineCol {
        self.source.line_col(self.end).unwrap_or_default()
    }

    /// The slice of the root text this span covers.
    pub fn text(&self) -> &str {
        self.source.value().get(self.start..self.end).unwrap_or("")
    }
}

impl PartialEq for SourceSpan {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
            && self.start == other.start
            && self.end == other.end
    }
}

impl Serialize for SourceSpan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let start = self.start_line_col();
        let end = self.end_line_col();
        let mut state = serializer.serialize_struct("SourceSpan", 4)?;
        state.serialize_field("file", &self.file_name())?;
        state.serialize_field("range", &Span::new(self.start, self.end))?;
        state.serialize_field("start", &start)?;
        state.serialize_field("end", &end)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_inclusive_containment() {
        let span = Span::new(3, 7);
        assert!(span.contains_inclusive(3));
        assert!(span.contains_inclusive(7));
        assert!(!span.contains_inclusive(8));
        assert_eq!(span.len(), 4);
    }

    #[test]
    fn test_source_span_serializes_positions() {
        let source = Arc::new(SourceText::new("a: 1\nb: x\n", Some("doc.yml".into())));
        let span = SourceSpan {
            source,
            start: 8,
            end: 9,
        };
        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["file"], "doc.yml");
        assert_eq!(json["start"]["line"], 1);
        assert_eq!(json["start"]["column"], 3);
        assert_eq!(json["end"]["column"], 4);
        assert_eq!(span.text(), "x");
    }
}
