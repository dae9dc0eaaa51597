//! Error types for annotated parsing.

use crate::node::PathSegment;
use serde::Serialize;
use thiserror::Error;
use yamlmeta_mapped_text::{LineCol, Span};

/// Result type alias for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Unrecoverable syntax error.
///
/// Raised only when the resilient parser could not cover enough of the
/// input and the strict parser rejected it too.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{}: {message} (line {}, column {})",
    .file_name.as_deref().unwrap_or("<unknown>"),
    .location.line + 1,
    .location.column + 1
)]
pub struct ParseError {
    pub message: String,
    pub file_name: Option<String>,
    /// 0-based position of the problem in the root source.
    pub location: LineCol,
    /// Byte offset of the problem in the parsed text.
    pub offset: usize,
    /// Suggestions attached for well-known mistakes.
    pub hints: Vec<String>,
}

/// A problem the resilient parser recovered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ParseIssue {
    /// The same key appears twice in one mapping; the last one wins.
    DuplicateKey { key: String, first: Span, second: Span },
    /// A line that is not a `key: value` pair inside a mapping.
    UnexpectedLine { span: Span },
    /// Text left on a line after a complete value.
    TrailingContent { span: Span },
    /// A quote, bracket or brace that is never closed.
    Unclosed { span: Span, delimiter: char },
    /// An alias whose anchor was never defined.
    UnknownAlias { span: Span, name: String },
}

impl ParseIssue {
    pub fn span(&self) -> Span {
        match self {
            ParseIssue::DuplicateKey { second, .. } => *second,
            ParseIssue::UnexpectedLine { span }
            | ParseIssue::TrailingContent { span }
            | ParseIssue::Unclosed { span, .. }
            | ParseIssue::UnknownAlias { span, .. } => *span,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ParseIssue::DuplicateKey { key, .. } => format!("duplicate key `{}`", key),
            ParseIssue::UnexpectedLine { .. } => "expected a `key: value` pair".to_string(),
            ParseIssue::TrailingContent { .. } => "unexpected content after value".to_string(),
            ParseIssue::Unclosed { delimiter, .. } => format!("unclosed `{}`", delimiter),
            ParseIssue::UnknownAlias { name, .. } => format!("unknown alias `*{}`", name),
        }
    }
}

/// Raised by [`crate::locate_annotation`] when a path does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path for annotation lookup: {}", crate::node::format_path(.path))]
pub struct NavigationError {
    pub path: Vec<PathSegment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_is_one_based() {
        let err = ParseError {
            message: "did not find expected key".into(),
            file_name: Some("doc.yml".into()),
            location: LineCol::new(2, 4),
            offset: 17,
            hints: Vec::new(),
        };
        assert_eq!(
            err.to_string(),
            "doc.yml: did not find expected key (line 3, column 5)"
        );
    }

    #[test]
    fn test_issue_messages() {
        let issue = ParseIssue::DuplicateKey {
            key: "title".into(),
            first: Span::new(0, 5),
            second: Span::new(12, 17),
        };
        assert_eq!(issue.message(), "duplicate key `title`");
        assert_eq!(issue.span(), Span::new(12, 17));
    }
}
