//! Builder API for diagnostic messages.
//!
//! The builder mirrors the tidyverse four-part structure: a title (via
//! `error`/`warning`/`info`), a problem statement, details and hints.

use crate::diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage};
use yamlmeta_mapped_text::SourceSpan;

/// Builder for [`DiagnosticMessage`].
///
/// ```
/// use yamlmeta_diagnostics::DiagnosticMessageBuilder;
///
/// let error = DiagnosticMessageBuilder::error("Incompatible types")
///     .with_code("Y-3-2")
///     .problem("Field `toc` must be a boolean")
///     .add_detail("The value `maybe` is a string")
///     .add_hint("Use `true` or `false`?")
///     .build();
///
/// assert_eq!(error.code.as_deref(), Some("Y-3-2"));
/// assert_eq!(error.details.len(), 1);
/// assert_eq!(error.hints.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    message: DiagnosticMessage,
}

impl DiagnosticMessageBuilder {
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage::new(kind, title),
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    /// Set the catalog code, e.g. `Y-3-1`.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.message.code = Some(code.into());
        self
    }

    /// Set the problem statement ("must" or "can't").
    pub fn problem(mut self, stmt: impl Into<String>) -> Self {
        self.message.problem = Some(stmt.into());
        self
    }

    fn push(mut self, kind: DetailKind, content: impl Into<String>) -> Self {
        self.message.details.push(DetailItem {
            kind,
            content: content.into(),
            location: None,
        });
        self
    }

    /// Add an error detail (✖ bullet).
    pub fn add_detail(self, detail: impl Into<String>) -> Self {
        self.push(DetailKind::Error, detail)
    }

    /// Add an info detail (ℹ bullet).
    pub fn add_info(self, info: impl Into<String>) -> Self {
        self.push(DetailKind::Info, info)
    }

    /// Add a note (• bullet).
    pub fn add_note(self, note: impl Into<String>) -> Self {
        self.push(DetailKind::Note, note)
    }

    /// Add an error detail that points at its own source span.
    pub fn add_detail_at(mut self, detail: impl Into<String>, location: SourceSpan) -> Self {
        self.message.details.push(DetailItem {
            kind: DetailKind::Error,
            content: detail.into(),
            location: Some(location),
        });
        self
    }

    pub fn add_hint(mut self, hint: impl Into<String>) -> Self {
        self.message.hints.push(hint.into());
        self
    }

    pub fn with_location(mut self, location: SourceSpan) -> Self {
        self.message.location = Some(location);
        self
    }

    pub fn build(self) -> DiagnosticMessage {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yamlmeta_mapped_text::{MappedText, Span};

    #[test]
    fn test_builder_kinds() {
        assert_eq!(DiagnosticMessageBuilder::error("e").build().kind, DiagnosticKind::Error);
        assert_eq!(DiagnosticMessageBuilder::warning("w").build().kind, DiagnosticKind::Warning);
        assert_eq!(DiagnosticMessageBuilder::info("i").build().kind, DiagnosticKind::Info);
    }

    #[test]
    fn test_detail_order_is_kept() {
        let msg = DiagnosticMessageBuilder::error("t")
            .add_info("first")
            .add_detail("second")
            .add_note("third")
            .build();
        let kinds: Vec<_> = msg.details.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DetailKind::Info, DetailKind::Error, DetailKind::Note]);
    }

    #[test]
    fn test_located_detail() {
        let text = MappedText::from_literal("a: 1\nb: 2\n", None);
        let span = text.source_span(Span::new(5, 6)).unwrap();
        let msg = DiagnosticMessageBuilder::error("t")
            .add_detail_at("first seen here", span.clone())
            .build();
        assert_eq!(msg.details[0].location, Some(span));
    }
}
