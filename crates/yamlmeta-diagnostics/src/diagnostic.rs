//! Core diagnostic message types.

use serde::Serialize;
use std::fmt::Write;
use yamlmeta_mapped_text::SourceSpan;

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Error,
    Warning,
    Info,
}

impl DiagnosticKind {
    fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Info => "Info",
        }
    }
}

/// Bullet style of a detail item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    /// ✖ bullet
    Error,
    /// ℹ bullet
    Info,
    /// • bullet
    Note,
}

impl DetailKind {
    fn bullet(self) -> &'static str {
        match self {
            DetailKind::Error => "✖",
            DetailKind::Info => "ℹ",
            DetailKind::Note => "•",
        }
    }
}

/// One bullet of a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailItem {
    pub kind: DetailKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceSpan>,
}

/// A diagnostic message following tidyverse-style structure.
///
/// 1. **Code**: optional error code (e.g. `Y-3-1`) from the catalog
/// 2. **Title**: brief message
/// 3. **Problem**: what went wrong, phrased with "must" or "can't"
/// 4. **Details**: specific facts about the failing input
/// 5. **Hints**: suggestions for fixing it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub title: String,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<DetailItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceSpan>,
}

impl DiagnosticMessage {
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            kind,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            location: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Render as text.
    ///
    /// With a location the source lines are drawn by ariadne, which already
    /// shows the title, code and problem; only unlocated details and hints
    /// follow. Without one, everything is written as tidyverse bullets:
    ///
    /// ```text
    /// Error [Y-3-1]: title
    /// Problem statement
    /// ✖ Error detail
    /// ℹ Info detail
    /// ? Hint
    /// ```
    pub fn to_text(&self) -> String {
        let mut result = String::new();
        let rendered = self
            .location
            .as_ref()
            .and_then(|loc| self.render_source_context(loc));

        match rendered {
            Some(source) => {
                result.push_str(&source);
                for detail in self.details.iter().filter(|d| d.location.is_none()) {
                    let _ = writeln!(result, "{} {}", detail.kind.bullet(), detail.content);
                }
            }
            None => {
                match &self.code {
                    Some(code) => {
                        let _ = writeln!(
                            result,
                            "{} [{}]: {}",
                            self.kind.label(),
                            code,
                            self.title
                        );
                    }
                    None => {
                        let _ = writeln!(result, "{}: {}", self.kind.label(), self.title);
                    }
                }
                if let Some(problem) = &self.problem {
                    let _ = writeln!(result, "{}", problem);
                }
                for detail in &self.details {
                    let _ = writeln!(result, "{} {}", detail.kind.bullet(), detail.content);
                }
            }
        }
        for hint in &self.hints {
            let _ = writeln!(result, "? {}", hint);
        }
        result.truncate(result.trim_end().len());
        result
    }

    /// Render as a JSON object.
    ///
    /// ```
    /// use yamlmeta_diagnostics::DiagnosticMessage;
    ///
    /// let json = DiagnosticMessage::error("Something went wrong").to_json();
    /// assert_eq!(json["kind"], "error");
    /// assert_eq!(json["title"], "Something went wrong");
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "kind": "error",
                "title": format!("unserializable diagnostic: {}", e),
            })
        })
    }

    fn render_source_context(&self, location: &SourceSpan) -> Option<String> {
        use ariadne::{Color, Config, Label, Report, ReportKind, Source};

        let text = location.source.value();
        let name = location.file_name().unwrap_or("<input>").to_string();
        // ariadne spans count characters
        let to_char = |offset: usize| text.get(..offset).map(|s| s.chars().count());
        let start = to_char(location.start)?;
        let end = to_char(location.end)?.max(start + 1);

        let (report_kind, color) = match self.kind {
            DiagnosticKind::Error => (ReportKind::Error, Color::Red),
            DiagnosticKind::Warning => (ReportKind::Warning, Color::Yellow),
            DiagnosticKind::Info => (ReportKind::Advice, Color::Cyan),
        };

        let mut report = Report::build(report_kind, name.clone(), start)
            .with_config(Config::default().with_color(false));
        report = match &self.code {
            Some(code) => report.with_message(format!("[{}] {}", code, self.title)),
            None => report.with_message(&self.title),
        };
        report = report.with_label(
            Label::new((name.clone(), start..end))
                .with_message(self.problem.as_deref().unwrap_or(&self.title))
                .with_color(color),
        );
        for detail in &self.details {
            let Some(loc) = &detail.location else {
                continue;
            };
            if !std::sync::Arc::ptr_eq(&loc.source, &location.source) {
                continue;
            }
            if let (Some(s), Some(e)) = (to_char(loc.start), to_char(loc.end)) {
                report = report.with_label(
                    Label::new((name.clone(), s..e.max(s + 1))).with_message(&detail.content),
                );
            }
        }

        let mut output = Vec::new();
        report
            .finish()
            .write((name, Source::from(text)), &mut output)
            .ok()?;
        String::from_utf8(output).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DiagnosticMessageBuilder;
    use yamlmeta_mapped_text::{MappedText, Span};

    #[test]
    fn test_to_text_simple_error() {
        let msg = DiagnosticMessage::error("Something went wrong");
        assert_eq!(msg.to_text(), "Error: Something went wrong");
    }

    #[test]
    fn test_to_text_with_code() {
        let msg = DiagnosticMessage::error("Something went wrong").with_code("Y-1-1");
        assert_eq!(msg.to_text(), "Error [Y-1-1]: Something went wrong");
    }

    #[test]
    fn test_to_text_bullets() {
        let msg = DiagnosticMessageBuilder::error("Invalid input")
            .problem("Values must be numeric")
            .add_detail("Found text in column 3")
            .add_info("Columns should contain only numbers")
            .add_note("Checked 4 columns")
            .add_hint("Convert to numbers first?")
            .build();

        let text = msg.to_text();
        assert!(text.starts_with("Error: Invalid input\nValues must be numeric\n"));
        assert!(text.contains("✖ Found text in column 3"));
        assert!(text.contains("ℹ Columns should contain only numbers"));
        assert!(text.contains("• Checked 4 columns"));
        assert!(text.ends_with("? Convert to numbers first?"));
    }

    #[test]
    fn test_to_text_with_location_shows_source() {
        let text = MappedText::from_literal("title: x\ntoc: yes\n", Some("doc.yml"));
        let span = text.source_span(Span::new(14, 17)).unwrap();
        let msg = DiagnosticMessageBuilder::error("Bad boolean")
            .with_location(span)
            .add_info("YAML 1.2 booleans are strict")
            .build();

        let rendered = msg.to_text();
        assert!(rendered.contains("Bad boolean"));
        assert!(rendered.contains("doc.yml"));
        assert!(rendered.contains("toc: yes"));
        assert!(rendered.contains("ℹ YAML 1.2 booleans are strict"));
    }

    #[test]
    fn test_to_json_full_message() {
        let text = MappedText::from_literal("a: 1\n", Some("x.yml"));
        let msg = DiagnosticMessageBuilder::error("Invalid input")
            .with_code("Y-3-2")
            .problem("Values must be numeric")
            .add_detail("Found text")
            .add_hint("Convert?")
            .with_location(text.source_span(Span::new(3, 4)).unwrap())
            .build();

        let json = msg.to_json();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["code"], "Y-3-2");
        assert_eq!(json["problem"], "Values must be numeric");
        assert_eq!(json["details"][0]["kind"], "error");
        assert_eq!(json["details"][0]["content"], "Found text");
        assert_eq!(json["hints"][0], "Convert?");
        assert_eq!(json["location"]["file"], "x.yml");
        assert_eq!(json["location"]["start"]["column"], 3);
    }

    #[test]
    fn test_to_json_omits_empty_fields() {
        let json = DiagnosticMessage::warning("Careful").to_json();
        assert_eq!(json["kind"], "warning");
        assert!(json.get("code").is_none());
        assert!(json.get("details").is_none());
        assert!(json.get("location").is_none());
    }
}
