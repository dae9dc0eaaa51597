//! Human-readable error reports

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use yamlmeta_diagnostics::{DiagnosticMessage, DiagnosticMessageBuilder, get_error_info};
use yamlmeta_mapped_text::{LineCol, MappedText, SourceSpan, Span, format_line_range};

/// Start and end of the violating text, 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorLocation {
    pub start: LineCol,
    pub end: LineCol,
}

/// The presentation of a validation error.
///
/// `info` maps stable keys such as `did-you-mean-key` or `suggestion-fix`
/// to one line of advice each. Handlers may add, replace or remove entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NiceError {
    pub heading: String,
    pub body: Vec<String>,
    pub info: IndexMap<String, String>,
    pub file_name: Option<String>,
    pub location: ErrorLocation,
    pub source_context: String,
    /// Catalog code, `Y-3-*`.
    pub code: String,
    #[serde(skip)]
    pub source_span: Option<SourceSpan>,
}

impl NiceError {
    /// Convert into a diagnostic message.
    ///
    /// Typo suggestions and fixes become hints; other info entries become
    /// info details.
    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        let title = get_error_info(&self.code)
            .map(|info| info.title)
            .unwrap_or("Schema Violation");
        let mut builder = DiagnosticMessageBuilder::error(title)
            .with_code(&self.code)
            .problem(&self.heading);
        for line in &self.body {
            builder = builder.add_detail(line);
        }
        for (key, text) in &self.info {
            builder = if key.starts_with("did-you-mean") || key == "suggestion-fix" {
                builder.add_hint(text)
            } else {
                builder.add_info(text)
            };
        }
        if let Some(span) = &self.source_span {
            builder = builder.with_location(span.clone());
        }
        builder.build()
    }
}

/// Strip common indentation so a nested value can be quoted in a message.
///
/// The second-smallest indentation found becomes the new step: lines with
/// the smallest indentation move to column 0 and every other line keeps its
/// depth relative to that step.
pub fn reindent(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect();
    let indents: BTreeSet<usize> = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .collect();
    let mut smallest = indents.iter();
    let (Some(&first), Some(&second)) = (smallest.next(), smallest.next()) else {
        return lines
            .iter()
            .map(|l| l.trim_start_matches(' '))
            .collect::<Vec<_>>()
            .join("\n");
    };
    let step = second - first;
    lines
        .iter()
        .map(|l| {
            let indent = l.len() - l.trim_start_matches(' ').len();
            let depth = indent.saturating_sub(first) / step;
            format!("{}{}", " ".repeat(depth * 2), l.trim_start_matches(' '))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `(line 3, columns 5--9)` or, for multi-line spans,
/// `(line 3, column 5 through line 4, column 2)`. 1-based.
pub fn location_string(location: &ErrorLocation) -> String {
    let ErrorLocation { start, end } = location;
    if start.line == end.line {
        format!(
            "(line {}, columns {}--{})",
            start.line + 1,
            start.column + 1,
            end.column + 1
        )
    } else {
        format!(
            "(line {}, column {} through line {}, column {})",
            start.line + 1,
            start.column + 1,
            end.line + 1,
            end.column + 1
        )
    }
}

/// The lines around `span` with the covered region underlined by `~`.
///
/// One line of context is shown on each side when it is not blank. Inside
/// spans of five or more lines, lines two away from both ends are
/// collapsed into a single `...`.
pub fn source_context(text: &MappedText, span: Span) -> String {
    let Some(resolved) = text.source_span(span) else {
        return String::new();
    };
    let root = resolved.source.clone();
    if root.value().is_empty() {
        return String::new();
    }
    let start = resolved.start_line_col();
    let end = resolved.end_line_col();
    let first = start.line.saturating_sub(1);
    let last = (end.line + 1).min(root.line_count().saturating_sub(1));

    let mut out: Vec<String> = Vec::new();
    let mut elided = false;
    for line in format_line_range(root.value(), first, last) {
        if line.line < start.line || line.line > end.line {
            if !line.content.trim().is_empty() {
                out.push(format!("{}{}", line.gutter, line.content));
            }
            continue;
        }
        if line.line >= start.line + 2 && line.line + 2 <= end.line {
            if !elided {
                out.push("...".to_string());
                elided = true;
            }
            continue;
        }
        let start_col = if line.line > start.line { 0 } else { start.column };
        let end_col = if line.line < end.line {
            line.content.chars().count()
        } else {
            end.column
        };
        out.push(format!("{}{}", line.gutter, line.content));
        out.push(format!(
            "{}{}",
            " ".repeat(line.gutter.len() + start_col),
            "~".repeat(end_col.saturating_sub(start_col).max(1))
        ));
    }
    out.join("\n")
}
