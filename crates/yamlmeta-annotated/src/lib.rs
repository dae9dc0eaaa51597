//! # yamlmeta-annotated
//!
//! YAML parsing that keeps the exact source span of every node.
//!
//! Parsing runs in two stages. The [`resilient`] parser recovers from
//! syntax errors so that editors and validators still get a tree for
//! half-typed documents. Its tree is accepted when it covers enough of the
//! input; otherwise the [`strict`] parser (yaml-rust2) runs and reports the
//! first syntax error with its line and column.
//!
//! Spans are byte offsets into the parsed [`MappedText`], which maps them
//! back to the file the text came from.
//!
//! ## Example
//!
//! ```rust
//! use yamlmeta_annotated::{parse, NodeKind};
//! use yamlmeta_mapped_text::MappedText;
//!
//! let text = MappedText::from_literal("title: Hello\ntoc: true\n", Some("front-matter.yml"));
//! let tree = parse(&text).unwrap();
//!
//! assert_eq!(tree.kind, NodeKind::BlockMapping);
//! assert_eq!(tree.result["toc"], serde_json::json!(true));
//! assert_eq!(tree.value_node("title").unwrap().text(), "Hello");
//! ```

mod config;
mod error;
mod locate;
mod node;
pub mod resilient;
mod scalar;
pub mod strict;

pub use config::ParserConfig;
pub use error::{NavigationError, ParseError, ParseIssue, Result};
pub use locate::{CursorKind, CursorLocation, locate_annotation, locate_cursor, navigate};
pub use node::{AnnotatedParse, NodeKind, PathSegment, format_path};
pub use scalar::{key_to_string, resolve_plain};

use yamlmeta_mapped_text::MappedText;

/// Parse `source` with the default configuration.
pub fn parse(source: &MappedText) -> Result<AnnotatedParse> {
    parse_with_config(source, &ParserConfig::default())
}

/// Parse `source`, trying the recovering parser first when
/// `config.lenient` is set.
pub fn parse_with_config(source: &MappedText, config: &ParserConfig) -> Result<AnnotatedParse> {
    if config.lenient {
        if let Some(tree) = resilient::parse(source, config.min_coverage) {
            tracing::trace!(issues = tree.issues.len(), "Recovering parse accepted");
            return Ok(collapse_trivial(tree));
        }
        tracing::debug!(
            file = source.file_name().as_deref().unwrap_or("<unknown>"),
            "Falling back to strict YAML parse"
        );
    }
    strict::parse(source).map(collapse_trivial)
}

/// Replace nodes whose single child covers exactly the same span by that
/// child.
fn collapse_trivial(mut node: AnnotatedParse) -> AnnotatedParse {
    if node.components.len() == 1
        && node.components[0].start == node.start
        && node.components[0].end == node.end
        && !node.is_sequence()
    {
        let issues = std::mem::take(&mut node.issues);
        let mut child = collapse_trivial(node.components.remove(0));
        if child.issues.is_empty() {
            child.issues = issues;
        }
        return child;
    }
    node.components = node.components.into_iter().map(collapse_trivial).collect();
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collapse_keeps_sequences_of_one() {
        let text = MappedText::from_literal("[x]", None);
        let tree = parse(&text).unwrap();
        assert_eq!(tree.kind, NodeKind::FlowSequence);
        assert_eq!(tree.result, json!(["x"]));
    }

    #[test]
    fn test_strict_config_skips_recovery() {
        let text = MappedText::from_literal("a: 1\nthis is garbage\n", Some("doc.yml"));
        let lenient = parse(&text).unwrap();
        assert_eq!(lenient.components.len(), 4);

        let err = parse_with_config(&text, &ParserConfig::strict()).unwrap_err();
        assert_eq!(err.file_name.as_deref(), Some("doc.yml"));
        assert!(err.location.line >= 1);
    }
}
