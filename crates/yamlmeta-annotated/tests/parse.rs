//! End-to-end parsing tests through the public API.

use serde_json::json;
use yamlmeta_annotated::{
    CursorKind, NodeKind, ParseIssue, ParserConfig, PathSegment, locate_cursor, navigate, parse,
    parse_with_config, resilient,
};
use yamlmeta_mapped_text::{MappedText, TextPart};

// ============================================================================
// Scalars and structure
// ============================================================================

#[test]
fn test_literal_block_scalar_document() {
    let text = MappedText::from_literal("|\n  a\n  b\n", None);
    let tree = parse(&text).unwrap();
    assert_eq!(tree.kind, NodeKind::BlockScalar);
    assert_eq!(tree.result, json!("a\nb\n"));
}

#[test]
fn test_front_matter_style_document() {
    let src = "\
title: \"A Report\"
author:
  - name: Ana
    affiliation: Lab
  - name: Bo
format:
  html:
    code-fold: true
    toc-depth: 3
execute: {echo: false}
";
    let tree = parse(&MappedText::from_literal(src, Some("report.qmd"))).unwrap();
    assert_eq!(
        tree.result,
        json!({
            "title": "A Report",
            "author": [{"name": "Ana", "affiliation": "Lab"}, {"name": "Bo"}],
            "format": {"html": {"code-fold": true, "toc-depth": 3}},
            "execute": {"echo": false}
        })
    );
    assert!(tree.issues.is_empty());

    let path: Vec<PathSegment> = vec!["author".into(), PathSegment::Index(1), "name".into()];
    assert_eq!(navigate(&path, &tree, false).text(), "Bo");
}

#[test]
fn test_children_lie_within_parents() {
    let src = "a:\n  b: [1, {c: d}]\n  e: |\n    text\nf: - x\n";
    let tree = parse(&MappedText::from_literal(src, None)).unwrap();
    fn check(node: &yamlmeta_annotated::AnnotatedParse) {
        for child in &node.components {
            assert!(node.start <= child.start && child.end <= node.end, "{:?}", child.kind);
            check(child);
        }
        if node.is_mapping() {
            assert_eq!(node.components.len() % 2, 0);
        }
    }
    check(&tree);
}

// ============================================================================
// Recovery and fallback
// ============================================================================

#[test]
fn test_recovered_tree_reports_issues() {
    let src = "title: x\nauthr Ana\ntitle: y\n";
    let tree = parse(&MappedText::from_literal(src, None)).unwrap();
    assert_eq!(tree.result["title"], json!("y"));
    assert!(tree.issues.iter().any(|i| matches!(i, ParseIssue::UnexpectedLine { .. })));
    assert_eq!(tree.duplicate_keys().count(), 1);
}

#[test]
fn test_low_coverage_falls_back_to_strict() {
    let src = "a: 1\n---\nb: 2\nc: 3\nd: 4\n";
    let text = MappedText::from_literal(src, None);
    assert!(resilient::parse(&text, 0.95).is_none());
    let tree = parse(&text).unwrap();
    assert_eq!(tree.result, json!({"a": 1}));
}

#[test]
fn test_min_coverage_is_configurable() {
    let src = "a: 1\n---\nb: 2\n";
    let text = MappedText::from_literal(src, None);
    let config = ParserConfig {
        lenient: true,
        min_coverage: 0.0,
    };
    let tree = parse_with_config(&text, &config).unwrap();
    assert_eq!(tree.result, json!({"a": 1}));
}

// ============================================================================
// Mapped sources
// ============================================================================

#[test]
fn test_spans_map_back_through_substring() {
    let doc = "---\ntitle: Hi\ncount: x\n---\n\nBody text\n";
    let file = MappedText::from_literal(doc, Some("index.qmd"));
    let front = file.substring(4, 22);
    let tree = parse(&front).unwrap();
    let count = tree.value_node("count").unwrap();
    let span = count.source_span().unwrap();
    assert_eq!(span.file_name(), Some("index.qmd"));
    assert_eq!(span.start_line_col().line, 2);
    assert_eq!(span.start_line_col().column, 7);
}

#[test]
fn test_spans_map_back_through_concat() {
    let a = MappedText::from_literal("x: 1\n", Some("a.yml"));
    let b = MappedText::from_literal("y: 2\n", Some("b.yml"));
    let joined = MappedText::concat([TextPart::from(a), TextPart::from(b)]);
    let tree = parse(&joined).unwrap();
    let y = tree.value_node("y").unwrap();
    assert_eq!(y.source_span().unwrap().file_name(), Some("b.yml"));
}

#[test]
fn test_cursor_on_partial_document() {
    let src = "format:\n  html:\n    to";
    let tree = parse(&MappedText::from_literal(src, None)).unwrap();
    let loc = locate_cursor(&tree, src.len());
    assert_eq!(loc.path, vec![PathSegment::from("format"), PathSegment::from("html")]);
    assert_eq!(loc.kind, Some(CursorKind::Value));
}
