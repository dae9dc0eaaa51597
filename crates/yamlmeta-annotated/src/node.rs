//! Annotated parse trees

use crate::error::ParseIssue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use yamlmeta_mapped_text::{MappedText, SourceSpan, Span};

/// Syntactic kind of an [`AnnotatedParse`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "block_mapping")]
    BlockMapping,
    #[serde(rename = "flow_mapping")]
    FlowMapping,
    #[serde(rename = "block_sequence")]
    BlockSequence,
    #[serde(rename = "flow_sequence")]
    FlowSequence,
    #[serde(rename = "plain_scalar")]
    PlainScalar,
    #[serde(rename = "single_quote_scalar")]
    SingleQuoteScalar,
    #[serde(rename = "double_quote_scalar")]
    DoubleQuoteScalar,
    #[serde(rename = "block_scalar")]
    BlockScalar,
    #[serde(rename = "alias")]
    Alias,
    #[serde(rename = "null")]
    Null,
    /// Placeholder for a missing value, e.g. `key:` with nothing after it.
    #[serde(rename = "<<EMPTY>>")]
    Empty,
    /// A line the parser could not make sense of.
    #[serde(rename = "ERROR")]
    Error,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::BlockMapping => "block_mapping",
            NodeKind::FlowMapping => "flow_mapping",
            NodeKind::BlockSequence => "block_sequence",
            NodeKind::FlowSequence => "flow_sequence",
            NodeKind::PlainScalar => "plain_scalar",
            NodeKind::SingleQuoteScalar => "single_quote_scalar",
            NodeKind::DoubleQuoteScalar => "double_quote_scalar",
            NodeKind::BlockScalar => "block_scalar",
            NodeKind::Alias => "alias",
            NodeKind::Null => "null",
            NodeKind::Empty => "<<EMPTY>>",
            NodeKind::Error => "ERROR",
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, NodeKind::BlockMapping | NodeKind::FlowMapping)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, NodeKind::BlockSequence | NodeKind::FlowSequence)
    }

    pub fn is_scalar(&self) -> bool {
        !self.is_mapping() && !self.is_sequence()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of an instance path: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Render a path as `a.b.0.c`.
pub fn format_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// A YAML node together with the span of text it was parsed from.
///
/// Mappings store their pairs flattened in `components` as
/// `[key0, value0, key1, value1, ...]`; sequences store one component per
/// item; scalars have no components. Spans are byte offsets into `source`.
#[derive(Debug, Clone)]
pub struct AnnotatedParse {
    pub start: usize,
    pub end: usize,
    pub result: Value,
    pub kind: NodeKind,
    pub components: Vec<AnnotatedParse>,
    pub source: MappedText,
    pub tag: Option<String>,
    /// Recoverable problems found while parsing; only filled on the root.
    pub issues: Vec<ParseIssue>,
}

impl AnnotatedParse {
    pub fn new(
        start: usize,
        end: usize,
        result: Value,
        kind: NodeKind,
        source: &MappedText,
    ) -> Self {
        AnnotatedParse {
            start,
            end,
            result,
            kind,
            components: Vec::new(),
            source: source.clone(),
            tag: None,
            issues: Vec::new(),
        }
    }

    /// A zero-width placeholder for a missing value.
    pub fn empty(at: usize, source: &MappedText) -> Self {
        AnnotatedParse::new(at, at, Value::Null, NodeKind::Empty, source)
    }

    pub fn with_components(mut self, components: Vec<AnnotatedParse>) -> Self {
        self.components = components;
        self
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// The raw text this node covers.
    pub fn text(&self) -> &str {
        self.source.value().get(self.start..self.end).unwrap_or("")
    }

    /// The covered text as a mapped substring of the source.
    pub fn mapped_text(&self) -> MappedText {
        self.source.substring(self.start, self.end)
    }

    /// The covered span resolved back to the root source text.
    pub fn source_span(&self) -> Option<SourceSpan> {
        self.source.source_span(self.span())
    }

    pub fn is_mapping(&self) -> bool {
        self.kind.is_mapping()
    }

    pub fn is_sequence(&self) -> bool {
        self.kind.is_sequence()
    }

    /// Key/value component pairs of a mapping, in document order.
    pub fn pairs(&self) -> impl Iterator<Item = (&AnnotatedParse, &AnnotatedParse)> {
        let components: &[AnnotatedParse] = if self.is_mapping() {
            &self.components
        } else {
            &[]
        };
        components.chunks_exact(2).map(|pair| (&pair[0], &pair[1]))
    }

    /// The key of a mapping pair as used in `result`.
    pub fn key_string(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Null => self.text().trim().to_string(),
            other => other.to_string(),
        }
    }

    /// Key node for `key`, preferring the last occurrence.
    pub fn key_node(&self, key: &str) -> Option<&AnnotatedParse> {
        self.pairs()
            .filter(|(k, _)| k.key_string() == key)
            .last()
            .map(|(k, _)| k)
    }

    /// Value node for `key`, preferring the last occurrence.
    pub fn value_node(&self, key: &str) -> Option<&AnnotatedParse> {
        self.pairs()
            .filter(|(k, _)| k.key_string() == key)
            .last()
            .map(|(_, v)| v)
    }

    /// Duplicate-key problems found while parsing.
    pub fn duplicate_keys(&self) -> impl Iterator<Item = &ParseIssue> {
        self.issues
            .iter()
            .filter(|i| matches!(i, ParseIssue::DuplicateKey { .. }))
    }

    /// Visit this node and all of its descendants, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a AnnotatedParse)) {
        visit(self);
        for c in &self.components {
            c.walk(visit);
        }
    }
}
