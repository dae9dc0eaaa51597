//! Strict YAML parsing on top of yaml-rust2's event stream.
//!
//! yaml-rust2 reports markers as character indices and only marks where a
//! token starts, so node ends are recovered from the source text here.

use crate::error::{ParseError, ParseIssue, Result};
use crate::node::{AnnotatedParse, NodeKind};
use crate::scalar::{apply_tag, key_to_string, resolve_plain};
use serde_json::{Map, Value};
use std::collections::HashMap;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};
use yamlmeta_mapped_text::{LineCol, MappedText, Span};

const EXPR_HINTS: [&str; 2] = [
    "YAML tags like !expr must be followed by YAML strings.",
    "Is it possible you need to quote the value you passed to !expr ?",
];

/// Parse the first document of `source`, failing on any syntax error.
pub fn parse(source: &MappedText) -> Result<AnnotatedParse> {
    let text = source.value();
    let mut builder = Builder::new(source);
    let mut parser = Parser::new_from_str(text);
    if let Err(err) = parser.load(&mut builder, false) {
        let offset = builder.byte(err.marker().index());
        return Err(to_parse_error(source, err.info(), offset));
    }
    Ok(builder.finish())
}

fn to_parse_error(source: &MappedText, info: &str, offset: usize) -> ParseError {
    let location = source
        .offset_to_line_col(offset)
        .unwrap_or(LineCol::new(0, 0));
    let text = source.value();
    let line_start = text[..offset.min(text.len())].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |i| line_start + i);
    let hints = if text[line_start..line_end].contains("!expr") {
        EXPR_HINTS.iter().map(|h| h.to_string()).collect()
    } else {
        Vec::new()
    };
    ParseError {
        message: info.to_string(),
        file_name: source.file_name(),
        location,
        offset,
        hints,
    }
}

/// Render a yaml-rust2 tag the way it appears in the document.
pub(crate) fn tag_string(tag: &Tag) -> String {
    match tag.handle.as_str() {
        "!" => format!("!{}", tag.suffix),
        "!!" | "tag:yaml.org,2002:" => format!("!!{}", tag.suffix),
        handle => format!("{}{}", handle, tag.suffix),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Sequence,
    Mapping,
}

struct Frame {
    kind: FrameKind,
    start: usize,
    flow: bool,
    tag: Option<String>,
    anchor_id: usize,
    items: Vec<AnnotatedParse>,
}

struct Builder<'a> {
    source: &'a MappedText,
    text: &'a str,
    char_to_byte: Vec<usize>,
    stack: Vec<Frame>,
    anchors: HashMap<usize, Value>,
    issues: Vec<ParseIssue>,
    root: Option<AnnotatedParse>,
}

impl<'a> Builder<'a> {
    fn new(source: &'a MappedText) -> Self {
        let text = source.value();
        let char_to_byte = text
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(text.len()))
            .collect();
        Builder {
            source,
            text,
            char_to_byte,
            stack: Vec::new(),
            anchors: HashMap::new(),
            issues: Vec::new(),
            root: None,
        }
    }

    fn byte(&self, char_index: usize) -> usize {
        self.char_to_byte
            .get(char_index)
            .copied()
            .unwrap_or(self.text.len())
    }

    fn finish(self) -> AnnotatedParse {
        let mut root = self
            .root
            .unwrap_or_else(|| AnnotatedParse::empty(0, self.source));
        root.issues = self.issues;
        root
    }

    fn push_complete(&mut self, node: AnnotatedParse) {
        match self.stack.last_mut() {
            Some(frame) => frame.items.push(node),
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
        }
    }

    /// Skip `!tag` and `&anchor` properties preceding a node's content.
    fn content_start(&self, mut pos: usize) -> usize {
        let bytes = self.text.as_bytes();
        while matches!(bytes.get(pos), Some(b'!' | b'&')) {
            while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
        }
        pos
    }

    /// Where a missing value sits: right after the `:` of its key, or
    /// after the `-` of its block sequence entry.
    fn empty_position(&self, fallback: usize) -> usize {
        let Some(frame) = self.stack.last() else {
            return fallback;
        };
        match frame.kind {
            FrameKind::Mapping if frame.items.len() % 2 == 1 => frame
                .items
                .last()
                .and_then(|key| self.text[key.end..].find(':').map(|i| key.end + i + 1))
                .unwrap_or(fallback),
            FrameKind::Sequence if !frame.flow => {
                let from = frame.items.last().map_or(frame.start, |item| item.end);
                let bytes = self.text.as_bytes();
                (from..bytes.len())
                    .find(|&i| {
                        bytes[i] == b'-'
                            && bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace())
                    })
                    .map_or(fallback, |i| i + 1)
            }
            _ => fallback,
        }
    }

    fn scalar_end(&self, start: usize, value: &str, style: TScalarStyle) -> usize {
        let text = self.text;
        match style {
            TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted => {
                quoted_end(text, start).unwrap_or(text.len())
            }
            TScalarStyle::Literal | TScalarStyle::Folded => block_scalar_end(text, start),
            _ => {
                if text[start..].starts_with(value) {
                    return start + value.len();
                }
                // folded plain scalar: walk its words through the source
                let mut cursor = start;
                for word in value.split_whitespace() {
                    match text[cursor..].find(word) {
                        Some(i) => cursor += i + word.len(),
                        None => break,
                    }
                }
                cursor
            }
        }
    }

    fn on_scalar(
        &mut self,
        value: String,
        style: TScalarStyle,
        anchor_id: usize,
        tag: Option<Tag>,
        mark: usize,
    ) {
        let content = self.content_start(mark);
        let tag = tag.as_ref().map(tag_string);
        let is_plain = !matches!(
            style,
            TScalarStyle::SingleQuoted
                | TScalarStyle::DoubleQuoted
                | TScalarStyle::Literal
                | TScalarStyle::Folded
        );

        let missing = is_plain
            && (value.is_empty() || (value == "~" && !self.text[content..].starts_with('~')));
        let (start, end, kind, mut result) = if missing {
            let at = if tag.is_some() { content } else { self.empty_position(mark) };
            (at, at, NodeKind::Empty, Value::Null)
        } else {
            let content = match style {
                TScalarStyle::Literal | TScalarStyle::Folded => {
                    block_scalar_indicator(self.text, content)
                }
                _ => content,
            };
            let end = self.scalar_end(content, &value, style);
            let kind = match style {
                TScalarStyle::SingleQuoted => NodeKind::SingleQuoteScalar,
                TScalarStyle::DoubleQuoted => NodeKind::DoubleQuoteScalar,
                TScalarStyle::Literal | TScalarStyle::Folded => NodeKind::BlockScalar,
                _ => NodeKind::PlainScalar,
            };
            let result = if is_plain {
                resolve_plain(&value)
            } else {
                Value::String(value.clone())
            };
            (mark.min(content), end, kind, result)
        };

        if let Some(tag) = &tag {
            let raw = if missing { "" } else { value.as_str() };
            result = apply_tag(tag, result, raw);
        }
        if anchor_id > 0 {
            self.anchors.insert(anchor_id, result.clone());
        }
        let mut node = AnnotatedParse::new(start, end.max(start), result, kind, self.source);
        node.tag = tag;
        self.push_complete(node);
    }

    fn open(&mut self, kind: FrameKind, anchor_id: usize, tag: Option<Tag>, mark: usize) {
        let content = self.content_start(mark);
        let flow = matches!(self.text.as_bytes().get(content), Some(b'[' | b'{'));
        self.stack.push(Frame {
            kind,
            start: mark.min(content),
            flow,
            tag: tag.as_ref().map(tag_string),
            anchor_id,
            items: Vec::new(),
        });
    }

    fn close(&mut self, mark: usize) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let closer = match frame.kind {
            FrameKind::Sequence => b']',
            FrameKind::Mapping => b'}',
        };
        let end = if frame.flow && self.text.as_bytes().get(mark) == Some(&closer) {
            mark + 1
        } else {
            frame
                .items
                .iter()
                .map(|c| c.end)
                .max()
                .unwrap_or(frame.start)
        };

        let (result, kind) = match frame.kind {
            FrameKind::Sequence => (
                Value::Array(frame.items.iter().map(|i| i.result.clone()).collect()),
                if frame.flow {
                    NodeKind::FlowSequence
                } else {
                    NodeKind::BlockSequence
                },
            ),
            FrameKind::Mapping => {
                let mut map = Map::new();
                let mut seen: HashMap<String, Span> = HashMap::new();
                for pair in frame.items.chunks(2) {
                    let name = key_to_string(&pair[0].result);
                    if let Some(first) = seen.get(&name) {
                        self.issues.push(ParseIssue::DuplicateKey {
                            key: name.clone(),
                            first: *first,
                            second: pair[0].span(),
                        });
                    } else {
                        seen.insert(name.clone(), pair[0].span());
                    }
                    let value = pair.get(1).map_or(Value::Null, |v| v.result.clone());
                    map.insert(name, value);
                }
                (
                    Value::Object(map),
                    if frame.flow {
                        NodeKind::FlowMapping
                    } else {
                        NodeKind::BlockMapping
                    },
                )
            }
        };

        let result = match &frame.tag {
            Some(tag) => apply_tag(tag, result, &self.text[frame.start..end]),
            None => result,
        };
        if frame.anchor_id > 0 {
            self.anchors.insert(frame.anchor_id, result.clone());
        }
        let mut node = AnnotatedParse::new(frame.start, end, result, kind, self.source)
            .with_components(frame.items);
        node.tag = frame.tag;
        self.push_complete(node);
    }
}

impl MarkedEventReceiver for Builder<'_> {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        let mark = self.byte(marker.index());
        match ev {
            Event::Scalar(value, style, anchor_id, tag) => {
                self.on_scalar(value, style, anchor_id, tag, mark);
            }
            Event::SequenceStart(anchor_id, tag) => {
                self.open(FrameKind::Sequence, anchor_id, tag, mark);
            }
            Event::MappingStart(anchor_id, tag) => {
                self.open(FrameKind::Mapping, anchor_id, tag, mark);
            }
            Event::SequenceEnd | Event::MappingEnd => self.close(mark),
            Event::Alias(id) => {
                let bytes = self.text.as_bytes();
                let mut end = mark + 1;
                while end < bytes.len()
                    && !bytes[end].is_ascii_whitespace()
                    && !matches!(bytes[end], b',' | b']' | b'}')
                {
                    end += 1;
                }
                let result = self.anchors.get(&id).cloned().unwrap_or(Value::Null);
                let node = AnnotatedParse::new(
                    mark,
                    end.min(bytes.len()),
                    result,
                    NodeKind::Alias,
                    self.source,
                );
                self.push_complete(node);
            }
            _ => {}
        }
    }
}

/// Byte offset just past the closing quote of a quoted scalar at `start`.
fn quoted_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let quote = *bytes.get(start)?;
    let mut i = start + 1;
    while i < bytes.len() {
        if quote == b'"' && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// The `|` or `>` opening a block scalar. The parser marks a block scalar
/// at its first content line, so the header is the closest preceding line
/// holding an indicator outside a comment.
fn block_scalar_indicator(text: &str, mark: usize) -> usize {
    if matches!(text.as_bytes().get(mark), Some(b'|' | b'>')) {
        return mark;
    }
    let mut line_end = mark;
    while line_end > 0 {
        let line_start = text[..line_end].rfind('\n').map_or(0, |i| i + 1);
        let line = &text[line_start..line_end];
        let code = line.find(" #").map_or(line, |i| &line[..i]);
        if let Some(i) = code.rfind(['|', '>']) {
            return line_start + i;
        }
        line_end = line_start.saturating_sub(1);
    }
    mark
}

/// End of the last content line of a block scalar whose indicator is at
/// `start`.
fn block_scalar_end(text: &str, start: usize) -> usize {
    let mut end = text[start..].find('\n').map_or(text.len(), |i| start + i);
    let header_end = text[..end].trim_end().len();
    let mut indent: Option<usize> = None;
    let mut last = header_end;
    while end < text.len() {
        let line_start = end + 1;
        let line_end = text[line_start..]
            .find('\n')
            .map_or(text.len(), |i| line_start + i);
        let line = text[line_start..line_end].trim_end();
        end = line_end;
        if line.is_empty() {
            continue;
        }
        let this = line.len() - line.trim_start().len();
        let required = *indent.get_or_insert(this);
        if this < required || this == 0 {
            break;
        }
        last = line_start + line.len();
    }
    last
}
