//! Error-recovering YAML parser.
//!
//! An indentation-aware recursive-descent parser that never fails: lines it
//! cannot interpret inside a mapping become `ERROR` pairs, missing values
//! become zero-width `<<EMPTY>>` nodes, and unclosed quotes or brackets are
//! closed where the parser gives up on them. Every recovery is recorded as a
//! [`ParseIssue`] on the root.
//!
//! The tree is only trusted when it covers most of the input; see
//! [`coverage`].

use crate::error::ParseIssue;
use crate::node::{AnnotatedParse, NodeKind};
use crate::scalar::{apply_tag, key_to_string, resolve_plain};
use serde_json::{Map, Value};
use std::collections::HashMap;
use yamlmeta_mapped_text::{MappedText, Span};

/// Parse `source`, returning the tree only if it covers at least
/// `min_coverage` of the significant input.
pub fn parse(source: &MappedText, min_coverage: f64) -> Option<AnnotatedParse> {
    let root = parse_tree(source);
    let covered = coverage(&root);
    if covered < min_coverage {
        tracing::debug!(
            coverage = covered,
            min_coverage,
            "Recovering parse rejected for low coverage"
        );
        return None;
    }
    Some(root)
}

/// Parse `source` without a coverage check.
pub fn parse_tree(source: &MappedText) -> AnnotatedParse {
    let mut parser = Parser::new(source);
    parser.skip_prologue();
    let mut root = parser.parse_node(-1, Context::Document);
    parser.finish_document();
    root.issues = parser.issues;
    root
}

/// Fraction of the significant characters of the input that lie inside the
/// root node.
///
/// Whitespace never counts. Outside the root, comments, directives and
/// document markers don't count either, so a leading comment block does not
/// make a good parse look lossy.
pub fn coverage(root: &AnnotatedParse) -> f64 {
    let text = root.source.value();
    let start = root.start.min(text.len());
    let end = root.end.clamp(start, text.len());
    let inside = count_non_ws(&text[start..end]);
    let outside = count_significant(&text[..start]) + count_significant(&text[end..]);
    if inside + outside == 0 {
        return 1.0;
    }
    inside as f64 / (inside + outside) as f64
}

fn count_non_ws(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

fn count_significant(s: &str) -> usize {
    s.split('\n')
        .map(|line| {
            let line = strip_comment(line).trim();
            if line.is_empty() || line.starts_with('%') || line == "---" || line == "..." {
                0
            } else {
                count_non_ws(line)
            }
        })
        .sum()
}

fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && (i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t') {
            return &line[..i];
        }
    }
    line
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Document,
    MappingValue,
    SequenceItem,
}

struct Parser<'a> {
    source: &'a MappedText,
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    issues: Vec<ParseIssue>,
    anchors: HashMap<String, Value>,
    /// Indentation of the block holding the current flow collection. A line
    /// indented no deeper ends an unclosed collection.
    flow_limit: isize,
}

fn is_space(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn is_flow_indicator(b: u8) -> bool {
    matches!(b, b',' | b'[' | b']' | b'{' | b'}')
}

impl<'a> Parser<'a> {
    fn new(source: &'a MappedText) -> Self {
        let text = source.value();
        Parser {
            source,
            text,
            bytes: text.as_bytes(),
            pos: 0,
            issues: Vec::new(),
            anchors: HashMap::new(),
            flow_limit: -1,
        }
    }

    // ------------------------------------------------------------------
    // Low-level scanning
    // ------------------------------------------------------------------

    fn eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn byte_at(&self, i: usize) -> Option<u8> {
        self.bytes.get(i).copied()
    }

    /// True if `i` is past the end or holds whitespace.
    fn ws_or_end(&self, i: usize) -> bool {
        match self.byte_at(i) {
            None => true,
            Some(b) => is_space(b) || b == b'\n' || b == b'\r',
        }
    }

    fn line_start(&self, pos: usize) -> usize {
        self.text[..pos.min(self.text.len())]
            .rfind('\n')
            .map_or(0, |i| i + 1)
    }

    /// Index of the `\n` ending the line containing `pos`, or the text length.
    fn line_end(&self, pos: usize) -> usize {
        self.text[pos.min(self.text.len())..]
            .find('\n')
            .map_or(self.text.len(), |i| pos + i)
    }

    fn column(&self, pos: usize) -> usize {
        pos - self.line_start(pos)
    }

    fn at_line_end(&self) -> bool {
        match self.peek() {
            None | Some(b'\n') => true,
            Some(b'\r') => matches!(self.byte_at(self.pos + 1), None | Some(b'\n')),
            _ => false,
        }
    }

    fn at_comment(&self) -> bool {
        self.peek() == Some(b'#')
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b) if is_space(b)) {
            self.pos += 1;
        }
    }

    fn skip_to_line_end(&mut self) {
        self.pos = self.line_end(self.pos);
        if self.pos > 0 && self.byte_at(self.pos - 1) == Some(b'\r') && self.pos < self.text.len() {
            self.pos -= 1;
        }
    }

    fn consume_newline(&mut self) {
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
    }

    /// From the end of a line, move to the first content character of the
    /// next line that has any, skipping blank and comment-only lines.
    fn skip_to_next_content_line(&mut self) -> bool {
        loop {
            if self.eof() {
                return false;
            }
            self.consume_newline();
            self.skip_spaces();
            if self.eof() {
                return false;
            }
            if self.at_comment() {
                self.skip_to_line_end();
                continue;
            }
            if self.at_line_end() {
                continue;
            }
            return true;
        }
    }

    /// Skip spaces and a trailing comment, then any following blank or
    /// comment lines. Returns with `pos` at content or at the end.
    fn skip_to_next_content(&mut self) {
        self.skip_spaces();
        if self.at_comment() {
            self.skip_to_line_end();
        }
        if self.at_line_end() {
            self.skip_to_next_content_line();
        }
    }

    /// After a complete value: allow spaces and a comment, flag anything else.
    fn finish_line(&mut self) {
        self.skip_spaces();
        if self.at_comment() {
            self.skip_to_line_end();
        }
        if !self.at_line_end() {
            let start = self.pos;
            let end = start + self.text[start..self.line_end(start)].trim_end().len();
            self.issues.push(ParseIssue::TrailingContent {
                span: Span::new(start, end),
            });
            self.skip_to_line_end();
        }
    }

    fn is_doc_marker(&self, pos: usize) -> bool {
        self.column(pos) == 0
            && (self.text[pos..].starts_with("---") || self.text[pos..].starts_with("..."))
            && self.ws_or_end(pos + 3)
    }

    fn at_seq_indicator(&self) -> bool {
        self.peek() == Some(b'-') && self.ws_or_end(self.pos + 1)
    }

    /// Position of the `:` making the line starting at `from` a plain
    /// `key: value` pair.
    fn find_mapping_indicator(&self, from: usize) -> Option<usize> {
        let end = self.line_end(from);
        let mut i = from;
        while i < end {
            let b = self.bytes[i];
            if b == b'#' && i > from && is_space(self.bytes[i - 1]) {
                return None;
            }
            if b == b':' && self.ws_or_end(i + 1) {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// Closing quote of the quoted scalar opening at `start`.
    fn find_closing_quote(&self, start: usize) -> Option<usize> {
        let quote = self.bytes[start];
        let mut i = start + 1;
        while i < self.bytes.len() {
            let b = self.bytes[i];
            if quote == b'"' && b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                if quote == b'\'' && self.byte_at(i + 1) == Some(b'\'') {
                    i += 2;
                    continue;
                }
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// True if a quoted scalar at `start` closes on its line and is
    /// followed by a mapping indicator.
    fn is_quoted_key(&self, start: usize) -> bool {
        let Some(close) = self.find_closing_quote(start) else {
            return false;
        };
        if close > self.line_end(start) {
            return false;
        }
        let mut i = close + 1;
        while matches!(self.byte_at(i), Some(b) if is_space(b)) {
            i += 1;
        }
        self.byte_at(i) == Some(b':') && self.ws_or_end(i + 1)
    }

    fn node(&self, start: usize, end: usize, result: Value, kind: NodeKind) -> AnnotatedParse {
        AnnotatedParse::new(start, end, result, kind, self.source)
    }

    fn empty(&self, at: usize) -> AnnotatedParse {
        AnnotatedParse::empty(at, self.source)
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    fn skip_prologue(&mut self) {
        if self.text.starts_with('\u{feff}') {
            self.pos = '\u{feff}'.len_utf8();
        }
        loop {
            self.skip_spaces();
            if self.eof() {
                return;
            }
            if self.at_comment() || (self.peek() == Some(b'%') && self.column(self.pos) == 0) {
                self.skip_to_line_end();
                self.consume_newline();
                continue;
            }
            if self.at_line_end() {
                self.consume_newline();
                continue;
            }
            if self.is_doc_marker(self.pos) && self.text[self.pos..].starts_with("---") {
                self.pos += 3;
            }
            return;
        }
    }

    fn finish_document(&mut self) {
        self.finish_line();
        while self.skip_to_next_content_line() {
            if self.is_doc_marker(self.pos) && self.text[self.pos..].starts_with("...") {
                self.pos += 3;
                self.finish_line();
                continue;
            }
            // remaining content is left uncovered; coverage decides
            return;
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Parse the node starting at the current position or on the following
    /// lines, as long as it is indented more than `parent_indent`.
    fn parse_node(&mut self, parent_indent: isize, ctx: Context) -> AnnotatedParse {
        let anchor = self.pos;
        self.skip_spaces();
        let inline = !self.at_comment() && !self.at_line_end();
        if !inline {
            self.skip_to_next_content();
            if self.eof() || self.is_doc_marker(self.pos) {
                self.pos = anchor;
                return self.empty(anchor);
            }
            let col = self.column(self.pos) as isize;
            let deeper = col > parent_indent
                || (ctx == Context::MappingValue && col == parent_indent && self.at_seq_indicator());
            if !deeper {
                self.pos = anchor;
                return self.empty(anchor);
            }
        }
        self.parse_content(parent_indent, ctx, inline)
    }

    fn parse_content(&mut self, parent_indent: isize, ctx: Context, inline: bool) -> AnnotatedParse {
        let start = self.pos;
        let col = self.column(start);
        // `key: value` on one line: the value can't open a block mapping
        let value_position = ctx == Context::MappingValue && inline;

        match self.peek() {
            Some(b'!') | Some(b'&') => self.parse_with_properties(parent_indent, ctx),
            Some(b'-') if self.ws_or_end(start + 1) && !value_position => {
                self.parse_block_sequence(col)
            }
            Some(b'[') | Some(b'{') => {
                self.flow_limit = parent_indent;
                self.parse_flow()
            }
            Some(b'|') | Some(b'>') => self.parse_block_scalar(parent_indent),
            Some(b'"') | Some(b'\'') => {
                if !value_position && self.is_quoted_key(start) {
                    self.parse_block_mapping(col)
                } else {
                    self.parse_quoted()
                }
            }
            Some(b'*') => self.parse_alias(),
            _ => {
                if !value_position && self.find_mapping_indicator(start).is_some() {
                    self.parse_block_mapping(col)
                } else {
                    self.parse_plain(parent_indent)
                }
            }
        }
    }

    fn parse_with_properties(&mut self, parent_indent: isize, ctx: Context) -> AnnotatedParse {
        let start = self.pos;
        let mut tag = None;
        let mut anchor = None;
        while let Some(b @ (b'!' | b'&')) = self.peek() {
            let token_start = self.pos;
            while !self.ws_or_end(self.pos) {
                self.pos += 1;
            }
            let token = &self.text[token_start..self.pos];
            if b == b'!' {
                tag = Some(token.to_string());
            } else {
                anchor = Some(token[1..].to_string());
            }
            self.skip_spaces();
        }

        let mut node = if self.at_comment() || self.at_line_end() {
            self.parse_node(parent_indent, ctx)
        } else {
            self.parse_content(parent_indent, ctx, true)
        };

        if let Some(tag) = tag {
            let raw = node.text().to_string();
            node.result = apply_tag(&tag, node.result, &raw);
            node.tag = Some(tag);
            node.start = start.min(node.start);
            node.end = node.end.max(node.start);
        }
        if let Some(name) = anchor {
            self.anchors.insert(name, node.result.clone());
        }
        node
    }

    fn parse_alias(&mut self) -> AnnotatedParse {
        let start = self.pos;
        self.pos += 1;
        while !self.ws_or_end(self.pos) && !self.peek().is_some_and(is_flow_indicator) {
            self.pos += 1;
        }
        let name = &self.text[start + 1..self.pos];
        let result = match self.anchors.get(name) {
            Some(v) => v.clone(),
            None => {
                self.issues.push(ParseIssue::UnknownAlias {
                    span: Span::new(start, self.pos),
                    name: name.to_string(),
                });
                Value::Null
            }
        };
        self.node(start, self.pos, result, NodeKind::Alias)
    }

    // ------------------------------------------------------------------
    // Block collections
    // ------------------------------------------------------------------

    fn parse_block_mapping(&mut self, indent: usize) -> AnnotatedParse {
        let start = self.pos;
        let mut components: Vec<AnnotatedParse> = Vec::new();
        let mut result = Map::new();
        let mut seen: HashMap<String, Span> = HashMap::new();
        let mut stray = false;

        loop {
            let pair = if stray || self.at_seq_indicator() {
                None
            } else {
                self.parse_key()
            };
            match pair {
                Some(key) => {
                    let value = self.parse_node(indent as isize, Context::MappingValue);
                    let name = key_to_string(&key.result);
                    if let Some(first) = seen.get(&name) {
                        self.issues.push(ParseIssue::DuplicateKey {
                            key: name.clone(),
                            first: *first,
                            second: key.span(),
                        });
                    } else {
                        seen.insert(name.clone(), key.span());
                    }
                    result.insert(name, value.result.clone());
                    components.push(key);
                    components.push(value);
                }
                None => {
                    let (key, value) = self.error_pair();
                    result.insert(key_to_string(&key.result), Value::Null);
                    components.push(key);
                    components.push(value);
                }
            }

            self.finish_line();
            let save = self.pos;
            if !self.skip_to_next_content_line() {
                self.pos = save;
                break;
            }
            let col = self.column(self.pos);
            if col < indent || self.is_doc_marker(self.pos) {
                self.pos = save;
                break;
            }
            stray = col > indent;
        }

        let end = components.iter().map(|c| c.end).max().unwrap_or(start);
        self.node(start, end, Value::Object(result), NodeKind::BlockMapping)
            .with_components(components)
    }

    /// Parse `key:` leaving the position right after the colon.
    fn parse_key(&mut self) -> Option<AnnotatedParse> {
        let start = self.pos;
        match self.peek() {
            Some(b'"') | Some(b'\'') => {
                if !self.is_quoted_key(start) {
                    return None;
                }
                let key = self.parse_quoted();
                self.skip_spaces();
                // is_quoted_key guarantees the colon
                self.pos += 1;
                Some(key)
            }
            _ => {
                let colon = self.find_mapping_indicator(start)?;
                let raw = self.text[start..colon].trim_end();
                self.pos = colon + 1;
                Some(self.node(
                    start,
                    start + raw.len(),
                    resolve_plain(raw),
                    NodeKind::PlainScalar,
                ))
            }
        }
    }

    /// Turn the rest of the current line into an `ERROR` key with an empty
    /// value.
    fn error_pair(&mut self) -> (AnnotatedParse, AnnotatedParse) {
        let start = self.pos;
        let line_end = self.line_end(start);
        let raw = self.text[start..line_end].trim_end();
        let end = start + raw.len();
        self.issues.push(ParseIssue::UnexpectedLine {
            span: Span::new(start, end),
        });
        self.pos = end;
        let key = self.node(start, end, Value::String(raw.to_string()), NodeKind::Error);
        (key, self.empty(end))
    }

    fn parse_block_sequence(&mut self, indent: usize) -> AnnotatedParse {
        let start = self.pos;
        let mut items: Vec<AnnotatedParse> = Vec::new();

        'items: loop {
            // at '-'
            self.pos += 1;
            let item = self.parse_node(indent as isize, Context::SequenceItem);
            items.push(item);

            self.finish_line();
            loop {
                let save = self.pos;
                if !self.skip_to_next_content_line() {
                    self.pos = save;
                    break 'items;
                }
                let col = self.column(self.pos);
                if col == indent && self.at_seq_indicator() && !self.is_doc_marker(self.pos) {
                    continue 'items;
                }
                if col > indent {
                    let line_start = self.pos;
                    let line = &self.text[line_start..self.line_end(line_start)];
                    let end = line_start + line.trim_end().len();
                    self.issues.push(ParseIssue::UnexpectedLine {
                        span: Span::new(line_start, end),
                    });
                    self.skip_to_line_end();
                    continue;
                }
                self.pos = save;
                break 'items;
            }
        }

        let end = items.iter().map(|c| c.end).max().unwrap_or(start + 1);
        let result = Value::Array(items.iter().map(|i| i.result.clone()).collect());
        self.node(start, end, result, NodeKind::BlockSequence)
            .with_components(items)
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    /// End of plain content on the line starting at `from`: stops before a
    /// comment and drops trailing whitespace.
    fn plain_line_end(&self, from: usize) -> usize {
        let end = self.line_end(from);
        let mut stop = end;
        for i in from..end {
            if self.bytes[i] == b'#' && i > from && is_space(self.bytes[i - 1]) {
                stop = i;
                break;
            }
        }
        from + self.text[from..stop].trim_end().len()
    }

    fn parse_plain(&mut self, parent_indent: isize) -> AnnotatedParse {
        let start = self.pos;
        let mut end = self.plain_line_end(start);
        let mut folded = self.text[start..end].to_string();
        let mut multiline = false;

        loop {
            // a comment ends a plain scalar
            if self.text[end..self.line_end(end)].trim_start().starts_with('#') {
                break;
            }
            let mut p = self.line_end(end);
            let mut breaks = 0;
            let next = loop {
                if p >= self.bytes.len() {
                    break None;
                }
                p += 1;
                let line_end = self.line_end(p);
                let line = &self.text[p..line_end];
                if line.trim().is_empty() {
                    breaks += 1;
                    p = line_end;
                    continue;
                }
                break Some(p + (line.len() - line.trim_start().len()));
            };
            let Some(q) = next else { break };
            let col = self.column(q) as isize;
            if col <= parent_indent
                || self.is_doc_marker(q)
                || self.bytes[q] == b'#'
                || self.find_mapping_indicator(q).is_some()
            {
                break;
            }
            let line_end = self.plain_line_end(q);
            if breaks == 0 {
                folded.push(' ');
            } else {
                folded.extend(std::iter::repeat_n('\n', breaks));
            }
            folded.push_str(&self.text[q..line_end]);
            end = line_end;
            multiline = true;
        }

        self.pos = end;
        let result = if multiline {
            Value::String(folded)
        } else {
            resolve_plain(&folded)
        };
        self.node(start, end, result, NodeKind::PlainScalar)
    }

    fn parse_quoted(&mut self) -> AnnotatedParse {
        let start = self.pos;
        let quote = self.bytes[start];
        let kind = if quote == b'"' {
            NodeKind::DoubleQuoteScalar
        } else {
            NodeKind::SingleQuoteScalar
        };
        match self.find_closing_quote(start) {
            Some(close) => {
                let value = decode_quoted(&self.text[start + 1..close], quote);
                self.pos = close + 1;
                self.node(start, close + 1, Value::String(value), kind)
            }
            None => {
                let end = start + self.text[start..self.line_end(start)].trim_end().len();
                self.issues.push(ParseIssue::Unclosed {
                    span: Span::new(start, end),
                    delimiter: quote as char,
                });
                let value = self.text[start + 1..end].to_string();
                self.pos = end;
                self.node(start, end, Value::String(value), kind)
            }
        }
    }

    fn parse_block_scalar(&mut self, parent_indent: isize) -> AnnotatedParse {
        let start = self.pos;
        let literal = self.bytes[start] == b'|';
        self.pos += 1;

        let mut chomp = Chomp::Clip;
        let mut explicit: Option<usize> = None;
        while let Some(b) = self.peek() {
            match b {
                b'+' => chomp = Chomp::Keep,
                b'-' => chomp = Chomp::Strip,
                b'1'..=b'9' => explicit = Some((b - b'0') as usize),
                _ => break,
            }
            self.pos += 1;
        }
        self.finish_line();
        let header_end = self.pos;

        let base = parent_indent.max(0) as usize;
        let mut content_indent = explicit.map(|d| if parent_indent < 0 { d } else { base + d });

        let mut lines: Vec<&str> = Vec::new();
        let mut content_end = header_end;
        // p always sits on the '\n' ending the previous line
        let mut p = self.line_end(header_end);
        while p < self.bytes.len() {
            let line_start = p + 1;
            if line_start >= self.bytes.len() {
                break;
            }
            let line_end = self.line_end(line_start);
            let line = self.text[line_start..line_end].trim_end_matches('\r');
            if line.trim().is_empty() {
                lines.push("");
                p = line_end;
                continue;
            }
            let indent = line.len() - line.trim_start_matches(' ').len();
            let required = *content_indent.get_or_insert(indent);
            if indent < required || (indent as isize) <= parent_indent {
                break;
            }
            lines.push(&line[required..]);
            content_end = line_start + line.len();
            p = line_end;
        }

        let last_content = lines.iter().rposition(|l| !l.is_empty());
        let (body_lines, trailing) = match last_content {
            Some(i) => (&lines[..=i], lines.len() - i - 1),
            None => (&lines[..0], lines.len()),
        };
        let terminated = content_end < self.text.len();
        let body = if literal {
            body_lines.join("\n")
        } else {
            fold_lines(body_lines)
        };
        let value = match (chomp, body_lines.is_empty()) {
            (Chomp::Strip, _) => body,
            (Chomp::Clip, true) => String::new(),
            (Chomp::Clip, false) => {
                if terminated {
                    body + "\n"
                } else {
                    body
                }
            }
            (Chomp::Keep, empty) => {
                let mut v = body;
                if !empty && terminated {
                    v.push('\n');
                }
                v.extend(std::iter::repeat_n('\n', trailing));
                v
            }
        };

        self.pos = content_end;
        let end = if last_content.is_some() {
            content_end
        } else {
            header_end
        };
        self.node(start, end, Value::String(value), NodeKind::BlockScalar)
    }

    // ------------------------------------------------------------------
    // Flow collections
    // ------------------------------------------------------------------

    /// Skip whitespace and comments inside a flow collection. Returns `true`
    /// when stopped at the line break before a content line that is not
    /// indented past `flow_limit`.
    fn skip_flow_ws(&mut self) -> bool {
        loop {
            match self.peek() {
                Some(b'\n') => {
                    if self.leaves_flow(self.pos + 1) {
                        return true;
                    }
                    self.pos += 1;
                }
                Some(b' ' | b'\t' | b'\r') => self.pos += 1,
                Some(b'#') => self.skip_to_line_end(),
                _ => return false,
            }
        }
    }

    fn leaves_flow(&self, line_start: usize) -> bool {
        let line = &self.text[line_start..self.line_end(line_start)];
        let content = line.trim_start_matches(' ');
        if content.trim().is_empty() || content.starts_with('#') {
            return false;
        }
        ((line.len() - content.len()) as isize) <= self.flow_limit
    }

    fn parse_flow(&mut self) -> AnnotatedParse {
        let start = self.pos;
        let open = self.bytes[start];
        let (close, is_map) = if open == b'{' {
            (b'}', true)
        } else {
            (b']', false)
        };
        self.pos += 1;

        let mut components: Vec<AnnotatedParse> = Vec::new();
        let mut map = Map::new();
        let mut seen: HashMap<String, Span> = HashMap::new();
        let mut end = None;

        loop {
            if self.skip_flow_ws() {
                break;
            }
            let Some(b) = self.peek() else { break };
            if b == close {
                self.pos += 1;
                end = Some(self.pos);
                break;
            }
            if b == b',' {
                self.pos += 1;
                continue;
            }
            if b == b']' || b == b'}' {
                // mismatched closer; close here
                self.pos += 1;
                break;
            }

            if is_map {
                let key = self.parse_flow_node();
                self.skip_flow_ws();
                let value = if self.peek() == Some(b':') {
                    self.pos += 1;
                    self.skip_flow_ws();
                    match self.peek() {
                        Some(b',' | b'\n') | None => self.empty(self.pos),
                        Some(b) if b == close => self.empty(self.pos),
                        _ => self.parse_flow_node(),
                    }
                } else {
                    self.empty(key.end)
                };
                let name = key_to_string(&key.result);
                if let Some(first) = seen.get(&name) {
                    self.issues.push(ParseIssue::DuplicateKey {
                        key: name.clone(),
                        first: *first,
                        second: key.span(),
                    });
                } else {
                    seen.insert(name.clone(), key.span());
                }
                map.insert(name, value.result.clone());
                components.push(key);
                components.push(value);
            } else {
                let item = self.parse_flow_node();
                self.skip_flow_ws();
                if self.peek() == Some(b':') {
                    // `[a: b]` is a sequence holding a single-pair mapping
                    self.pos += 1;
                    self.skip_flow_ws();
                    let value = match self.peek() {
                        Some(b',' | b'\n') | None => self.empty(self.pos),
                        Some(b) if b == close => self.empty(self.pos),
                        _ => self.parse_flow_node(),
                    };
                    let mut pair = Map::new();
                    pair.insert(key_to_string(&item.result), value.result.clone());
                    let (s, e) = (item.start, value.end.max(item.end));
                    components.push(
                        self.node(s, e, Value::Object(pair), NodeKind::FlowMapping)
                            .with_components(vec![item, value]),
                    );
                } else {
                    components.push(item);
                }
            }

            if self.skip_flow_ws() {
                continue;
            }
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {}
                None => {}
                Some(_) => {
                    let junk = self.pos;
                    self.pos += self.text[junk..].chars().next().map_or(1, char::len_utf8);
                    while let Some(b) = self.peek() {
                        if is_space(b) || b == b'\n' || b == b',' || b == close {
                            break;
                        }
                        self.pos += 1;
                    }
                    self.issues.push(ParseIssue::TrailingContent {
                        span: Span::new(junk, self.pos),
                    });
                }
            }
        }

        let end = match end {
            Some(e) => e,
            None => {
                let e = components.iter().map(|c| c.end).max().unwrap_or(start + 1);
                self.issues.push(ParseIssue::Unclosed {
                    span: Span::new(start, e),
                    delimiter: open as char,
                });
                e
            }
        };
        let (result, kind) = if is_map {
            (Value::Object(map), NodeKind::FlowMapping)
        } else {
            (
                Value::Array(components.iter().map(|c| c.result.clone()).collect()),
                NodeKind::FlowSequence,
            )
        };
        self.node(start, end, result, kind).with_components(components)
    }

    fn parse_flow_node(&mut self) -> AnnotatedParse {
        match self.peek() {
            Some(b'[') | Some(b'{') => self.parse_flow(),
            Some(b'"') | Some(b'\'') => self.parse_quoted(),
            Some(b'*') => self.parse_alias(),
            Some(b'!') | Some(b'&') => {
                let start = self.pos;
                let mut tag = None;
                let mut anchor = None;
                while let Some(b @ (b'!' | b'&')) = self.peek() {
                    let token_start = self.pos;
                    while !self.ws_or_end(self.pos) && !self.peek().is_some_and(is_flow_indicator) {
                        self.pos += 1;
                    }
                    let token = &self.text[token_start..self.pos];
                    if b == b'!' {
                        tag = Some(token.to_string());
                    } else {
                        anchor = Some(token[1..].to_string());
                    }
                    self.skip_flow_ws();
                }
                let mut node = self.parse_flow_node();
                if let Some(tag) = tag {
                    let raw = node.text().to_string();
                    node.result = apply_tag(&tag, node.result, &raw);
                    node.tag = Some(tag);
                    node.start = start;
                    node.end = node.end.max(start);
                }
                if let Some(name) = anchor {
                    self.anchors.insert(name, node.result.clone());
                }
                node
            }
            _ => self.parse_flow_plain(),
        }
    }

    fn parse_flow_plain(&mut self) -> AnnotatedParse {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_flow_indicator(b) || b == b'\n' || b == b'\r' {
                break;
            }
            if b == b':' {
                let next = self.byte_at(self.pos + 1);
                if next.is_none_or(|n| {
                    is_space(n) || n == b'\n' || n == b'\r' || is_flow_indicator(n)
                }) {
                    break;
                }
            }
            if b == b'#' && self.pos > start && is_space(self.bytes[self.pos - 1]) {
                break;
            }
            self.pos += 1;
        }
        let raw = self.text[start..self.pos].trim_end();
        let end = start + raw.len();
        self.pos = end;
        if raw.is_empty() {
            return self.empty(start);
        }
        self.node(start, end, resolve_plain(raw), NodeKind::PlainScalar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomp {
    Clip,
    Strip,
    Keep,
}

/// Fold the lines of a `>` block scalar.
///
/// A single break between two ordinary lines becomes a space; `n` empty
/// lines become `n` newlines; breaks around more-indented lines are kept.
fn fold_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut first = true;
    let mut prev_more = false;
    let mut breaks = 0;
    for line in lines {
        if line.is_empty() {
            breaks += 1;
            continue;
        }
        let more = line.starts_with(' ') || line.starts_with('\t');
        if first {
            out.extend(std::iter::repeat_n('\n', breaks));
        } else if breaks == 0 {
            out.push(if more || prev_more { '\n' } else { ' ' });
        } else {
            if more || prev_more {
                out.push('\n');
            }
            out.extend(std::iter::repeat_n('\n', breaks));
        }
        out.push_str(line);
        first = false;
        prev_more = more;
        breaks = 0;
    }
    out
}

/// Decode the inside of a quoted scalar: escapes (double quotes only),
/// doubled single quotes, and line folding.
fn decode_quoted(raw: &str, quote: u8) -> String {
    let mut out = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if quote == b'\'' => {
                // doubled quote
                chars.next();
                out.push('\'');
            }
            '\\' if quote == b'"' => {
                let Some(e) = chars.next() else {
                    out.push('\\');
                    break;
                };
                match e {
                    '0' => out.push('\0'),
                    'a' => out.push('\u{07}'),
                    'b' => out.push('\u{08}'),
                    't' | '\t' => out.push('\t'),
                    'n' => out.push('\n'),
                    'v' => out.push('\u{0b}'),
                    'f' => out.push('\u{0c}'),
                    'r' => out.push('\r'),
                    'e' => out.push('\u{1b}'),
                    ' ' => out.push(' '),
                    '"' => out.push('"'),
                    '/' => out.push('/'),
                    '\\' => out.push('\\'),
                    'N' => out.push('\u{85}'),
                    '_' => out.push('\u{a0}'),
                    'L' => out.push('\u{2028}'),
                    'P' => out.push('\u{2029}'),
                    'x' | 'u' | 'U' => {
                        let width = match e {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let hex: String = (0..width).filter_map(|_| chars.next()).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(ch) => out.push(ch),
                            None => {
                                out.push('\\');
                                out.push(e);
                                out.push_str(&hex);
                            }
                        }
                    }
                    '\r' | '\n' => {
                        // escaped line break joins lines without a space
                        if e == '\r' && chars.peek() == Some(&'\n') {
                            chars.next();
                        }
                        while matches!(chars.peek(), Some(' ' | '\t')) {
                            chars.next();
                        }
                    }
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                while out.ends_with(' ') || out.ends_with('\t') {
                    out.pop();
                }
                let mut breaks = 1;
                loop {
                    while matches!(chars.peek(), Some(' ' | '\t')) {
                        chars.next();
                    }
                    match chars.peek() {
                        Some('\n') => {
                            chars.next();
                            breaks += 1;
                        }
                        Some('\r') => {
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if breaks == 1 {
                    out.push(' ');
                } else {
                    out.extend(std::iter::repeat_n('\n', breaks - 1));
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_str(s: &str) -> AnnotatedParse {
        parse_tree(&MappedText::from_literal(s, None))
    }

    // ========================================================================
    // Scalars
    // ========================================================================

    #[test]
    fn test_plain_scalar_root() {
        let root = parse_str("hello world");
        assert_eq!(root.kind, NodeKind::PlainScalar);
        assert_eq!(root.result, json!("hello world"));
        assert_eq!((root.start, root.end), (0, 11));
    }

    #[test]
    fn test_plain_multiline_folding() {
        let root = parse_str("a: first\n  second\n\n  third\nb: 1\n");
        assert_eq!(root.result, json!({"a": "first second\nthird", "b": 1}));
    }

    #[test]
    fn test_quoted_scalars() {
        let root = parse_str("a: 'it''s'\nb: \"tab\\there\"\nc: \"x\\\n  y\"\n");
        assert_eq!(root.result["a"], json!("it's"));
        assert_eq!(root.result["b"], json!("tab\there"));
        assert_eq!(root.result["c"], json!("xy"));
        let b = root.value_node("b").unwrap();
        assert_eq!(b.kind, NodeKind::DoubleQuoteScalar);
        assert_eq!(b.text(), "\"tab\\there\"");
    }

    #[test]
    fn test_quoted_folding() {
        let root = parse_str("a: \"one\n  two\n\n  three\"\n");
        assert_eq!(root.result["a"], json!("one two\nthree"));
    }

    #[test]
    fn test_literal_block_scalar() {
        let root = parse_str("key: |\n  a\n  b\n");
        assert_eq!(root.result, json!({"key": "a\nb\n"}));
        let v = root.value_node("key").unwrap();
        assert_eq!(v.kind, NodeKind::BlockScalar);
        assert_eq!(v.text(), "|\n  a\n  b");
    }

    #[test]
    fn test_block_scalar_chomping() {
        let root = parse_str("s: |-\n  a\n\nk: |+\n  a\n\nf: >\n  a\n  b\n\n  c\nz: 1\n");
        assert_eq!(root.result["s"], json!("a"));
        assert_eq!(root.result["k"], json!("a\n\n"));
        assert_eq!(root.result["f"], json!("a b\nc\n"));
        assert_eq!(root.result["z"], json!(1));
    }

    #[test]
    fn test_keep_chomping_at_end_of_input() {
        assert_eq!(parse_str("|+\n  a\n  b\n\n").result, json!("a\nb\n\n"));
        assert_eq!(parse_str("k: |+\n  a\n").result["k"], json!("a\n"));
    }

    #[test]
    fn test_block_scalar_explicit_indent() {
        let root = parse_str("a: |2\n    indented\n  x\n");
        assert_eq!(root.result["a"], json!("  indented\nx\n"));
    }

    #[test]
    fn test_block_scalar_without_trailing_newline() {
        let root = parse_str("a: |\n  x");
        assert_eq!(root.result["a"], json!("x"));
    }

    // ========================================================================
    // Collections
    // ========================================================================

    #[test]
    fn test_nested_mapping_spans() {
        let src = "format:\n  html:\n    toc: true\ntitle: x\n";
        let root = parse_str(src);
        assert_eq!(root.kind, NodeKind::BlockMapping);
        assert_eq!(root.result, json!({"format": {"html": {"toc": true}}, "title": "x"}));
        let format = root.value_node("format").unwrap();
        assert_eq!(format.kind, NodeKind::BlockMapping);
        assert_eq!(&src[format.start..format.end], "html:\n    toc: true");
        assert_eq!(root.end, src.trim_end().len());
    }

    #[test]
    fn test_sequence_as_mapping_value_at_same_indent() {
        let root = parse_str("items:\n- a\n- b\nnext: 1\n");
        assert_eq!(root.result, json!({"items": ["a", "b"], "next": 1}));
    }

    #[test]
    fn test_compact_sequence_of_mappings() {
        let root = parse_str("- name: a\n  value: 1\n- name: b\n");
        assert_eq!(root.kind, NodeKind::BlockSequence);
        assert_eq!(root.result, json!([{"name": "a", "value": 1}, {"name": "b"}]));
        assert_eq!(root.components.len(), 2);
    }

    #[test]
    fn test_nested_sequences() {
        let root = parse_str("- - 1\n  - 2\n- 3\n");
        assert_eq!(root.result, json!([[1, 2], 3]));
    }

    #[test]
    fn test_flow_collections() {
        let root = parse_str("a: [1, two, {b: c}]\nd: {e: [f], g: }\n");
        assert_eq!(root.result, json!({"a": [1, "two", {"b": "c"}], "d": {"e": ["f"], "g": null}}));
        let a = root.value_node("a").unwrap();
        assert_eq!(a.kind, NodeKind::FlowSequence);
        assert_eq!(a.text(), "[1, two, {b: c}]");
    }

    #[test]
    fn test_flow_across_lines() {
        let root = parse_str("a: [1,\n  2, # two\n  3]\n");
        assert_eq!(root.result, json!({"a": [1, 2, 3]}));
    }

    #[test]
    fn test_empty_value_is_zero_width_after_colon() {
        let root = parse_str("a:\nb: 1\n");
        let a = root.value_node("a").unwrap();
        assert_eq!(a.kind, NodeKind::Empty);
        assert_eq!((a.start, a.end), (2, 2));
        assert_eq!(root.result, json!({"a": null, "b": 1}));
    }

    #[test]
    fn test_comments_and_document_markers() {
        let root = parse_str("# leading\n%YAML 1.2\n---\na: 1 # trailing\n# between\nb: 2\n...\n");
        assert_eq!(root.result, json!({"a": 1, "b": 2}));
        assert!(root.issues.is_empty());
        assert!((coverage(&root) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tags_and_anchors() {
        let root = parse_str("a: !expr x + 1\nb: !!str 12\nc: &base 5\nd: *base\n");
        assert_eq!(root.result["a"], json!({"tag": "!expr", "value": "x + 1"}));
        assert_eq!(root.value_node("a").unwrap().tag.as_deref(), Some("!expr"));
        assert_eq!(root.result["b"], json!("12"));
        assert_eq!(root.result["d"], json!(5));
        assert_eq!(root.value_node("d").unwrap().kind, NodeKind::Alias);
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    #[test]
    fn test_duplicate_keys_last_wins_and_reported() {
        let root = parse_str("a: 1\nb: 2\na: 3\n");
        assert_eq!(root.result, json!({"a": 3, "b": 2}));
        assert_eq!(root.components.len(), 6);
        let dups: Vec<_> = root.duplicate_keys().collect();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].span(), Span::new(10, 11));
    }

    #[test]
    fn test_error_line_becomes_error_pair() {
        let root = parse_str("title: a\nthis is garbage\nauthor: b\n");
        assert_eq!(root.kind, NodeKind::BlockMapping);
        assert_eq!(root.components.len(), 6);
        let err = &root.components[2];
        assert_eq!(err.kind, NodeKind::Error);
        assert_eq!(err.result, json!("this is garbage"));
        assert_eq!(root.components[3].kind, NodeKind::Empty);
        assert_eq!(root.result["author"], json!("b"));
        assert!(matches!(root.issues[0], ParseIssue::UnexpectedLine { .. }));
    }

    #[test]
    fn test_unclosed_flow_is_closed_at_end() {
        let root = parse_str("a: [1, 2\n");
        assert_eq!(root.result, json!({"a": [1, 2]}));
        assert!(root.issues.iter().any(|i| matches!(i, ParseIssue::Unclosed { delimiter: '[', .. })));
    }

    #[test]
    fn test_unclosed_flow_ends_at_dedent() {
        let root = parse_str("a: [1, 2\nb: 3\n");
        assert_eq!(root.result, json!({"a": [1, 2], "b": 3}));
        assert_eq!(root.value_node("a").unwrap().text(), "[1, 2");
        assert!(root.issues.iter().any(|i| matches!(i, ParseIssue::Unclosed { delimiter: '[', .. })));

        let root = parse_str("top:\n  m: {x: 1,\n  n: 2\n");
        assert_eq!(root.result, json!({"top": {"m": {"x": 1}, "n": 2}}));
    }

    #[test]
    fn test_unclosed_quote_stops_at_line_end() {
        let root = parse_str("a: \"oops\nb: 2\n");
        assert_eq!(root.result["b"], json!(2));
        assert!(root.issues.iter().any(|i| matches!(i, ParseIssue::Unclosed { delimiter: '"', .. })));
    }

    #[test]
    fn test_empty_document() {
        let root = parse_str("# nothing here\n");
        assert_eq!(root.kind, NodeKind::Empty);
        assert_eq!(root.result, Value::Null);
        assert!((coverage(&root) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_second_document_lowers_coverage() {
        let text = MappedText::from_literal("a: 1\n---\nbbbbbbbbbb: 2\n", None);
        let root = parse_tree(&text);
        assert!(coverage(&root) < 0.95);
        assert!(parse(&text, 0.95).is_none());
    }

    #[test]
    fn test_crlf_input() {
        let root = parse_str("a: 1\r\nb:\r\n  - x\r\n");
        assert_eq!(root.result, json!({"a": 1, "b": ["x"]}));
    }

    #[test]
    fn test_fold_lines() {
        assert_eq!(fold_lines(&["a", "b"]), "a b");
        assert_eq!(fold_lines(&["a", "", "b"]), "a\nb");
        assert_eq!(fold_lines(&["a", "  b", "c"]), "a\n  b\nc");
    }
}
