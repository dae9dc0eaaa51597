//! Position-mapped strings
//!
//! A [`MappedText`] is an immutable string paired with a function from its own
//! byte offsets back to offsets in a root [`SourceText`]. Every
//! transformation (substring, concatenation, trimming, regex replacement)
//! returns a new value whose mapping composes with its parent's, so an error
//! found deep inside a derived string can always be reported at its place
//! in the file the user wrote.

use crate::source::{LineCol, SourceText};
use crate::span::{OriginalOffset, SourceSpan, Span};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// A string that remembers where each of its bytes came from.
///
/// Cloning is cheap: both the value and the mapping are reference counted.
#[derive(Clone)]
pub struct MappedText {
    value: Arc<str>,
    mapping: Arc<Mapping>,
}

enum Mapping {
    /// The text is a root source, unchanged.
    Original(Arc<SourceText>),
    /// The text is `parent[offset..offset + len]`.
    Substring { parent: MappedText, offset: usize },
    /// The text is the concatenation of its parts.
    Concat { parts: Vec<ConcatPart> },
}

struct ConcatPart {
    start: usize,
    len: usize,
    /// `None` for synthetic text, which has no position in any source.
    text: Option<MappedText>,
}

/// A piece handed to [`MappedText::concat`].
#[derive(Debug, Clone)]
pub enum TextPart {
    Mapped(MappedText),
    Synthetic(String),
}

impl From<MappedText> for TextPart {
    fn from(text: MappedText) -> Self {
        TextPart::Mapped(text)
    }
}

impl From<&MappedText> for TextPart {
    fn from(text: &MappedText) -> Self {
        TextPart::Mapped(text.clone())
    }
}

impl From<String> for TextPart {
    fn from(text: String) -> Self {
        TextPart::Synthetic(text)
    }
}

impl From<&str> for TextPart {
    fn from(text: &str) -> Self {
        TextPart::Synthetic(text.to_string())
    }
}

/// A piece handed to [`MappedText::from_pieces`]: either a range of the
/// parent text or new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Range(Span),
    Text(String),
}

impl MappedText {
    /// Wrap a literal string as a root source. Every offset maps to itself.
    pub fn from_literal(value: impl Into<String>, file_name: Option<&str>) -> Self {
        let source = Arc::new(SourceText::new(value, file_name.map(str::to_string)));
        MappedText {
            value: Arc::from(source.value()),
            mapping: Arc::new(Mapping::Original(source)),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The root source this text was derived from.
    ///
    /// For a concatenation this is the root of the first mapped part.
    pub fn root(&self) -> Option<Arc<SourceText>> {
        match self.mapping.as_ref() {
            Mapping::Original(source) => Some(source.clone()),
            Mapping::Substring { parent, .. } => parent.root(),
            Mapping::Concat { parts } => parts
                .iter()
                .filter_map(|p| p.text.as_ref())
                .find_map(|t| t.root()),
        }
    }

    pub fn file_name(&self) -> Option<String> {
        self.root().and_then(|r| r.file_name().map(str::to_string))
    }

    /// Map a local offset to its position in the root source.
    ///
    /// Offsets inside synthetic text, inside an empty part, or past the end of
    /// the text have no original. The end offset itself maps when the text
    /// ends with source-backed content.
    pub fn original_of(&self, offset: usize) -> Option<OriginalOffset> {
        if offset > self.len() {
            return None;
        }
        match self.mapping.as_ref() {
            Mapping::Original(source) => Some(OriginalOffset {
                source: source.clone(),
                offset,
            }),
            Mapping::Substring { parent, offset: base } => parent.original_of(base + offset),
            Mapping::Concat { parts } => {
                if offset == self.len() {
                    let last = parts.last()?;
                    let text = last.text.as_ref()?;
                    return text.original_of(text.len());
                }
                let idx = glb(parts, offset)?;
                let part = &parts[idx];
                let local = offset - part.start;
                if local >= part.len {
                    return None;
                }
                part.text.as_ref()?.original_of(local)
            }
        }
    }

    /// Like [`MappedText::original_of`], but never gives up while any
    /// source-backed text exists.
    ///
    /// The offset is clamped into range. An offset that lands in synthetic
    /// text resolves to the end of the nearest source-backed part on its
    /// left, or failing that, the start of the nearest one on its right.
    pub fn closest_original(&self, offset: usize) -> Option<OriginalOffset> {
        let offset = offset.min(self.len());
        match self.mapping.as_ref() {
            Mapping::Original(source) => Some(OriginalOffset {
                source: source.clone(),
                offset,
            }),
            Mapping::Substring { parent, offset: base } => parent.closest_original(base + offset),
            Mapping::Concat { parts } => {
                let idx = glb(parts, offset)?;
                let part = &parts[idx];
                if let Some(text) = &part.text {
                    let local = offset - part.start;
                    if local < part.len || (offset == self.len() && idx + 1 == parts.len()) {
                        return text.closest_original(local);
                    }
                }
                for left in parts[..=idx].iter().rev() {
                    if let Some(text) = &left.text {
                        return text.closest_original(text.len());
                    }
                }
                parts[idx + 1..]
                    .iter()
                    .find_map(|right| right.text.as_ref())
                    .and_then(|text| text.closest_original(0))
            }
        }
    }

    /// 0-based line and column in the root source of a local offset, using
    /// the closest mapped position.
    pub fn offset_to_line_col(&self, offset: usize) -> Option<LineCol> {
        self.closest_original(offset)?.line_col()
    }

    /// Resolve a local span to a span of the root source.
    pub fn source_span(&self, span: Span) -> Option<SourceSpan> {
        let start = self.closest_original(span.start)?;
        let end = self
            .closest_original(span.end)
            .filter(|end| Arc::ptr_eq(&end.source, &start.source) && end.offset >= start.offset)
            .map_or(start.offset, |end| end.offset);
        Some(SourceSpan {
            source: start.source,
            start: start.offset,
            end,
        })
    }

    /// The text covering `[start, end)`.
    ///
    /// Bounds are clamped to the text and moved left onto character
    /// boundaries. The result maps each offset `i` to `original_of(start + i)`.
    pub fn substring(&self, start: usize, end: usize) -> MappedText {
        let end = floor_char_boundary(&self.value, end.min(self.len()));
        let start = floor_char_boundary(&self.value, start.min(end));
        if start == 0 && end == self.len() {
            return self.clone();
        }
        // collapse substring-of-substring into a single hop
        let (parent, base) = match self.mapping.as_ref() {
            Mapping::Substring { parent, offset } => (parent.clone(), offset + start),
            _ => (self.clone(), start),
        };
        MappedText {
            value: Arc::from(&self.value[start..end]),
            mapping: Arc::new(Mapping::Substring {
                parent,
                offset: base,
            }),
        }
    }

    /// Concatenate mapped and synthetic parts.
    ///
    /// Offsets that fall in a mapped part resolve through that part; offsets
    /// that fall in synthetic text do not resolve. Empty parts are kept so
    /// that [`MappedText::closest_original`] can still anchor on them.
    pub fn concat<I, P>(parts: I) -> MappedText
    where
        I: IntoIterator<Item = P>,
        P: Into<TextPart>,
    {
        let mut value = String::new();
        let mut table = Vec::new();
        for part in parts {
            let start = value.len();
            let text = match part.into() {
                TextPart::Mapped(text) => {
                    value.push_str(text.value());
                    Some(text)
                }
                TextPart::Synthetic(s) => {
                    value.push_str(&s);
                    None
                }
            };
            table.push(ConcatPart {
                start,
                len: value.len() - start,
                text,
            });
        }
        MappedText {
            value: Arc::from(value),
            mapping: Arc::new(Mapping::Concat { parts: table }),
        }
    }

    /// Build a text out of ranges of `self` and new text.
    pub fn from_pieces(&self, pieces: &[Piece]) -> MappedText {
        MappedText::concat(pieces.iter().map(|piece| match piece {
            Piece::Range(span) => TextPart::Mapped(self.substring(span.start, span.end)),
            Piece::Text(text) => TextPart::Synthetic(text.clone()),
        }))
    }

    pub fn trim(&self) -> MappedText {
        self.trim_start().trim_end()
    }

    pub fn trim_start(&self) -> MappedText {
        let start = self.len() - self.value.trim_start().len();
        self.substring(start, self.len())
    }

    pub fn trim_end(&self) -> MappedText {
        self.substring(0, self.value.trim_end().len())
    }

    /// Split on `\n`, with the same segments as `str::split`.
    ///
    /// With `keep_newlines` each line keeps its terminator; otherwise the
    /// terminator (including a preceding `\r`) is dropped.
    pub fn split_lines(&self, keep_newlines: bool) -> Vec<MappedText> {
        let mut lines = Vec::new();
        let mut start = 0;
        for (idx, _) in self.value.match_indices('\n') {
            let end = if keep_newlines {
                idx + 1
            } else if idx > start && self.value.as_bytes()[idx - 1] == b'\r' {
                idx - 1
            } else {
                idx
            };
            lines.push(self.substring(start, end));
            start = idx + 1;
        }
        lines.push(self.substring(start, self.len()));
        lines
    }

    /// Lines without their terminators.
    pub fn lines(&self) -> Vec<MappedText> {
        self.split_lines(false)
    }

    /// Replace the first match of `re`; `$1`/`${name}` in `replacement` expand
    /// to capture groups. The replacement itself is synthetic.
    pub fn replace(&self, re: &Regex, replacement: &str) -> MappedText {
        self.replace_n(re, replacement, Some(1))
    }

    /// Replace every non-overlapping match of `re`.
    pub fn replace_all(&self, re: &Regex, replacement: &str) -> MappedText {
        self.replace_n(re, replacement, None)
    }

    fn replace_n(&self, re: &Regex, replacement: &str, limit: Option<usize>) -> MappedText {
        let mut parts: Vec<TextPart> = Vec::new();
        let mut last = 0;
        for caps in re
            .captures_iter(&self.value)
            .take(limit.unwrap_or(usize::MAX))
        {
            let Some(m) = caps.get(0) else { continue };
            parts.push(self.substring(last, m.start()).into());
            let mut expanded = String::new();
            caps.expand(replacement, &mut expanded);
            parts.push(TextPart::Synthetic(expanded));
            last = m.end();
        }
        if parts.is_empty() {
            return self.clone();
        }
        parts.push(self.substring(last, self.len()).into());
        MappedText::concat(parts)
    }

    /// Remove the first match of `re`, keeping everything else mapped.
    pub fn skip_regex(&self, re: &Regex) -> MappedText {
        match re.find(&self.value) {
            Some(m) => MappedText::concat([
                self.substring(0, m.start()),
                self.substring(m.end(), self.len()),
            ]),
            None => self.clone(),
        }
    }

    /// Remove every match of `re`, keeping everything else mapped.
    pub fn skip_regex_all(&self, re: &Regex) -> MappedText {
        let mut kept = Vec::new();
        let mut last = 0;
        for m in re.find_iter(&self.value) {
            kept.push(self.substring(last, m.start()));
            last = m.end();
        }
        if kept.is_empty() {
            return self.clone();
        }
        kept.push(self.substring(last, self.len()));
        MappedText::concat(kept)
    }

    /// Turn every `\r\n` into `\n`. The surviving characters stay mapped.
    pub fn normalize_newlines(&self) -> MappedText {
        if !self.value.contains("\r\n") {
            return self.clone();
        }
        let mut kept = Vec::new();
        let mut start = 0;
        for (idx, _) in self.value.match_indices("\r\n") {
            kept.push(self.substring(start, idx));
            start = idx + 1;
        }
        kept.push(self.substring(start, self.len()));
        MappedText::concat(kept)
    }
}

/// Greatest part whose start is `<= offset`.
fn glb(parts: &[ConcatPart], offset: usize) -> Option<usize> {
    parts.partition_point(|p| p.start <= offset).checked_sub(1)
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

impl fmt::Debug for MappedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedText")
            .field("value", &self.value)
            .field("file_name", &self.file_name())
            .finish()
    }
}

impl fmt::Display for MappedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl PartialEq for MappedText {
    /// Equality of values; mappings are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl AsRef<str> for MappedText {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_of(text: &MappedText, offset: usize) -> Option<usize> {
        text.original_of(offset).map(|o| o.offset)
    }

    #[test]
    fn test_literal_maps_identity() {
        let text = MappedText::from_literal("hello", Some("a.yml"));
        assert_eq!(offset_of(&text, 0), Some(0));
        assert_eq!(offset_of(&text, 4), Some(4));
        assert_eq!(offset_of(&text, 5), Some(5));
        assert_eq!(offset_of(&text, 6), None);
        assert_eq!(text.file_name().as_deref(), Some("a.yml"));
    }

    #[test]
    fn test_substring_shifts() {
        let text = MappedText::from_literal("hello world", None);
        let sub = text.substring(6, 11);
        assert_eq!(sub.value(), "world");
        assert_eq!(offset_of(&sub, 0), Some(6));
        assert_eq!(offset_of(&sub, 4), Some(10));
    }

    #[test]
    fn test_nested_substring_composes() {
        let text = MappedText::from_literal("0123456789", None);
        let a = text.substring(2, 9);
        let b = a.substring(3, 6);
        assert_eq!(b.value(), "567");
        assert_eq!(offset_of(&b, 1), Some(6));
    }

    #[test]
    fn test_substring_clamps() {
        let text = MappedText::from_literal("abc", None);
        assert_eq!(text.substring(1, 99).value(), "bc");
        assert_eq!(text.substring(5, 2).value(), "");
    }

    #[test]
    fn test_concat_maps_each_part() {
        let text = MappedText::from_literal("abc", None);
        let joined = MappedText::concat([
            TextPart::from(text.substring(0, 1)),
            TextPart::from("X"),
            TextPart::from(text.substring(2, 3)),
        ]);
        assert_eq!(joined.value(), "aXc");
        assert_eq!(offset_of(&joined, 0), Some(0));
        assert_eq!(offset_of(&joined, 1), None);
        assert_eq!(offset_of(&joined, 2), Some(2));
    }

    #[test]
    fn test_concat_skips_empty_parts() {
        let text = MappedText::from_literal("abcdef", None);
        let joined = MappedText::concat([
            text.substring(0, 2),
            text.substring(3, 3),
            text.substring(4, 6),
        ]);
        assert_eq!(joined.value(), "abef");
        assert_eq!(offset_of(&joined, 2), Some(4));
    }

    #[test]
    fn test_closest_walks_left_from_synthetic() {
        let text = MappedText::from_literal("ab", None);
        let joined = MappedText::concat([
            TextPart::from(text.clone()),
            TextPart::from("\n\n"),
        ]);
        assert_eq!(offset_of(&joined, 3), None);
        assert_eq!(joined.closest_original(3).map(|o| o.offset), Some(2));
    }

    #[test]
    fn test_closest_walks_right_without_left_neighbour() {
        let text = MappedText::from_literal("xyz", None);
        let joined = MappedText::concat([
            TextPart::from(">>"),
            TextPart::from(text.substring(1, 3)),
        ]);
        assert_eq!(joined.closest_original(0).map(|o| o.offset), Some(1));
    }

    #[test]
    fn test_closest_of_fully_synthetic_is_none() {
        let joined = MappedText::concat(["only", "synthetic"]);
        assert!(joined.closest_original(2).is_none());
        assert!(joined.offset_to_line_col(2).is_none());
    }

    #[test]
    fn test_trim_preserves_mapping() {
        let text = MappedText::from_literal("  key  ", None);
        let trimmed = text.trim();
        assert_eq!(trimmed.value(), "key");
        assert_eq!(offset_of(&trimmed, 0), Some(2));
        assert_eq!(text.trim_start().value(), "key  ");
        assert_eq!(text.trim_end().value(), "  key");
    }

    #[test]
    fn test_split_lines() {
        let text = MappedText::from_literal("a\r\nbb\nc", None);
        let lines = text.split_lines(false);
        let values: Vec<&str> = lines.iter().map(|l| l.value()).collect();
        assert_eq!(values, vec!["a", "bb", "c"]);
        assert_eq!(offset_of(&lines[1], 0), Some(3));

        let kept = text.split_lines(true);
        assert_eq!(kept[0].value(), "a\r\n");
        assert_eq!(kept[1].value(), "bb\n");
    }

    #[test]
    fn test_split_lines_trailing_newline() {
        let text = MappedText::from_literal("a\n", None);
        let lines = text.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].value(), "");
    }

    #[test]
    fn test_replace_first_and_all() {
        let text = MappedText::from_literal("a-b-c", None);
        let re = Regex::new("-").unwrap();
        let once = text.replace(&re, "+");
        assert_eq!(once.value(), "a+b-c");
        assert_eq!(offset_of(&once, 1), None);
        assert_eq!(offset_of(&once, 3), Some(3));

        let all = text.replace_all(&re, "__");
        assert_eq!(all.value(), "a__b__c");
        assert_eq!(offset_of(&all, 6), Some(4));
    }

    #[test]
    fn test_replace_expands_captures() {
        let text = MappedText::from_literal("key=value", None);
        let re = Regex::new(r"(\w+)=(\w+)").unwrap();
        let replaced = text.replace(&re, "$1: $2");
        assert_eq!(replaced.value(), "key: value");
    }

    #[test]
    fn test_replace_without_match_is_identity() {
        let text = MappedText::from_literal("abc", None);
        let re = Regex::new("z").unwrap();
        assert_eq!(offset_of(&text.replace_all(&re, "y"), 1), Some(1));
    }

    #[test]
    fn test_skip_regex() {
        let text = MappedText::from_literal("a # c\nb # d", None);
        let re = Regex::new(r" #[^\n]*").unwrap();
        let first = text.skip_regex(&re);
        assert_eq!(first.value(), "a\nb # d");
        let all = text.skip_regex_all(&re);
        assert_eq!(all.value(), "a\nb");
        assert_eq!(offset_of(&all, 2), Some(6));
    }

    #[test]
    fn test_normalize_newlines() {
        let text = MappedText::from_literal("a\r\nb\r\n", None);
        let normalized = text.normalize_newlines();
        assert_eq!(normalized.value(), "a\nb\n");
        assert_eq!(offset_of(&normalized, 1), Some(2));
        assert_eq!(offset_of(&normalized, 2), Some(3));
    }

    #[test]
    fn test_from_pieces() {
        let text = MappedText::from_literal("hello world", None);
        let pieces = [
            Piece::Range(Span::new(6, 11)),
            Piece::Text(", ".into()),
            Piece::Range(Span::new(0, 5)),
        ];
        let out = text.from_pieces(&pieces);
        assert_eq!(out.value(), "world, hello");
        assert_eq!(offset_of(&out, 7), Some(0));
        assert_eq!(offset_of(&out, 5), None);
    }

    #[test]
    fn test_offset_to_line_col_through_substring() {
        let text = MappedText::from_literal("a: 1\nb: two\n", None);
        let value = text.substring(8, 11);
        assert_eq!(value.value(), "two");
        assert_eq!(value.offset_to_line_col(1), Some(LineCol::new(1, 4)));
    }

    #[test]
    fn test_source_span() {
        let text = MappedText::from_literal("a: 1\nb: two\n", Some("f.yml"));
        let sub = text.substring(5, 11);
        let span = sub.source_span(Span::new(3, 6)).unwrap();
        assert_eq!((span.start, span.end), (8, 11));
        assert_eq!(span.text(), "two");
        assert_eq!(span.file_name(), Some("f.yml"));
    }
}
