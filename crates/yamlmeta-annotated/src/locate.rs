//! Cursor and path lookups over annotated trees.

use crate::error::NavigationError;
use crate::node::{AnnotatedParse, PathSegment};

/// Whether a cursor sits on a mapping key or on a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Key,
    Value,
}

/// Result of [`locate_cursor`].
#[derive(Debug, Clone)]
pub struct CursorLocation<'a> {
    /// Keys and indices from the root to the innermost node.
    pub path: Vec<PathSegment>,
    /// `None` when the cursor is inside a `<<EMPTY>>` node or between
    /// mapping pairs.
    pub kind: Option<CursorKind>,
    pub node: Option<&'a AnnotatedParse>,
    /// The cursor fell between the pairs of a mapping, or past the items of
    /// a sequence.
    pub with_error: bool,
}

fn segment_of(key: &AnnotatedParse) -> PathSegment {
    PathSegment::Key(key.key_string())
}

/// Find the path to the innermost node containing byte `position`.
///
/// Node ends are inclusive: recovered trees leave gaps at the edges of
/// incomplete objects, and a cursor there should land on the adjacent node.
pub fn locate_cursor(annotation: &AnnotatedParse, position: usize) -> CursorLocation<'_> {
    let mut location = CursorLocation {
        path: Vec::new(),
        kind: None,
        node: None,
        with_error: false,
    };
    let contains = |n: &AnnotatedParse| n.start <= position && position <= n.end;

    let mut node = annotation;
    loop {
        if node.is_mapping() {
            let mut next = None;
            for (key, value) in node.pairs() {
                if contains(key) {
                    location.path.push(segment_of(key));
                    location.node = Some(key);
                    location.kind = Some(CursorKind::Key);
                    return location;
                }
                if contains(value) {
                    location.path.push(segment_of(key));
                    location.node = Some(value);
                    next = Some(value);
                    break;
                }
            }
            match next {
                Some(value) => node = value,
                None => {
                    location.with_error = true;
                    return location;
                }
            }
        } else if node.is_sequence() {
            let mut next = None;
            for (i, item) in node.components.iter().enumerate() {
                if contains(item) {
                    location.path.push(PathSegment::Index(i));
                    location.node = Some(item);
                    next = Some(item);
                    break;
                }
                if item.start > position {
                    // between items: stay on the previous one
                    if i > 0 {
                        location.path.push(PathSegment::Index(i - 1));
                    }
                    return location;
                }
            }
            match next {
                Some(item) => node = item,
                None => {
                    return CursorLocation {
                        path: Vec::new(),
                        kind: None,
                        node: None,
                        with_error: true,
                    };
                }
            }
        } else {
            if node.kind != crate::node::NodeKind::Empty {
                location.kind = Some(CursorKind::Value);
            }
            return location;
        }
    }
}

fn key_matches(key: &AnnotatedParse, segment: &PathSegment) -> bool {
    match segment {
        PathSegment::Key(k) => key.key_string() == *k,
        PathSegment::Index(i) => key.key_string() == i.to_string(),
    }
}

/// Follow `path` as far as it goes and return the node reached.
///
/// Mapping keys are searched last to first so that duplicated keys resolve
/// to the occurrence that counts. A segment that cannot be followed stops
/// the walk at the current node. With `return_key`, the final mapping step
/// returns the key node instead of its value.
pub fn navigate<'a>(
    path: &[PathSegment],
    annotation: &'a AnnotatedParse,
    return_key: bool,
) -> &'a AnnotatedParse {
    let mut node = annotation;
    for (depth, segment) in path.iter().enumerate() {
        let last = depth + 1 == path.len();
        if node.is_mapping() {
            let found = node
                .components
                .chunks_exact(2)
                .rev()
                .find(|pair| key_matches(&pair[0], segment));
            match found {
                Some(pair) if return_key && last => return &pair[0],
                Some(pair) => node = &pair[1],
                None => return node,
            }
        } else if node.is_sequence() {
            let index = match segment {
                PathSegment::Index(i) => Some(*i),
                PathSegment::Key(k) => k.parse::<usize>().ok(),
            };
            match index.and_then(|i| node.components.get(i)) {
                Some(item) => node = item,
                None => return node,
            }
        } else {
            return node;
        }
    }
    node
}

/// Strict path lookup: every segment must exist.
///
/// Keys are matched against the trimmed source text of key nodes. On the
/// last segment, `kind` chooses between the key and its value.
pub fn locate_annotation<'a>(
    annotation: &'a AnnotatedParse,
    path: &[PathSegment],
    kind: CursorKind,
) -> Result<&'a AnnotatedParse, NavigationError> {
    let fail = || NavigationError {
        path: path.to_vec(),
    };
    let mut node = annotation;
    for (depth, segment) in path.iter().enumerate() {
        let last = depth + 1 == path.len();
        match segment {
            PathSegment::Index(i) if !node.is_mapping() => {
                node = node.components.get(*i).ok_or_else(fail)?;
            }
            _ => {
                let wanted = segment.to_string();
                let pair = node
                    .components
                    .chunks_exact(2)
                    .find(|pair| pair[0].text().trim() == wanted)
                    .ok_or_else(fail)?;
                node = if last && kind == CursorKind::Key {
                    &pair[0]
                } else {
                    &pair[1]
                };
            }
        }
    }
    Ok(node)
}
