//! Schema annotation merging
//!
//! Annotations can be layered: `extends` merges the annotations of every
//! base, and a derived schema's own modifiers land on top of the result.

use indexmap::IndexMap;

use super::types::SchemaAnnotations;

/// Annotations of [`super::Schema::False`].
pub(super) static EMPTY_ANNOTATIONS: SchemaAnnotations = SchemaAnnotations {
    id: None,
    description: None,
    documentation: None,
    error_message: None,
    hidden: None,
    completions: None,
    exhaustive_completions: None,
    tags: None,
};

/// Merge tag maps; `outer` wins on shared keys.
pub(super) fn merge_tags(
    inner: Option<IndexMap<String, serde_json::Value>>,
    outer: Option<IndexMap<String, serde_json::Value>>,
) -> Option<IndexMap<String, serde_json::Value>> {
    match (inner, outer) {
        (None, None) => None,
        (Some(i), None) => Some(i),
        (None, Some(o)) => Some(o),
        (Some(mut i), Some(o)) => {
            i.extend(o);
            Some(i)
        }
    }
}

/// Layer `outer` over `inner`: every field `outer` sets replaces the inner
/// value, tags are merged key by key.
pub(super) fn overlay_annotations(
    inner: SchemaAnnotations,
    outer: SchemaAnnotations,
) -> SchemaAnnotations {
    SchemaAnnotations {
        id: outer.id.or(inner.id),
        description: outer.description.or(inner.description),
        documentation: outer.documentation.or(inner.documentation),
        error_message: outer.error_message.or(inner.error_message),
        hidden: outer.hidden.or(inner.hidden),
        completions: outer.completions.or(inner.completions),
        exhaustive_completions: outer.exhaustive_completions.or(inner.exhaustive_completions),
        tags: merge_tags(inner.tags, outer.tags),
    }
}
