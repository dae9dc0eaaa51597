//! Schema navigation
//!
//! Two walks over a schema tree. [`navigate_by_instance_path`] answers
//! "which schemas could describe the value at this instance path", which
//! needs fan-out through `anyOf`/`allOf`. [`navigate_by_schema_path`]
//! follows one concrete schema path (as used by `complete-from` tags) to a
//! single subschema.

use serde_json::Value;
use std::sync::Arc;
use yamlmeta_annotated::{PathSegment, format_path};

use super::registry::{SchemaRef, SchemaRegistry};
use super::{Schema, SchemaPath};
use crate::error::{SchemaError, SchemaResult};

/// The child of `parent` selected by `pick`.
///
/// Children of a shared schema are cloned into their own allocation.
pub(crate) fn child<'a>(
    parent: &SchemaRef<'a>,
    pick: impl Fn(&Schema) -> Option<&Schema>,
) -> Option<SchemaRef<'a>> {
    match parent {
        SchemaRef::Borrowed(s) => pick(*s).map(SchemaRef::Borrowed),
        SchemaRef::Shared(s) => pick(s).map(|c| SchemaRef::Shared(Arc::new(c.clone()))),
    }
}

fn segment_index(segment: &PathSegment) -> Option<usize> {
    match segment {
        PathSegment::Index(i) => Some(*i),
        PathSegment::Key(k) => k.parse().ok(),
    }
}

/// A schema path stored in a tag, e.g. `complete-from: [anyOf, 0]`.
pub(crate) fn schema_path_from_value(value: &Value) -> Option<SchemaPath> {
    value
        .as_array()?
        .iter()
        .map(|v| match v {
            Value::String(s) => Some(PathSegment::Key(s.clone())),
            Value::Number(n) => n.as_u64().map(|n| PathSegment::Index(n as usize)),
            _ => None,
        })
        .collect()
}

/// Key of the first `patternProperties` regex matching `key`.
pub(crate) fn matching_pattern<'s>(
    patterns: impl IntoIterator<Item = &'s String>,
    key: &str,
) -> Option<&'s String> {
    patterns.into_iter().find(|pattern| {
        regex::Regex::new(pattern)
            .map(|re| re.is_match(key))
            .unwrap_or(false)
    })
}

/// Every schema that could describe the value found at `path`.
///
/// References are resolved along the way. `anyOf` and `allOf` contribute
/// each branch that can be followed; a path that cannot be followed gives
/// no schema. When the last segment is only the beginning of a declared
/// property name, the containing object is returned so that completions
/// can be offered for it.
pub fn navigate_by_instance_path<'a>(
    schema: &'a Schema,
    path: &[PathSegment],
    registry: &SchemaRegistry,
) -> SchemaResult<Vec<SchemaRef<'a>>> {
    let mut walk = InstanceWalk {
        path,
        registry,
        visited: Vec::new(),
        found: Vec::new(),
    };
    walk.visit(SchemaRef::Borrowed(schema), 0)?;
    Ok(walk.found)
}

struct InstanceWalk<'p, 'a> {
    path: &'p [PathSegment],
    registry: &'p SchemaRegistry,
    /// Registered schemas already entered, by depth.
    visited: Vec<(*const Schema, usize)>,
    found: Vec<SchemaRef<'a>>,
}

impl<'a> InstanceWalk<'_, 'a> {
    fn visit(&mut self, schema: SchemaRef<'a>, index: usize) -> SchemaResult<()> {
        let via_ref = matches!(&*schema, Schema::Ref(_));
        let schema = self.registry.resolve_ref(schema)?;
        if via_ref {
            let entry = (&*schema as *const Schema, index);
            if self.visited.contains(&entry) {
                return Ok(());
            }
            self.visited.push(entry);
        }

        let Some(segment) = self.path.get(index) else {
            self.found.push(schema);
            return Ok(());
        };
        let last = index + 1 == self.path.len();

        match &*schema {
            Schema::Object(object) => {
                let PathSegment::Key(key) = segment else {
                    return Ok(());
                };
                if let Some(next) = child(&schema, |s| match s {
                    Schema::Object(o) => o.properties.get(key),
                    _ => None,
                }) {
                    return self.visit(next, index + 1);
                }
                if let Some(next) = child(&schema, |s| match s {
                    Schema::Object(o) => matching_pattern(o.pattern_properties.keys(), key)
                        .and_then(|p| o.pattern_properties.get(p)),
                    _ => None,
                }) {
                    return self.visit(next, index + 1);
                }
                if last
                    && object
                        .properties
                        .keys()
                        .any(|name| name.starts_with(key.as_str()))
                {
                    self.found.push(schema.clone());
                }
                Ok(())
            }
            Schema::Array(_) => {
                if !matches!(segment, PathSegment::Index(_)) {
                    return Ok(());
                }
                match child(&schema, |s| match s {
                    Schema::Array(a) => a.items.as_deref(),
                    _ => None,
                }) {
                    Some(next) => self.visit(next, index + 1),
                    None => Ok(()),
                }
            }
            Schema::AnyOf(_) | Schema::AllOf(_) => {
                let count = schema.children().len();
                for branch in 0..count {
                    if let Some(next) = child(&schema, |s| s.children().get(branch).copied()) {
                        self.visit(next, index)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Follow a concrete schema path such as `anyOf.0` or
/// `object.properties.toc` to the one subschema it names.
pub fn navigate_by_schema_path<'a>(
    schema: SchemaRef<'a>,
    path: &[PathSegment],
    registry: &SchemaRegistry,
) -> SchemaResult<SchemaRef<'a>> {
    let invalid = |index: usize| {
        SchemaError::structure(
            format!(
                "invalid schema path {} at segment {}",
                format_path(path),
                index
            ),
            None,
        )
    };
    let keyword_at = |index: usize| match path.get(index) {
        Some(PathSegment::Key(k)) => Some(k.as_str()),
        _ => None,
    };

    let mut current = registry.resolve_ref(schema)?;
    let mut index = 0;
    while index < path.len() {
        if keyword_at(index) != Some(current.type_name()) {
            return Err(invalid(index));
        }
        let (next, consumed) = match &*current {
            Schema::AnyOf(_) | Schema::AllOf(_) => {
                let branch = path
                    .get(index + 1)
                    .and_then(segment_index)
                    .ok_or_else(|| invalid(index + 1))?;
                (
                    child(&current, |s| s.children().get(branch).copied()),
                    2,
                )
            }
            Schema::Array(_) => (
                child(&current, |s| match s {
                    Schema::Array(a) => a.items.as_deref(),
                    _ => None,
                }),
                2,
            ),
            Schema::Object(_) => match keyword_at(index + 1) {
                Some("properties") => {
                    let key = keyword_at(index + 2).ok_or_else(|| invalid(index + 2))?;
                    (
                        child(&current, |s| match s {
                            Schema::Object(o) => o.properties.get(key),
                            _ => None,
                        }),
                        3,
                    )
                }
                Some("patternProperties") => {
                    let key = keyword_at(index + 2).ok_or_else(|| invalid(index + 2))?;
                    (
                        child(&current, |s| match s {
                            Schema::Object(o) => o.pattern_properties.get(key),
                            _ => None,
                        }),
                        3,
                    )
                }
                Some("additionalProperties") => (
                    child(&current, |s| match s {
                        Schema::Object(o) => o.additional_properties.as_deref(),
                        _ => None,
                    }),
                    2,
                ),
                _ => return Err(invalid(index + 1)),
            },
            _ => return Err(invalid(index)),
        };
        let next = next.ok_or_else(|| invalid(index))?;
        current = registry.resolve_ref(next)?;
        index += consumed;
    }
    Ok(current)
}
