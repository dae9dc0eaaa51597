//! Schema-driven completions
//!
//! Completions come from, in order of preference: the explicit
//! `completions` annotation, a `completions` tag, and finally the structure
//! of the schema (object keys, enum values, array items, combinator
//! branches). A `complete-from` tag redirects the lookup to another part of
//! the schema, e.g. `maybeArrayOf` completes from its non-array branch.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use yamlmeta_annotated::PathSegment;

use super::Schema;
use super::navigation::{
    child, navigate_by_instance_path, navigate_by_schema_path, schema_path_from_value,
};
use super::registry::{SchemaRef, SchemaRegistry, follow_chain};
use super::types::ObjectSchema;
use crate::error::{SchemaError, SchemaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Key,
    Value,
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    #[serde(rename = "type")]
    pub kind: CompletionKind,
    /// Text to insert; keys carry their `: ` suffix.
    pub value: String,
    pub description: String,
    /// Whether the editor should ask for more completions after accepting
    /// this one.
    pub suggest_on_accept: bool,
}

impl Completion {
    fn value(value: impl Into<String>) -> Self {
        Completion {
            kind: CompletionKind::Value,
            value: value.into(),
            description: String::new(),
            suggest_on_accept: false,
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Completion::value(s.clone()),
            Value::Object(map) => {
                let text = |key: &str| map.get(key).and_then(|v| v.as_str()).unwrap_or_default();
                Completion {
                    kind: if text("type") == "key" {
                        CompletionKind::Key
                    } else {
                        CompletionKind::Value
                    },
                    value: text("value").to_string(),
                    description: text("description").to_string(),
                    suggest_on_accept: map
                        .get("suggest_on_accept")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                }
            }
            other => Completion::value(other.to_string()),
        }
    }
}

/// Completions offered by `schema` itself.
pub fn schema_completions(
    schema: &Schema,
    registry: &SchemaRegistry,
) -> SchemaResult<Vec<Completion>> {
    completions_of(SchemaRef::Borrowed(schema), registry, &mut Vec::new())
}

/// `active` holds the references being expanded; a reference met again
/// below itself contributes nothing.
fn completions_of(
    schema: SchemaRef<'_>,
    registry: &SchemaRegistry,
    active: &mut Vec<String>,
) -> SchemaResult<Vec<Completion>> {
    match &*schema {
        Schema::False => return Ok(Vec::new()),
        Schema::Ref(r) => {
            if active.contains(&r.reference) {
                return Ok(Vec::new());
            }
            let id = r.reference.clone();
            let resolved = registry.resolve_ref(schema)?;
            active.push(id);
            let result = expand(resolved, registry, active);
            active.pop();
            return result;
        }
        _ => {}
    }
    expand(schema, registry, active)
}

fn expand(
    schema: SchemaRef<'_>,
    registry: &SchemaRegistry,
    active: &mut Vec<String>,
) -> SchemaResult<Vec<Completion>> {
    let schema = follow_chain(
        schema,
        |s| s.tag("complete-from").is_some(),
        |s| {
            let path = s
                .tag("complete-from")
                .and_then(schema_path_from_value)
                .ok_or_else(|| {
                    SchemaError::structure("complete-from must list keywords and indices", None)
                })?;
            navigate_by_schema_path(SchemaRef::Shared(Arc::new(s.clone())), &path, registry)
        },
    )?;

    if let Some(completions) = &schema.annotations().completions
        && !completions.is_empty()
    {
        return Ok(completions.iter().map(Completion::value).collect());
    }
    if let Some(tagged) = schema.tag("completions") {
        return Ok(match tagged {
            Value::Array(items) => items.iter().map(Completion::from_json).collect(),
            Value::Object(entries) => entries.values().map(Completion::from_json).collect(),
            _ => Vec::new(),
        });
    }

    match &*schema {
        Schema::Array(_) => match child(&schema, |s| match s {
            Schema::Array(a) => a.items.as_deref(),
            _ => None,
        }) {
            Some(items) => completions_of(items, registry, active),
            None => Ok(Vec::new()),
        },
        Schema::AnyOf(_) | Schema::AllOf(_) => {
            let mut result = Vec::new();
            for branch in 0..schema.children().len() {
                if let Some(next) = child(&schema, |s| s.children().get(branch).copied()) {
                    result.extend(completions_of(next, registry, active)?);
                }
            }
            Ok(result)
        }
        Schema::Enum(e) => Ok(e.values.iter().map(Completion::from_json).collect()),
        Schema::Object(object) => Ok(object_completions(object, registry)),
        _ => Ok(Vec::new()),
    }
}

/// Key completions of an object, skipping hidden properties.
fn object_completions(object: &ObjectSchema, registry: &SchemaRegistry) -> Vec<Completion> {
    let mut completions = Vec::new();
    for (key, property) in &object.properties {
        if property.is_hidden() {
            continue;
        }
        let description = match property.documentation() {
            Some(doc) => doc.to_string(),
            // The target of a reference may be defined after this object;
            // its documentation is looked up now, at completion time.
            None => match registry.resolve(property) {
                Ok(resolved) if resolved.is_hidden() => continue,
                Ok(resolved) => resolved.documentation().unwrap_or_default().to_string(),
                Err(_) => String::new(),
            },
        };
        completions.push(Completion {
            kind: CompletionKind::Key,
            value: format!("{}: ", key),
            description,
            suggest_on_accept: true,
        });
    }
    completions
}

/// Completions for the value at `instance_path` of a document validated
/// by `schema`.
///
/// Candidates from every schema the path can reach are merged; duplicates
/// (by inserted text) are dropped and key completions come first.
pub fn completions_for(
    schema: &Schema,
    instance_path: &[PathSegment],
    registry: &SchemaRegistry,
) -> SchemaResult<Vec<Completion>> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let mut values = Vec::new();
    for target in navigate_by_instance_path(schema, instance_path, registry)? {
        for completion in completions_of(target, registry, &mut Vec::new())? {
            if !seen.insert(completion.value.clone()) {
                continue;
            }
            match completion.kind {
                CompletionKind::Key => keys.push(completion),
                CompletionKind::Value => values.push(completion),
            }
        }
    }
    keys.extend(values);
    Ok(keys)
}

/// Visit `schema` and its subschemas until `visit` returns `true` for a
/// node, which stops the descent below that node.
fn walk_until(schema: &Schema, visit: &mut dyn FnMut(&Schema) -> bool) {
    if visit(schema) {
        return;
    }
    match schema {
        Schema::AnyOf(_) | Schema::AllOf(_) | Schema::Array(_) => {
            for c in schema.children() {
                walk_until(c, visit);
            }
        }
        Schema::Object(o) => {
            for c in o
                .properties
                .values()
                .chain(o.pattern_properties.values())
                .chain(o.property_names.as_deref())
            {
                walk_until(c, visit);
            }
        }
        _ => {}
    }
}

/// Key names `schema` knows about, used for typo suggestions.
pub fn possible_schema_keys(
    schema: &Schema,
    registry: &SchemaRegistry,
) -> SchemaResult<Vec<String>> {
    let precomputed: Vec<String> = schema_completions(schema, registry)?
        .into_iter()
        .filter(|c| c.kind == CompletionKind::Key)
        .filter_map(|c| c.value.split(':').next().map(str::to_string))
        .collect();
    if !precomputed.is_empty() {
        return Ok(precomputed);
    }

    let mut keys = Vec::new();
    walk_until(schema, &mut |s| match s {
        Schema::Object(o) => {
            keys.extend(o.properties.keys().cloned());
            true
        }
        Schema::Array(_) => true,
        _ => false,
    });
    Ok(keys)
}

/// Enum values reachable from `schema` without entering arrays or
/// objects, used for typo suggestions.
pub fn possible_schema_values(schema: &Schema) -> Vec<String> {
    let mut values = Vec::new();
    walk_until(schema, &mut |s| match s {
        Schema::Enum(e) => {
            values.extend(e.values.iter().map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }));
            true
        }
        Schema::Array(_) | Schema::Object(_) => true,
        _ => false,
    });
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::EnumSchema;
    use serde_json::json;

    fn load(yaml: &str) -> Schema {
        Schema::from_yaml_str(yaml).unwrap()
    }

    fn values(completions: &[Completion]) -> Vec<&str> {
        completions.iter().map(|c| c.value.as_str()).collect()
    }

    #[test]
    fn test_object_key_completions() {
        let registry = SchemaRegistry::new();
        let schema = load(
            "object:\n  properties:\n    toc:\n      boolean:\n        description: Include a table of contents\n    secret:\n      string:\n        hidden: true\n    title: string\n",
        );
        let completions = schema_completions(&schema, &registry).unwrap();
        assert_eq!(values(&completions), vec!["toc: ", "title: "]);
        assert_eq!(completions[0].description, "Include a table of contents");
        assert!(completions[0].suggest_on_accept);
        assert_eq!(completions[0].kind, CompletionKind::Key);
    }

    #[test]
    fn test_enum_value_completions() {
        let registry = SchemaRegistry::new();
        let completions = schema_completions(&load("enum: [html, pdf]"), &registry).unwrap();
        assert_eq!(values(&completions), vec!["html", "pdf"]);
        assert!(!completions[0].suggest_on_accept);
    }

    #[test]
    fn test_complete_from_skips_array_branch() {
        let registry = SchemaRegistry::new();
        let schema = load("maybeArrayOf:\n  enum: [a, b]\n");
        let completions = schema_completions(&schema, &registry).unwrap();
        assert_eq!(values(&completions), vec!["a", "b"]);
    }

    #[test]
    fn test_tag_completions() {
        let registry = SchemaRegistry::new();
        let schema = load("string:\n  tags:\n    completions: [left, right]\n");
        let completions = schema_completions(&schema, &registry).unwrap();
        assert_eq!(values(&completions), vec!["left", "right"]);
    }

    #[test]
    fn test_deferred_ref_description() {
        let registry = SchemaRegistry::new();
        let schema = load("object:\n  properties:\n    date:\n      ref: date\n");
        registry
            .define(load("string:\n  description: A date\nid: date\n"))
            .unwrap();
        let completions = schema_completions(&schema, &registry).unwrap();
        assert_eq!(completions[0].description, "A date");
    }

    #[test]
    fn test_completions_for_dedupes_keys_first() {
        let registry = SchemaRegistry::new();
        let schema = load(
            "object:\n  properties:\n    format:\n      anyOf:\n        - enum: [html, pdf]\n        - object:\n            properties:\n              html: any\n        - enum: [html]\n",
        );
        let completions =
            completions_for(&schema, &[PathSegment::from("format")], &registry).unwrap();
        assert_eq!(values(&completions), vec!["html: ", "html", "pdf"]);
    }

    #[test]
    fn test_possible_keys_and_values() {
        let registry = SchemaRegistry::new();
        let schema = load(
            "anyOf:\n  - object:\n      properties:\n        echo: boolean\n  - enum: [none, all]\n",
        );
        assert_eq!(
            possible_schema_keys(&schema, &registry).unwrap(),
            vec!["echo"]
        );
        assert_eq!(possible_schema_values(&schema), vec!["none", "all"]);
    }

    #[test]
    fn test_recursive_reference_completions_terminate() {
        let registry = SchemaRegistry::new();
        registry
            .define(load("anyOf:\n  - enum: [a]\n  - arrayOf:\n      ref: nav\nid: nav\n"))
            .unwrap();
        let completions = schema_completions(&load("ref: nav\n"), &registry).unwrap();
        assert_eq!(values(&completions), vec!["a"]);
    }

    #[test]
    fn test_enum_built_in_code_completes() {
        let registry = SchemaRegistry::new();
        let schema = Schema::Enum(EnumSchema {
            values: vec![json!("html"), json!("pdf"), json!(3)],
            ..Default::default()
        });
        let completions = schema_completions(&schema, &registry).unwrap();
        assert_eq!(values(&completions), vec!["html", "pdf", "3"]);
    }

    #[test]
    fn test_completion_json_shape() {
        let completion = Completion::value("html");
        assert_eq!(
            serde_json::to_value(&completion).unwrap(),
            json!({
                "type": "value",
                "value": "html",
                "description": "",
                "suggest_on_accept": false
            })
        );
    }
}
