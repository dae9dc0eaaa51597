//! Helper functions for reading schema descriptions
//!
//! Typed accessors over mapping fields of an [`AnnotatedParse`]. Every
//! failure carries the source span of the offending node.

use crate::error::{SchemaError, SchemaResult};
use indexmap::IndexMap;
use serde_json::Value;
use yamlmeta_annotated::AnnotatedParse;

pub(super) fn structure_error(node: &AnnotatedParse, message: impl Into<String>) -> SchemaError {
    SchemaError::structure(message, node.source_span())
}

/// Value node of `key` when `yaml` is a mapping.
pub(super) fn get_hash_value<'a>(
    yaml: &'a AnnotatedParse,
    key: &str,
) -> Option<&'a AnnotatedParse> {
    yaml.value_node(key)
}

/// Get a string value from a hash by key
pub(super) fn get_hash_string(yaml: &AnnotatedParse, key: &str) -> SchemaResult<Option<String>> {
    if let Some(value) = get_hash_value(yaml, key) {
        if let Some(s) = value.result.as_str() {
            return Ok(Some(s.to_string()));
        }
        return Err(structure_error(
            value,
            format!("Field '{}' must be a string", key),
        ));
    }
    Ok(None)
}

/// Get a number value from a hash by key
pub(super) fn get_hash_number(yaml: &AnnotatedParse, key: &str) -> SchemaResult<Option<f64>> {
    if let Some(value) = get_hash_value(yaml, key) {
        if let Some(n) = value.result.as_f64() {
            return Ok(Some(n));
        }
        return Err(structure_error(
            value,
            format!("Field '{}' must be a number", key),
        ));
    }
    Ok(None)
}

/// Get a usize value from a hash by key
pub(super) fn get_hash_usize(yaml: &AnnotatedParse, key: &str) -> SchemaResult<Option<usize>> {
    if let Some(value) = get_hash_value(yaml, key) {
        if let Some(n) = value.result.as_u64() {
            return Ok(Some(n as usize));
        }
        return Err(structure_error(
            value,
            format!("Field '{}' must be a non-negative integer", key),
        ));
    }
    Ok(None)
}

/// Get a boolean value from a hash by key
pub(super) fn get_hash_bool(yaml: &AnnotatedParse, key: &str) -> SchemaResult<Option<bool>> {
    if let Some(value) = get_hash_value(yaml, key) {
        if let Some(b) = value.result.as_bool() {
            return Ok(Some(b));
        }
        return Err(structure_error(
            value,
            format!("Field '{}' must be a boolean", key),
        ));
    }
    Ok(None)
}

/// Strings of a sequence node.
pub(super) fn string_items(node: &AnnotatedParse, key: &str) -> SchemaResult<Vec<String>> {
    if !node.is_sequence() {
        return Err(structure_error(
            node,
            format!("Field '{}' must be an array", key),
        ));
    }
    node.components
        .iter()
        .map(|item| {
            item.result
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    structure_error(item, format!("Field '{}' items must be strings", key))
                })
        })
        .collect()
}

/// Get an array of strings from a hash by key
pub(super) fn get_hash_string_array(
    yaml: &AnnotatedParse,
    key: &str,
) -> SchemaResult<Option<Vec<String>>> {
    match get_hash_value(yaml, key) {
        Some(value) => string_items(value, key).map(Some),
        None => Ok(None),
    }
}

/// Get tags (a hash of key-value pairs) from a schema
pub(super) fn get_hash_tags(
    yaml: &AnnotatedParse,
) -> SchemaResult<Option<IndexMap<String, Value>>> {
    if let Some(value) = get_hash_value(yaml, "tags") {
        if !value.is_mapping() {
            return Err(structure_error(value, "tags must be an object"));
        }
        let tags = value
            .pairs()
            .map(|(k, v)| (k.key_string(), v.result.clone()))
            .collect();
        return Ok(Some(tags));
    }
    Ok(None)
}

/// A documentation string: either plain, or the `short` entry of a
/// `{short, long}` mapping.
pub(super) fn doc_string(node: &AnnotatedParse) -> SchemaResult<Option<String>> {
    match &node.result {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Object(map) => match map.get("short") {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(structure_error(node, "description.short must be a string")),
            None => Ok(None),
        },
        _ => Err(structure_error(
            node,
            "description must be a string or an object with `short` and `long`",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yamlmeta_mapped_text::MappedText;

    fn tree(s: &str) -> AnnotatedParse {
        yamlmeta_annotated::parse(&MappedText::from_literal(s, Some("schema.yml"))).unwrap()
    }

    #[test]
    fn test_typed_getters() {
        let yaml = tree("a: text\nn: 3\nb: true\nl: [x, y]\n");
        assert_eq!(get_hash_string(&yaml, "a").unwrap().as_deref(), Some("text"));
        assert_eq!(get_hash_number(&yaml, "n").unwrap(), Some(3.0));
        assert_eq!(get_hash_usize(&yaml, "n").unwrap(), Some(3));
        assert_eq!(get_hash_bool(&yaml, "b").unwrap(), Some(true));
        assert_eq!(
            get_hash_string_array(&yaml, "l").unwrap(),
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(get_hash_string(&yaml, "missing").unwrap(), None);
    }

    #[test]
    fn test_wrong_type_reports_location() {
        let yaml = tree("a: 1\nb: nope\n");
        let err = get_hash_bool(&yaml, "b").unwrap_err();
        match err {
            SchemaError::InvalidStructure { message, location } => {
                assert_eq!(message, "Field 'b' must be a boolean");
                let span = location.unwrap();
                assert_eq!(span.start_line_col().line, 1);
                assert_eq!(span.file_name(), Some("schema.yml"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_tags_keep_order() {
        let yaml = tree("tags:\n  z: 1\n  a: [x]\n");
        let tags = get_hash_tags(&yaml).unwrap().unwrap();
        assert_eq!(tags.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(tags["a"], json!(["x"]));
    }

    #[test]
    fn test_doc_string_short_form() {
        let yaml = tree("description:\n  short: Short\n  long: Longer text\n");
        let node = get_hash_value(&yaml, "description").unwrap();
        assert_eq!(doc_string(node).unwrap().as_deref(), Some("Short"));
    }
}
