//! Schema field lists
//!
//! Metadata options are often described as a flat list of fields, each
//! with a name, a schema and some documentation:
//!
//! ```yaml
//! - name: toc
//!   alias: table-of-contents
//!   schema: boolean
//!   description: Include a table of contents
//! ```
//!
//! These helpers turn such lists into property maps and object schemas.

use indexmap::IndexMap;
use serde_json::{Value, json};
use yamlmeta_annotated::AnnotatedParse;

use super::Schema;
use super::builder::ObjectSchemaBuilder;
use super::helpers::{
    get_hash_bool, get_hash_string, get_hash_string_array, get_hash_tags, get_hash_value,
    structure_error,
};
use super::types::ObjectSchema;
use crate::error::SchemaResult;

/// One entry of a field list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub schema: Schema,
    /// Second property name sharing the same schema.
    pub alias: Option<String>,
    pub hidden: bool,
    /// Plain string or a `{short, long}` mapping.
    pub description: Option<Value>,
    pub tags: Option<IndexMap<String, Value>>,
    /// Output formats the field applies to; recorded as the `formats` tag.
    pub enabled: Option<Vec<String>>,
    /// Output formats the field does not apply to; recorded as `!fmt`
    /// entries of the `formats` tag.
    pub disabled: Option<Vec<String>>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        SchemaField {
            name: name.into(),
            schema,
            ..Default::default()
        }
    }

    /// Read a field list from its YAML description.
    pub fn list_from_yaml(node: &AnnotatedParse) -> SchemaResult<Vec<SchemaField>> {
        if !node.is_sequence() {
            return Err(structure_error(node, "a field list must be an array"));
        }
        node.components.iter().map(SchemaField::from_yaml).collect()
    }

    pub fn from_yaml(node: &AnnotatedParse) -> SchemaResult<SchemaField> {
        let name = get_hash_string(node, "name")?
            .ok_or_else(|| structure_error(node, "field requires `name`"))?;
        let schema = get_hash_value(node, "schema")
            .ok_or_else(|| structure_error(node, format!("field `{}` requires `schema`", name)))?;
        Ok(SchemaField {
            schema: Schema::from_yaml(schema)?,
            alias: get_hash_string(node, "alias")?,
            hidden: get_hash_bool(node, "hidden")?.unwrap_or(false),
            description: get_hash_value(node, "description").map(|d| d.result.clone()),
            tags: get_hash_tags(node)?,
            enabled: get_hash_string_array(node, "enabled")?,
            disabled: get_hash_string_array(node, "disabled")?,
            name,
        })
    }

    /// The field's schema with its documentation and tags attached.
    pub fn annotated_schema(&self) -> Schema {
        let mut schema = self.schema.clone();
        let Some(annotations) = schema.annotations_mut() else {
            return schema;
        };
        if let Some(enabled) = &self.enabled {
            annotations.set_tag("formats", json!(enabled));
        }
        if let Some(disabled) = &self.disabled {
            let formats: Vec<String> = disabled.iter().map(|f| format!("!{}", f)).collect();
            annotations.set_tag("formats", json!(formats));
        }
        if let Some(tags) = &self.tags {
            for (name, value) in tags {
                annotations.set_tag(name.clone(), value.clone());
            }
        }
        if let Some(description) = &self.description {
            let doc = match description {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map.get("short").and_then(|s| s.as_str()).map(String::from),
                _ => None,
            };
            if doc.is_some() {
                annotations.documentation = doc;
            }
            annotations.set_tag("description", description.clone());
        }
        if self.hidden {
            annotations.set_tag("hidden", json!(true));
        }
        schema
    }
}

/// Property map for a field list; aliases map to the same schema.
pub fn convert_from_fields(fields: &[SchemaField]) -> IndexMap<String, Schema> {
    let mut properties = IndexMap::new();
    for field in fields {
        let schema = field.annotated_schema();
        properties.insert(field.name.clone(), schema.clone());
        if let Some(alias) = &field.alias {
            properties.insert(alias.clone(), schema);
        }
    }
    properties
}

/// Object schema whose properties are the fields not rejected by `exclude`.
pub fn object_schema_from_fields(
    fields: &[SchemaField],
    exclude: impl Fn(&str) -> bool,
) -> SchemaResult<ObjectSchema> {
    let mut properties = convert_from_fields(fields);
    properties.retain(|key, _| !exclude(key));
    ObjectSchemaBuilder::new().properties(properties).build()
}
