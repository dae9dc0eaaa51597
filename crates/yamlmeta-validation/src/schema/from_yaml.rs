//! Declarative schema loader
//!
//! Converts the YAML schema vocabulary (`object`, `anyOf`, `maybeArrayOf`,
//! `record`, ...) into [`Schema`] values. A mapping is dispatched on the
//! first schema keyword it contains, in the order of [`SCHEMA_KEYWORDS`].
//! Modifiers such as `description` or `completions` may sit next to the
//! keyword, inside its value, or both; the outer ones win.

use indexmap::IndexMap;
use serde_json::{Value, json};
use yamlmeta_annotated::AnnotatedParse;

use super::Schema;
use super::builder::ObjectSchemaBuilder;
use super::helpers::{
    doc_string, get_hash_bool, get_hash_number, get_hash_string, get_hash_string_array,
    get_hash_tags, get_hash_usize, get_hash_value, string_items, structure_error,
};
use super::types::{
    AllOfSchema, AnyOfSchema, AnySchema, ArraySchema, BooleanSchema, EnumSchema,
    NamingConvention, NullSchema, NumberSchema, ObjectSchema, RefSchema, StringSchema,
};
use crate::error::{SchemaError, SchemaResult};
use crate::text::CaseConvention;

const SCHEMA_KEYWORDS: [&str; 16] = [
    "anyOf",
    "allOf",
    "boolean",
    "arrayOf",
    "enum",
    "maybeArrayOf",
    "null",
    "number",
    "object",
    "path",
    "record",
    "ref",
    "resolveRef",
    "string",
    "pattern",
    "schema",
];

pub(super) fn convert(node: &AnnotatedParse) -> SchemaResult<Schema> {
    match &node.result {
        Value::Null if !node.is_mapping() => return Ok(Schema::Null(NullSchema::default())),
        Value::String(s) if !node.is_mapping() => {
            if let Some(schema) = literal(s) {
                return Ok(schema);
            }
        }
        _ => {}
    }
    if node.is_sequence() {
        let values = node.components.iter().map(|c| c.result.clone()).collect();
        return Ok(enum_schema(values));
    }
    if !node.is_mapping() {
        return Ok(value_schema(node.result.clone()));
    }

    let Some((keyword, inner)) = SCHEMA_KEYWORDS
        .iter()
        .find_map(|k| get_hash_value(node, k).map(|v| (*k, v)))
    else {
        return Err(structure_error(
            node,
            format!(
                "Cannot convert object to a schema; expected one of: {}",
                SCHEMA_KEYWORDS.join(", ")
            ),
        ));
    };

    let schema = match keyword {
        "anyOf" | "allOf" => return convert_combinator(node, inner, keyword),
        "boolean" => Schema::Boolean(BooleanSchema::default()),
        "null" => Schema::Null(NullSchema::default()),
        "path" => Schema::String(StringSchema::default()),
        "number" => convert_number(inner)?,
        "arrayOf" => return convert_array_of(node, inner),
        "enum" => return convert_enum(node, inner),
        "maybeArrayOf" => {
            let item = convert(inner)?;
            let mut schema = Schema::AnyOf(AnyOfSchema {
                schemas: vec![
                    item.clone(),
                    Schema::Array(ArraySchema {
                        items: Some(Box::new(item)),
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            });
            if let Some(annotations) = schema.annotations_mut() {
                annotations.set_tag("complete-from", json!(["anyOf", 0]));
            }
            return apply_modifiers(node, schema);
        }
        "object" => Schema::Object(convert_object(inner)?),
        "record" => return convert_record(node, inner),
        "ref" => return apply_modifiers(node, reference(inner, false)?),
        // The eager target is substituted while compiling; modifiers next to
        // it would be lost.
        "resolveRef" => return reference(inner, true),
        "string" => convert_string(inner)?,
        "pattern" => {
            let pattern = match &inner.result {
                Value::String(s) => s.clone(),
                _ => get_hash_string(inner, "regex")?
                    .ok_or_else(|| structure_error(inner, "pattern requires field `regex`"))?,
            };
            pattern_schema(pattern)?
        }
        _ => return apply_modifiers(node, convert(inner)?),
    };
    let schema = apply_modifiers(inner, schema)?;
    apply_modifiers(node, schema)
}

fn literal(name: &str) -> Option<Schema> {
    Some(match name {
        "object" => Schema::Object(ObjectSchema::default()),
        "path" | "string" => Schema::String(StringSchema::default()),
        "number" => Schema::Number(NumberSchema::default()),
        "boolean" => Schema::Boolean(BooleanSchema::default()),
        "any" => Schema::Any(AnySchema::default()),
        _ => return None,
    })
}

fn completion_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An enum offering its values as exhaustive completions.
fn enum_schema(values: Vec<Value>) -> Schema {
    let mut schema = EnumSchema {
        values,
        ..Default::default()
    };
    schema.annotations.completions = Some(schema.values.iter().map(completion_text).collect());
    schema.annotations.exhaustive_completions = Some(true);
    Schema::Enum(schema)
}

/// The single-value enum a bare scalar stands for.
fn value_schema(value: Value) -> Schema {
    let mut schema = EnumSchema::default();
    schema.annotations.description = Some(format!("be {}", value));
    schema.values.push(value);
    Schema::Enum(schema)
}

fn pattern_schema(pattern: String) -> SchemaResult<Schema> {
    if let Err(err) = regex::Regex::new(&pattern) {
        return Err(SchemaError::InvalidPattern {
            pattern,
            message: err.to_string(),
        });
    }
    Ok(Schema::String(StringSchema {
        pattern: Some(pattern),
        ..Default::default()
    }))
}

fn reference(node: &AnnotatedParse, eager: bool) -> SchemaResult<Schema> {
    let Some(target) = node.result.as_str() else {
        return Err(structure_error(node, "ref must be a string"));
    };
    let mut schema = RefSchema {
        reference: target.to_string(),
        eager,
        ..Default::default()
    };
    if !eager {
        schema.annotations.description = Some(format!("be {}", target));
    }
    Ok(Schema::Ref(schema))
}

/// Apply the modifiers found in mapping `node` to `schema`.
///
/// Order matters: `additionalCompletions` extend the schema's own list,
/// `completions` replace it and `hidden` clears it again.
fn apply_modifiers(node: &AnnotatedParse, mut schema: Schema) -> SchemaResult<Schema> {
    if !node.is_mapping() {
        return Ok(schema);
    }
    let Some(annotations) = schema.annotations_mut() else {
        return Ok(schema);
    };

    if let Some(extra) = get_hash_string_array(node, "additionalCompletions")? {
        annotations
            .completions
            .get_or_insert_with(Vec::new)
            .extend(extra);
    }
    if let Some(completions) = get_hash_value(node, "completions")
        && completions.is_sequence()
    {
        annotations.completions = Some(string_items(completions, "completions")?);
    }
    if let Some(id) = get_hash_string(node, "id")? {
        annotations.id = Some(id);
    }
    if get_hash_bool(node, "hidden")? == Some(true) {
        annotations.completions = Some(Vec::new());
        annotations.hidden = Some(true);
        annotations.set_tag("hidden", json!(true));
    }
    if let Some(tags) = get_hash_tags(node)? {
        for (name, value) in tags {
            annotations.set_tag(name, value);
        }
    }
    if let Some(description) = get_hash_value(node, "description") {
        annotations.set_tag("description", description.result.clone());
        if let Some(doc) = doc_string(description)? {
            annotations.documentation = Some(doc);
        }
    }
    if let Some(description) = get_hash_string(node, "errorDescription")? {
        annotations.description = Some(description);
    }
    if let Some(message) = get_hash_string(node, "errorMessage")? {
        annotations.error_message = Some(message);
    }
    Ok(schema)
}

fn schema_list(node: &AnnotatedParse, keyword: &str) -> SchemaResult<Vec<Schema>> {
    if !node.is_sequence() {
        return Err(structure_error(
            node,
            format!("Expected array for {}", keyword),
        ));
    }
    node.components.iter().map(convert).collect()
}

fn convert_combinator(
    node: &AnnotatedParse,
    inner: &AnnotatedParse,
    keyword: &str,
) -> SchemaResult<Schema> {
    let explicit = get_hash_value(inner, "schemas");
    let schemas = match explicit {
        Some(list) => schema_list(list, keyword)?,
        None => schema_list(inner, keyword)?,
    };
    let mut schema = if keyword == "anyOf" {
        Schema::AnyOf(AnyOfSchema {
            schemas,
            ..Default::default()
        })
    } else {
        Schema::AllOf(AllOfSchema {
            schemas,
            ..Default::default()
        })
    };
    if explicit.is_some() {
        schema = apply_modifiers(inner, schema)?;
    }
    apply_modifiers(node, schema)
}

fn convert_number(inner: &AnnotatedParse) -> SchemaResult<Schema> {
    if !inner.is_mapping() {
        return Ok(Schema::Number(NumberSchema::default()));
    }
    Ok(Schema::Number(NumberSchema {
        minimum: get_hash_number(inner, "minimum")?,
        maximum: get_hash_number(inner, "maximum")?,
        exclusive_minimum: get_hash_number(inner, "exclusiveMinimum")?,
        exclusive_maximum: get_hash_number(inner, "exclusiveMaximum")?,
        ..Default::default()
    }))
}

fn convert_string(inner: &AnnotatedParse) -> SchemaResult<Schema> {
    match get_hash_string(inner, "pattern")? {
        Some(pattern) => pattern_schema(pattern),
        None => Ok(Schema::String(StringSchema::default())),
    }
}

fn convert_array_of(node: &AnnotatedParse, inner: &AnnotatedParse) -> SchemaResult<Schema> {
    let Some(items) = get_hash_value(inner, "schema") else {
        let schema = Schema::Array(ArraySchema {
            items: Some(Box::new(convert(inner)?)),
            ..Default::default()
        });
        return apply_modifiers(node, schema);
    };
    let length = get_hash_usize(inner, "length")?;
    let schema = Schema::Array(ArraySchema {
        items: Some(Box::new(convert(items)?)),
        min_items: get_hash_usize(inner, "minItems")?.or(length),
        max_items: get_hash_usize(inner, "maxItems")?.or(length),
        ..Default::default()
    });
    let schema = apply_modifiers(inner, schema)?;
    apply_modifiers(node, schema)
}

fn convert_enum(node: &AnnotatedParse, inner: &AnnotatedParse) -> SchemaResult<Schema> {
    if let Some(values) = get_hash_value(inner, "values") {
        if !values.is_sequence() {
            return Err(structure_error(values, "enum values must be an array"));
        }
        let schema = enum_schema(values.components.iter().map(|c| c.result.clone()).collect());
        let schema = apply_modifiers(inner, schema)?;
        return apply_modifiers(node, schema);
    }
    if !inner.is_sequence() {
        return Err(structure_error(inner, "Expected array for inline enum"));
    }
    let schema = enum_schema(inner.components.iter().map(|c| c.result.clone()).collect());
    apply_modifiers(node, schema)
}

fn convert_record(node: &AnnotatedParse, inner: &AnnotatedParse) -> SchemaResult<Schema> {
    let (properties_node, explicit) = match get_hash_value(inner, "properties") {
        Some(p) => (p, true),
        None => (inner, false),
    };
    let object = ObjectSchemaBuilder::new()
        .properties(convert_properties(properties_node)?)
        .require_all()
        .closed(true)
        .build()
        .map_err(|e| locate(e, inner))?;
    let mut schema = Schema::Object(object);
    if explicit {
        schema = apply_modifiers(inner, schema)?;
    }
    apply_modifiers(node, schema)
}

fn convert_properties(node: &AnnotatedParse) -> SchemaResult<IndexMap<String, Schema>> {
    if !node.is_mapping() {
        return Err(structure_error(node, "properties must be an object"));
    }
    node.pairs()
        .map(|(k, v)| Ok((k.key_string(), convert(v)?)))
        .collect()
}

fn convert_naming_convention(node: &AnnotatedParse) -> SchemaResult<NamingConvention> {
    let parse_one = |item: &AnnotatedParse, name: &str| {
        CaseConvention::from_name(name).ok_or_else(|| {
            structure_error(item, format!("Unrecognized naming convention {}", name))
        })
    };
    match &node.result {
        Value::String(s) if s == "ignore" => Ok(NamingConvention::Ignore),
        Value::String(s) => Ok(NamingConvention::Conventions(vec![parse_one(node, s)?])),
        _ if node.is_sequence() => {
            let conventions = node
                .components
                .iter()
                .map(|item| match item.result.as_str() {
                    Some(name) => parse_one(item, name),
                    None => Err(structure_error(item, "naming convention must be a string")),
                })
                .collect::<SchemaResult<Vec<_>>>()?;
            Ok(NamingConvention::Conventions(conventions))
        }
        _ => Err(structure_error(
            node,
            "namingConvention must be a string or a list of strings",
        )),
    }
}

/// Attach the location of `node` to a builder error that has none.
fn locate(err: SchemaError, node: &AnnotatedParse) -> SchemaError {
    match err {
        SchemaError::InvalidStructure {
            message,
            location: None,
        } => structure_error(node, message),
        other => other,
    }
}

fn convert_object(inner: &AnnotatedParse) -> SchemaResult<ObjectSchema> {
    if !inner.is_mapping() {
        if inner.result.is_null() {
            return ObjectSchemaBuilder::new().build();
        }
        return Err(structure_error(inner, "object schema must be a mapping"));
    }

    let mut builder = ObjectSchemaBuilder::new();
    if let Some(convention) = get_hash_value(inner, "namingConvention") {
        builder = builder.naming_convention(convert_naming_convention(convention)?);
    }
    if let Some(properties) = get_hash_value(inner, "properties") {
        builder = builder.properties(convert_properties(properties)?);
    }
    if let Some(patterns) = get_hash_value(inner, "patternProperties") {
        let patterns = convert_properties(patterns)?;
        for pattern in patterns.keys() {
            if let Err(err) = regex::Regex::new(pattern) {
                return Err(SchemaError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: err.to_string(),
                });
            }
        }
        builder = builder.pattern_properties(patterns);
    }
    if let Some(names) = get_hash_value(inner, "propertyNames") {
        builder = builder.property_names(convert(names)?);
    }
    if let Some(closed) = get_hash_bool(inner, "closed")? {
        builder = builder.closed(closed);
    }
    if let Some(additional) = get_hash_value(inner, "additionalProperties") {
        match additional.result {
            Value::Bool(false) => builder = builder.additional_properties(Schema::False),
            Value::Bool(true) => {}
            _ => builder = builder.additional_properties(convert(additional)?),
        }
    }
    if let Some(bases) = get_hash_value(inner, "super") {
        let bases = if bases.is_sequence() {
            bases
                .components
                .iter()
                .map(convert)
                .collect::<SchemaResult<Vec<_>>>()?
        } else {
            vec![convert(bases)?]
        };
        builder = builder.extends(bases);
    }
    if let Some(required) = get_hash_value(inner, "required") {
        builder = match required.result.as_str() {
            Some("all") => builder.require_all(),
            Some(other) => {
                return Err(structure_error(
                    required,
                    format!("required must be `all` or a list of keys, got {}", other),
                ));
            }
            None => builder.required(string_items(required, "required")?),
        };
    }
    if let Some(completions) = get_hash_value(inner, "completions") {
        builder = builder.completions(completions.result.clone());
    }
    builder.build().map_err(|e| locate(e, inner))
}
