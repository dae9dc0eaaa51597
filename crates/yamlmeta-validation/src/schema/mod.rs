//! Schema model
//!
//! A [`Schema`] is a closed sum of the combinator types understood by the
//! validator. Schemas are usually written in the declarative YAML
//! vocabulary and converted with [`Schema::from_yaml`], then registered in
//! a [`SchemaRegistry`] under their `$id`.
//!
//! ```
//! use yamlmeta_validation::schema::Schema;
//!
//! let schema = Schema::from_yaml_str("object:\n  properties:\n    toc: boolean\n").unwrap();
//! assert_eq!(schema.type_name(), "object");
//! assert_eq!(schema.description(), "be an object");
//! ```

mod annotations;
mod builder;
mod completions;
mod fields;
mod from_yaml;
mod helpers;
mod merge;
mod navigation;
mod registry;
pub mod types;

pub use builder::ObjectSchemaBuilder;
pub use completions::{
    Completion, CompletionKind, completions_for, possible_schema_keys, possible_schema_values,
    schema_completions,
};
pub use fields::{SchemaField, convert_from_fields, object_schema_from_fields};
pub use merge::merge_object_schemas;
pub use navigation::{navigate_by_instance_path, navigate_by_schema_path};
pub use registry::{SchemaRef, SchemaRegistry, global_registry};
pub use types::*;

use crate::error::SchemaResult;
use annotations::EMPTY_ANNOTATIONS;
use yamlmeta_annotated::{AnnotatedParse, PathSegment, ParserConfig};
use yamlmeta_mapped_text::MappedText;

/// Keywords and branch indices leading to a subschema, e.g.
/// `object.properties.toc.boolean.type`.
pub type SchemaPath = Vec<PathSegment>;

/// A node of the schema combinator language.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Accepts nothing.
    False,
    Any(AnySchema),
    Boolean(BooleanSchema),
    Number(NumberSchema),
    String(StringSchema),
    Null(NullSchema),
    Enum(EnumSchema),
    AnyOf(AnyOfSchema),
    AllOf(AllOfSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    Ref(RefSchema),
}

fn value_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strip the leading `be ` of a description phrase.
fn inner_phrase(description: &str) -> &str {
    description.strip_prefix("be ").unwrap_or(description)
}

impl Schema {
    /// Parse and convert a YAML schema description.
    pub fn from_yaml_str(text: &str) -> SchemaResult<Schema> {
        Schema::from_mapped_text(&MappedText::from_literal(text, None))
    }

    /// Like [`Schema::from_yaml_str`], keeping the file name of `text` for
    /// error locations.
    pub fn from_mapped_text(text: &MappedText) -> SchemaResult<Schema> {
        let tree = yamlmeta_annotated::parse_with_config(text, &ParserConfig::strict())?;
        Schema::from_yaml(&tree)
    }

    /// Convert a parsed declarative schema description.
    pub fn from_yaml(node: &AnnotatedParse) -> SchemaResult<Schema> {
        from_yaml::convert(node)
    }

    pub fn annotations(&self) -> &SchemaAnnotations {
        match self {
            Schema::False => &EMPTY_ANNOTATIONS,
            Schema::Any(s) => &s.annotations,
            Schema::Boolean(s) => &s.annotations,
            Schema::Number(s) => &s.annotations,
            Schema::String(s) => &s.annotations,
            Schema::Null(s) => &s.annotations,
            Schema::Enum(s) => &s.annotations,
            Schema::AnyOf(s) => &s.annotations,
            Schema::AllOf(s) => &s.annotations,
            Schema::Array(s) => &s.annotations,
            Schema::Object(s) => &s.annotations,
            Schema::Ref(s) => &s.annotations,
        }
    }

    /// `None` for [`Schema::False`], which carries no annotations.
    pub fn annotations_mut(&mut self) -> Option<&mut SchemaAnnotations> {
        match self {
            Schema::False => None,
            Schema::Any(s) => Some(&mut s.annotations),
            Schema::Boolean(s) => Some(&mut s.annotations),
            Schema::Number(s) => Some(&mut s.annotations),
            Schema::String(s) => Some(&mut s.annotations),
            Schema::Null(s) => Some(&mut s.annotations),
            Schema::Enum(s) => Some(&mut s.annotations),
            Schema::AnyOf(s) => Some(&mut s.annotations),
            Schema::AllOf(s) => Some(&mut s.annotations),
            Schema::Array(s) => Some(&mut s.annotations),
            Schema::Object(s) => Some(&mut s.annotations),
            Schema::Ref(s) => Some(&mut s.annotations),
        }
    }

    /// The schema with its `$id` set.
    pub fn with_id(mut self, id: impl Into<String>) -> Schema {
        if let Some(annotations) = self.annotations_mut() {
            annotations.id = Some(id.into());
        }
        self
    }

    /// The schema with `errorMessage` set.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Schema {
        if let Some(annotations) = self.annotations_mut() {
            annotations.error_message = Some(message.into());
        }
        self
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::False => "false",
            Schema::Any(_) => "any",
            Schema::Boolean(_) => "boolean",
            Schema::Number(_) => "number",
            Schema::String(_) => "string",
            Schema::Null(_) => "null",
            Schema::Enum(_) => "enum",
            Schema::AnyOf(_) => "anyOf",
            Schema::AllOf(_) => "allOf",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Ref(_) => "ref",
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.annotations().id.as_deref()
    }

    pub fn tag(&self, name: &str) -> Option<&serde_json::Value> {
        self.annotations().tag(name)
    }

    /// Explicit `hidden: true` or a `hidden` tag.
    pub fn is_hidden(&self) -> bool {
        let annotations = self.annotations();
        annotations.hidden == Some(true)
            || annotations.tag("hidden") == Some(&serde_json::Value::Bool(true))
    }

    pub fn documentation(&self) -> Option<&str> {
        self.annotations().documentation.as_deref()
    }

    /// The `error-importance` tag, used to rank competing `anyOf` branches.
    pub fn error_importance(&self) -> Option<f64> {
        self.tag("error-importance").and_then(|v| v.as_f64())
    }

    /// Schema generated by naming convention detection.
    pub fn is_case_detection(&self) -> bool {
        self.tag("case-detection") == Some(&serde_json::Value::Bool(true))
    }

    /// The "must ..." phrase for error messages, e.g. `be a number`.
    pub fn description(&self) -> String {
        if let Some(description) = &self.annotations().description {
            return description.clone();
        }
        match self {
            Schema::False => "be no possible value".to_string(),
            Schema::Any(_) => "be anything".to_string(),
            Schema::Boolean(_) => "be `true` or `false`".to_string(),
            Schema::Number(_) => "be a number".to_string(),
            Schema::String(s) => match &s.pattern {
                Some(pattern) => format!("be a string that satisfies regex \"{}\"", pattern),
                None => "be a string".to_string(),
            },
            Schema::Null(_) => "be the null value".to_string(),
            Schema::Enum(s) => match s.values.as_slice() {
                [one] => format!("be '{}'", value_display(one)),
                values => format!(
                    "be one of: {}",
                    values
                        .iter()
                        .map(|v| format!("`{}`", value_display(v)))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            Schema::AnyOf(s) => format!(
                "be at least one of: {}",
                s.schemas
                    .iter()
                    .map(|b| inner_phrase(&b.description()).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Schema::AllOf(s) => format!(
                "be all of: {}",
                s.schemas
                    .iter()
                    .map(|b| inner_phrase(&b.description()).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Schema::Array(s) => match &s.items {
                Some(items) => format!(
                    "be an array of values, where each element must {}",
                    items.description()
                ),
                None => "be an array of values".to_string(),
            },
            Schema::Object(_) => "be an object".to_string(),
            Schema::Ref(s) => format!("be {}", s.reference),
        }
    }

    /// Direct subschemas, in declaration order.
    pub fn children(&self) -> Vec<&Schema> {
        match self {
            Schema::AnyOf(s) => s.schemas.iter().collect(),
            Schema::AllOf(s) => s.schemas.iter().collect(),
            Schema::Array(s) => s.items.iter().map(|b| b.as_ref()).collect(),
            Schema::Object(s) => s
                .properties
                .values()
                .chain(s.pattern_properties.values())
                .chain(s.additional_properties.iter().map(|b| b.as_ref()))
                .chain(s.property_names.iter().map(|b| b.as_ref()))
                .chain(s.base_schema.iter().flatten())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Visit this schema and every nested subschema, parents first.
    /// References are not followed.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Schema)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Names of every reference inside this schema, in walk order.
    pub fn references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.walk(&mut |s| {
            if let Schema::Ref(r) = s {
                refs.push(r.reference.as_str());
            }
        });
        refs
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema::Any(AnySchema::default())
    }
}

impl From<ObjectSchema> for Schema {
    fn from(schema: ObjectSchema) -> Self {
        Schema::Object(schema)
    }
}
