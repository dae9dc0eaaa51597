//! Object schema construction
//!
//! [`ObjectSchemaBuilder`] is the one way object schemas are put together,
//! both by the YAML loader and by code. Besides plain field assignment it
//! enforces the `closed` rules and adds naming convention detection.

use indexmap::IndexMap;
use serde_json::{Value, json};

use super::Schema;
use super::types::{KeyNamingRule, NamingConvention, ObjectSchema, SchemaAnnotations, StringSchema};
use crate::error::{SchemaError, SchemaResult};
use crate::text::detect_conventions;

/// Builder for [`ObjectSchema`].
///
/// ```
/// use yamlmeta_validation::schema::{ObjectSchemaBuilder, Schema, StringSchema};
///
/// let object = ObjectSchemaBuilder::new()
///     .property("code-fold", Schema::String(StringSchema::default()))
///     .build()
///     .unwrap();
///
/// // `code_fold` is rejected as a near miss of `code-fold`.
/// assert!(object.property_names.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ObjectSchemaBuilder {
    properties: IndexMap<String, Schema>,
    pattern_properties: IndexMap<String, Schema>,
    additional_properties: Option<Schema>,
    property_names: Option<Schema>,
    required: Vec<String>,
    closed: bool,
    naming_convention: Option<NamingConvention>,
    base_schema: Option<Vec<Schema>>,
    completions: Option<Value>,
    exhaustive: bool,
}

impl ObjectSchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, key: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(key.into(), schema);
        self
    }

    pub fn properties(mut self, properties: IndexMap<String, Schema>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn pattern_property(mut self, pattern: impl Into<String>, schema: Schema) -> Self {
        self.pattern_properties.insert(pattern.into(), schema);
        self
    }

    pub fn pattern_properties(mut self, properties: IndexMap<String, Schema>) -> Self {
        self.pattern_properties.extend(properties);
        self
    }

    /// `Schema::False` forbids undeclared keys.
    pub fn additional_properties(mut self, schema: Schema) -> Self {
        self.additional_properties = Some(schema);
        self
    }

    pub fn property_names(mut self, schema: Schema) -> Self {
        self.property_names = Some(schema);
        self
    }

    pub fn required<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Require every property declared so far.
    pub fn require_all(mut self) -> Self {
        self.required = self.properties.keys().cloned().collect();
        self
    }

    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    pub fn naming_convention(mut self, convention: NamingConvention) -> Self {
        self.naming_convention = Some(convention);
        self
    }

    /// Merge these object schemas (or references to them) into the result
    /// when the schema is compiled.
    pub fn extends(mut self, bases: Vec<Schema>) -> Self {
        self.base_schema = Some(bases);
        self
    }

    /// Key completions, stored as the `completions` tag.
    pub fn completions(mut self, completions: Value) -> Self {
        self.completions = Some(completions);
        self
    }

    pub fn exhaustive(mut self, exhaustive: bool) -> Self {
        self.exhaustive = exhaustive;
        self
    }

    pub fn build(mut self) -> SchemaResult<ObjectSchema> {
        let mut annotations = SchemaAnnotations::default();
        if let Some(completions) = self.completions.take() {
            annotations.set_tag("completions", completions);
        }
        if self.exhaustive {
            annotations.exhaustive_completions = Some(true);
        }

        if self.closed {
            if self.properties.is_empty() && self.base_schema.is_none() {
                return Err(SchemaError::structure(
                    "object schema `closed` requires field `properties`.",
                    None,
                ));
            }
            if matches!(self.naming_convention, Some(NamingConvention::Conventions(_))) {
                return Err(SchemaError::structure(
                    "object schema `closed` is only supported with namingConvention: `ignore`",
                    None,
                ));
            }
            self.naming_convention = Some(NamingConvention::Ignore);
        }

        if let Some(bases) = &self.base_schema
            && bases.is_empty()
        {
            return Err(SchemaError::structure(
                "base schema cannot be empty list",
                None,
            ));
        }

        let property_names = if self.base_schema.is_some() {
            self.property_names.take()
        } else {
            match self.case_convention_schema() {
                Some(detected) if self.property_names.is_none() => {
                    if let Some(tags) = detected.annotations().tags.clone() {
                        for (k, v) in tags {
                            annotations.set_tag(k, v);
                        }
                    }
                    Some(detected)
                }
                Some(_) => {
                    tracing::warn!(
                        "propertyNames and naming convention detection are mutually exclusive; \
                         add `namingConvention: ignore` to the schema"
                    );
                    self.property_names.take()
                }
                None => self.property_names.take(),
            }
        };

        Ok(ObjectSchema {
            annotations,
            properties: self.properties,
            pattern_properties: self.pattern_properties,
            additional_properties: self.additional_properties.map(Box::new),
            required: self.required,
            closed: self.closed,
            property_names: property_names.map(Box::new),
            naming_convention: self.naming_convention,
            base_schema: self.base_schema,
        })
    }

    /// The `propertyNames` schema implied by the naming convention, if any.
    fn case_convention_schema(&self) -> Option<Schema> {
        let keys: Vec<&str> = self.properties.keys().map(|k| k.as_str()).collect();
        let (rule, list) = match &self.naming_convention {
            Some(NamingConvention::Ignore) => return None,
            Some(NamingConvention::Conventions(conventions)) => {
                if conventions.is_empty() {
                    return None;
                }
                let rule = KeyNamingRule {
                    excluded: Vec::new(),
                    conventions: conventions.clone(),
                };
                (rule, conventions.clone())
            }
            None => {
                let detected = detect_conventions(keys.iter().copied())?;
                let rule = KeyNamingRule {
                    excluded: detected.near_misses,
                    conventions: Vec::new(),
                };
                (rule, detected.conventions)
            }
        };

        let mut annotations = SchemaAnnotations {
            error_message: Some(format!(
                "property ${{value}} does not match case convention {}",
                keys.join(",")
            )),
            ..Default::default()
        };
        annotations.set_tag(
            "case-convention",
            Value::Array(list.iter().map(|c| json!(c.as_str())).collect()),
        );
        annotations.set_tag("error-importance", json!(-5));
        annotations.set_tag("case-detection", json!(true));

        Some(Schema::String(StringSchema {
            annotations,
            pattern: None,
            naming: Some(rule),
        }))
    }
}
