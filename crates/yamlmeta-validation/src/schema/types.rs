//! Schema type definitions
//!
//! Each variant of [`Schema`] has a struct here carrying the common
//! [`SchemaAnnotations`] plus the constraints of that type.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Schema;
use crate::text::CaseConvention;

/// Naming convention requested for the keys of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamingConvention {
    /// `namingConvention: ignore` turns detection off.
    Ignore,
    /// Keys must follow one of these conventions.
    Conventions(Vec<CaseConvention>),
}

/// Annotations that can be attached to any schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaAnnotations {
    /// Schema identifier for references
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The "must ..." phrase used in error messages, e.g. "be a number".
    /// When absent, [`Schema::description`] derives one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Human-facing documentation shown next to completions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,

    /// Custom error heading; supports `${value}`, `${key}`, `${location}`
    /// and `${fullPath}`.
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<Vec<String>>,

    /// The completion list is all there is; editors should not offer
    /// free-form input.
    #[serde(
        rename = "exhaustiveCompletions",
        skip_serializing_if = "Option::is_none"
    )]
    pub exhaustive_completions: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<IndexMap<String, serde_json::Value>>,
}

impl SchemaAnnotations {
    pub fn tag(&self, name: &str) -> Option<&serde_json::Value> {
        self.tags.as_ref().and_then(|t| t.get(name))
    }

    pub fn set_tag(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.tags
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), value);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanSchema {
    pub annotations: SchemaAnnotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberSchema {
    pub annotations: SchemaAnnotations,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
}

/// Restriction on the spelling of object keys, produced by naming
/// convention detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyNamingRule {
    /// Keys that are rejected outright (near misses of declared keys).
    pub excluded: Vec<String>,
    /// When non-empty, keys showing a convention must show one of these.
    pub conventions: Vec<CaseConvention>,
}

impl KeyNamingRule {
    pub fn accepts(&self, key: &str) -> bool {
        if self.excluded.iter().any(|k| k == key) {
            return false;
        }
        if self.conventions.is_empty() {
            return true;
        }
        match crate::text::detect_case_convention(key) {
            Some(found) => self.conventions.contains(&found),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringSchema {
    pub annotations: SchemaAnnotations,
    /// Unanchored regular expression the value must match.
    pub pattern: Option<String>,
    pub naming: Option<KeyNamingRule>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullSchema {
    pub annotations: SchemaAnnotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumSchema {
    pub annotations: SchemaAnnotations,
    pub values: Vec<serde_json::Value>,
}

/// Any value validates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnySchema {
    pub annotations: SchemaAnnotations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnyOfSchema {
    pub annotations: SchemaAnnotations,
    pub schemas: Vec<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllOfSchema {
    pub annotations: SchemaAnnotations,
    pub schemas: Vec<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArraySchema {
    pub annotations: SchemaAnnotations,
    pub items: Option<Box<Schema>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub annotations: SchemaAnnotations,
    pub properties: IndexMap<String, Schema>,
    pub pattern_properties: IndexMap<String, Schema>,
    /// `Some(Schema::False)` forbids keys outside `properties` and
    /// `pattern_properties`.
    pub additional_properties: Option<Box<Schema>>,
    pub required: Vec<String>,
    /// No keys beyond `properties` are allowed.
    pub closed: bool,
    /// Schema every key must satisfy.
    pub property_names: Option<Box<Schema>>,
    pub naming_convention: Option<NamingConvention>,
    /// Bases of an `extends` merge (the `super` field), resolved at
    /// compile time. May hold eager refs.
    pub base_schema: Option<Vec<Schema>>,
}

/// Reference to a registered schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefSchema {
    pub annotations: SchemaAnnotations,
    pub reference: String,
    /// Resolved while compiling (`resolveRef`) rather than at validation
    /// time (`ref`).
    pub eager: bool,
}
