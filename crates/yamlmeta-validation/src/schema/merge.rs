//! Schema compilation and `extends` merging
//!
//! Compiling a schema replaces eager references (`resolveRef`) by the
//! schema they name and folds the `super` bases of object schemas into the
//! derived schema. Registered schemas are always compiled.

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};

use super::annotations::overlay_annotations;
use super::registry::SchemaRegistry;
use super::types::{AllOfSchema, AnyOfSchema, ArraySchema, ObjectSchema, SchemaAnnotations};
use super::Schema;
use crate::error::{SchemaError, SchemaResult};

/// Tags that naming convention detection adds to an object.
const CASE_DETECTION_TAGS: [&str; 3] = ["case-convention", "case-detection", "error-importance"];

struct Compiler<'r, 'p> {
    registry: &'r SchemaRegistry,
    /// Schemas being defined together; eager references may point at them.
    pending: &'p HashMap<String, &'p Schema>,
    /// Eager references currently being expanded.
    resolving: Vec<String>,
}

pub(crate) fn compile(
    schema: &Schema,
    registry: &SchemaRegistry,
    pending: &HashMap<String, &Schema>,
) -> SchemaResult<Schema> {
    let mut compiler = Compiler {
        registry,
        pending,
        resolving: Vec::new(),
    };
    compiler.compile(schema)
}

impl Compiler<'_, '_> {
    fn lookup(&mut self, reference: &str) -> SchemaResult<Schema> {
        if self.resolving.iter().any(|r| r == reference) {
            tracing::warn!(schema_id = %reference, "Eager reference cycle detected");
            return Err(SchemaError::Cycle {
                id: reference.to_string(),
            });
        }
        if let Some(found) = self.registry.get(reference) {
            return Ok((*found).clone());
        }
        let Some(found) = self.pending.get(reference).copied() else {
            return Err(SchemaError::UnresolvedRef(reference.to_string()));
        };
        self.resolving.push(reference.to_string());
        let result = self.compile(found);
        self.resolving.pop();
        result
    }

    fn compile(&mut self, schema: &Schema) -> SchemaResult<Schema> {
        match schema {
            Schema::Ref(r) if r.eager => self.lookup(&r.reference),
            Schema::AnyOf(s) => Ok(Schema::AnyOf(AnyOfSchema {
                annotations: s.annotations.clone(),
                schemas: self.compile_all(&s.schemas)?,
            })),
            Schema::AllOf(s) => Ok(Schema::AllOf(AllOfSchema {
                annotations: s.annotations.clone(),
                schemas: self.compile_all(&s.schemas)?,
            })),
            Schema::Array(s) => Ok(Schema::Array(ArraySchema {
                items: self.compile_boxed(&s.items)?,
                ..s.clone()
            })),
            Schema::Object(s) => {
                let mut properties = IndexMap::with_capacity(s.properties.len());
                for (key, value) in &s.properties {
                    properties.insert(key.clone(), self.compile(value)?);
                }
                let mut pattern_properties = IndexMap::with_capacity(s.pattern_properties.len());
                for (key, value) in &s.pattern_properties {
                    pattern_properties.insert(key.clone(), self.compile(value)?);
                }
                let derived = ObjectSchema {
                    annotations: s.annotations.clone(),
                    properties,
                    pattern_properties,
                    additional_properties: self.compile_boxed(&s.additional_properties)?,
                    required: s.required.clone(),
                    closed: s.closed,
                    property_names: self.compile_boxed(&s.property_names)?,
                    naming_convention: s.naming_convention.clone(),
                    base_schema: None,
                };
                match &s.base_schema {
                    Some(bases) => {
                        let bases = bases
                            .iter()
                            .map(|b| self.base_object(b))
                            .collect::<SchemaResult<Vec<_>>>()?;
                        Ok(Schema::Object(merge_object_schemas(&bases, derived)))
                    }
                    None => Ok(Schema::Object(derived)),
                }
            }
            other => Ok(other.clone()),
        }
    }

    fn compile_all(&mut self, schemas: &[Schema]) -> SchemaResult<Vec<Schema>> {
        schemas.iter().map(|s| self.compile(s)).collect()
    }

    fn compile_boxed(&mut self, schema: &Option<Box<Schema>>) -> SchemaResult<Option<Box<Schema>>> {
        match schema {
            Some(s) => Ok(Some(Box::new(self.compile(s)?))),
            None => Ok(None),
        }
    }

    /// A base of `extends`, which must end up being an object schema.
    fn base_object(&mut self, base: &Schema) -> SchemaResult<ObjectSchema> {
        let compiled = match base {
            Schema::Ref(r) => self.lookup(&r.reference)?,
            other => self.compile(other)?,
        };
        let resolved = self.registry.resolve(&compiled)?;
        match &*resolved {
            Schema::Object(object) => Ok(object.clone()),
            other => Err(SchemaError::structure(
                format!(
                    "Base schema must be an object schema, got {}",
                    other.type_name()
                ),
                None,
            )),
        }
    }
}

fn combine(mut schemas: Vec<Schema>, any_of: bool) -> Option<Box<Schema>> {
    match schemas.len() {
        0 => None,
        1 => schemas.pop().map(Box::new),
        _ if any_of => Some(Box::new(Schema::AnyOf(AnyOfSchema {
            annotations: SchemaAnnotations::default(),
            schemas,
        }))),
        _ => Some(Box::new(Schema::AllOf(AllOfSchema {
            annotations: SchemaAnnotations::default(),
            schemas,
        }))),
    }
}

/// Merge base object schemas into `derived`.
///
/// - properties and patternProperties: bases in order, then `derived`; the
///   last declaration of a key wins
/// - `required`: concatenated
/// - additionalProperties: `anyOf` of every declared one
/// - propertyNames: `anyOf` of every declared one, skipping schemas from
///   naming convention detection
/// - closed when `derived` or any base is closed
///
/// Annotations of later bases override earlier ones, the base `$id` is
/// dropped and `derived`'s own annotations are applied last. Two bases
/// declaring the same property is a schema bug; it is logged, not raised.
pub fn merge_object_schemas(bases: &[ObjectSchema], derived: ObjectSchema) -> ObjectSchema {
    let mut annotations = SchemaAnnotations::default();
    for base in bases {
        let mut base_annotations = base.annotations.clone();
        if base_annotations.tag("case-detection").is_some()
            && let Some(tags) = base_annotations.tags.as_mut()
        {
            for tag in CASE_DETECTION_TAGS {
                tags.shift_remove(tag);
            }
        }
        annotations = overlay_annotations(annotations, base_annotations);
    }
    annotations.id = None;
    if bases
        .iter()
        .any(|b| b.annotations.exhaustive_completions == Some(true))
    {
        annotations.exhaustive_completions = Some(true);
    }
    let annotations = overlay_annotations(annotations, derived.annotations);

    let mut owners: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for base in bases {
        for key in base.properties.keys() {
            owners.entry(key.as_str()).or_default().push(
                base.annotations
                    .id
                    .clone()
                    .unwrap_or_else(|| "<anonymous>".to_string()),
            );
        }
    }
    for (property, bases) in owners {
        if bases.len() > 1 {
            let err = SchemaError::DuplicateBaseProperty {
                property: property.to_string(),
                bases,
            };
            tracing::error!("{}", err);
        }
    }

    let mut properties = IndexMap::new();
    let mut pattern_properties = IndexMap::new();
    let mut required = Vec::new();
    let mut additional = Vec::new();
    let mut names = Vec::new();
    for base in bases {
        properties.extend(base.properties.clone());
        pattern_properties.extend(base.pattern_properties.clone());
        required.extend(base.required.iter().cloned());
        if let Some(ap) = &base.additional_properties {
            additional.push((**ap).clone());
        }
        if let Some(pn) = &base.property_names
            && !pn.is_case_detection()
        {
            names.push((**pn).clone());
        }
    }
    properties.extend(derived.properties);
    pattern_properties.extend(derived.pattern_properties);
    required.extend(derived.required);
    if let Some(ap) = derived.additional_properties {
        additional.push(*ap);
    }
    if let Some(pn) = derived.property_names
        && !pn.is_case_detection()
    {
        names.push(*pn);
    }

    ObjectSchema {
        annotations,
        properties,
        pattern_properties,
        additional_properties: combine(additional, true),
        required,
        closed: derived.closed || bases.iter().any(|b| b.closed),
        property_names: combine(names, true),
        naming_convention: derived.naming_convention,
        base_schema: None,
    }
}
