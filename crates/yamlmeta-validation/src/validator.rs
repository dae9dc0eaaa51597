//! YAML validation engine
//!
//! The validator walks an [`AnnotatedParse`] and a [`Schema`] together and
//! records every violation it finds. It never stops at the first failure:
//! the localizer needs the complete error set to decide which errors to
//! report.
//!
//! Each error carries two paths. The instance path is the trail of keys and
//! indices into the document. The schema path is the trail of schema type
//! names, keywords and `anyOf`/`allOf` branch indices into the schema, e.g.
//! `object.properties.toc.boolean.type`. When a subtree ends up valid, the
//! errors recorded inside it are discarded, so a passing `anyOf` leaves no
//! trace of its failing branches.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use yamlmeta_annotated::{AnnotatedParse, PathSegment};
use yamlmeta_mapped_text::MappedText;

use crate::config::LocalizerConfig;
use crate::error::{Result, SchemaError, SchemaResult};
use crate::localize::{ErrorLocalizer, LocalizedError};
use crate::schema::{
    ArraySchema, NumberSchema, ObjectSchema, Schema, SchemaPath, SchemaRegistry, StringSchema,
};

/// Detail of a raw error beyond its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorParams {
    None,
    /// A key that the object does not allow (`closed`, or
    /// `additionalProperties: false`). The violating node is the key.
    InvalidKey { key: String },
    /// Required properties that are absent. Holds one name per raw error;
    /// narrowing may merge alternatives into one error.
    MissingProperty { properties: Vec<String> },
}

/// Identifies the `anyOf` branch an error was recorded under.
///
/// Every `anyOf` visited during one validation gets its own `site` number,
/// so errors from the same combinator can be told apart from errors of an
/// identical combinator reached through another path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchMark {
    pub site: usize,
    pub branch: usize,
}

/// One violation found by the validator.
#[derive(Debug, Clone)]
pub struct RawError<'a> {
    pub instance_path: Vec<PathSegment>,
    pub schema_path: SchemaPath,
    /// Last schema path segment, e.g. `type` or `required`.
    pub keyword: String,
    /// The failing subschema.
    pub schema: Schema,
    pub violating: &'a AnnotatedParse,
    pub message: String,
    pub params: ErrorParams,
    /// `anyOf` branches enclosing the failure, outermost first.
    pub branches: Vec<BranchMark>,
}

/// Traversal state of one validation pass.
///
/// The buffers are reset at the start of every pass, so a context can be
/// kept and reused. Compiled patterns are kept across passes.
#[derive(Debug, Default)]
pub struct ValidationContext {
    instance_path: Vec<PathSegment>,
    schema_path: SchemaPath,
    branches: Vec<BranchMark>,
    next_site: usize,
    /// (schema, node) pairs entered through a reference and not yet left.
    active: Vec<(usize, usize)>,
    patterns: HashMap<String, Regex>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.instance_path.clear();
        self.schema_path.clear();
        self.branches.clear();
        self.next_site = 0;
        self.active.clear();
    }

    fn regex(&mut self, pattern: &str) -> SchemaResult<Regex> {
        if let Some(re) = self.patterns.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern).map_err(|e| SchemaError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        self.patterns.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    /// Validate `value` against `schema`, returning every violation.
    ///
    /// The only failures are schema problems met along the way, such as a
    /// reference that does not resolve.
    pub fn validate<'a>(
        &mut self,
        value: &'a AnnotatedParse,
        schema: &Schema,
        registry: &SchemaRegistry,
    ) -> SchemaResult<Vec<RawError<'a>>> {
        self.reset();
        let mut walk = Walk {
            ctx: self,
            registry,
            errors: Vec::new(),
        };
        let valid = walk.generic(value, schema)?;
        tracing::trace!(valid, errors = walk.errors.len(), "Validation pass finished");
        Ok(walk.errors)
    }
}

/// Validate `value` against `schema` in collect-all mode.
///
/// ```
/// use yamlmeta_mapped_text::MappedText;
/// use yamlmeta_validation::schema::{Schema, SchemaRegistry};
/// use yamlmeta_validation::validator::validate_value;
///
/// let schema = Schema::from_yaml_str("object:\n  properties:\n    toc: boolean\n").unwrap();
/// let doc = yamlmeta_annotated::parse(&MappedText::from_literal("toc: 3\n", None)).unwrap();
/// let errors = validate_value(&doc, &schema, &SchemaRegistry::new()).unwrap();
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors[0].keyword, "type");
/// ```
pub fn validate_value<'a>(
    value: &'a AnnotatedParse,
    schema: &Schema,
    registry: &SchemaRegistry,
) -> Result<Vec<RawError<'a>>> {
    Ok(ValidationContext::new().validate(value, schema, registry)?)
}

struct Walk<'c, 'a> {
    ctx: &'c mut ValidationContext,
    registry: &'c SchemaRegistry,
    errors: Vec<RawError<'a>>,
}

/// Scalars carrying an application tag (`!expr`) decode to a
/// `{tag, value}` mapping that is not a YAML mapping.
fn is_tagged_scalar(value: &AnnotatedParse) -> bool {
    value.kind.is_scalar() && value.tag.as_deref().is_some_and(|t| !t.starts_with("!!"))
}

fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

impl<'a> Walk<'_, 'a> {
    fn with_schema_path(
        &mut self,
        segment: impl Into<PathSegment>,
        f: impl FnOnce(&mut Self) -> SchemaResult<bool>,
    ) -> SchemaResult<bool> {
        self.ctx.schema_path.push(segment.into());
        let mark = self.errors.len();
        let result = f(self);
        self.ctx.schema_path.pop();
        let valid = result?;
        if valid {
            self.errors.truncate(mark);
        }
        Ok(valid)
    }

    fn with_instance_path<R>(
        &mut self,
        segment: impl Into<PathSegment>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.ctx.instance_path.push(segment.into());
        let result = f(self);
        self.ctx.instance_path.pop();
        result
    }

    fn error(
        &mut self,
        value: &'a AnnotatedParse,
        schema: &Schema,
        message: impl Into<String>,
        params: ErrorParams,
    ) {
        let keyword = self
            .ctx
            .schema_path
            .last()
            .map(|s| s.to_string())
            .unwrap_or_default();
        self.errors.push(RawError {
            instance_path: self.ctx.instance_path.clone(),
            schema_path: self.ctx.schema_path.clone(),
            keyword,
            schema: schema.clone(),
            violating: value,
            message: message.into(),
            params,
            branches: self.ctx.branches.clone(),
        });
    }

    /// Record a failure one schema path segment below the current one.
    fn fail_at(
        &mut self,
        segment: &str,
        value: &'a AnnotatedParse,
        schema: &Schema,
        message: impl Into<String>,
    ) -> bool {
        self.ctx.schema_path.push(segment.into());
        self.error(value, schema, message, ErrorParams::None);
        self.ctx.schema_path.pop();
        false
    }

    fn type_is_valid(&mut self, value: &'a AnnotatedParse, schema: &Schema, valid: bool) -> bool {
        valid || self.fail_at("type", value, schema, "type mismatch")
    }

    fn generic(&mut self, value: &'a AnnotatedParse, schema: &Schema) -> SchemaResult<bool> {
        if let Schema::Ref(_) = schema {
            return self.reference(value, schema);
        }
        self.with_schema_path(schema.type_name(), |w| match schema {
            Schema::False => {
                w.error(value, schema, "false", ErrorParams::None);
                Ok(false)
            }
            Schema::Any(_) => Ok(true),
            Schema::Boolean(_) => Ok(w.type_is_valid(value, schema, value.result.is_boolean())),
            Schema::Number(s) => Ok(w.number(value, schema, s)),
            Schema::String(s) => w.string(value, schema, s),
            Schema::Null(_) => Ok(w.type_is_valid(value, schema, value.result.is_null())),
            Schema::Enum(s) => {
                if s.values.iter().any(|v| json_equal(v, &value.result)) {
                    return Ok(true);
                }
                w.error(value, schema, "must match one of the values", ErrorParams::None);
                Ok(false)
            }
            Schema::AnyOf(s) => w.any_of(value, &s.schemas),
            Schema::AllOf(s) => w.all_of(value, &s.schemas),
            Schema::Array(s) => w.array(value, schema, s),
            Schema::Object(s) => w.object(value, schema, s),
            Schema::Ref(_) => w.reference(value, schema),
        })
    }

    /// References add no schema path segment. Re-entering a (schema, node)
    /// pair that is still being validated fails without an error.
    fn reference(&mut self, value: &'a AnnotatedParse, schema: &Schema) -> SchemaResult<bool> {
        let resolved = self.registry.resolve(schema)?;
        let key = (
            &*resolved as *const Schema as usize,
            value as *const AnnotatedParse as usize,
        );
        if self.ctx.active.contains(&key) {
            tracing::trace!(
                schema_id = resolved.id().unwrap_or_default(),
                "Reference re-entered on the same value"
            );
            return Ok(false);
        }
        self.ctx.active.push(key);
        let result = self.generic(value, &resolved);
        self.ctx.active.pop();
        result
    }

    fn number(
        &mut self,
        value: &'a AnnotatedParse,
        schema: &Schema,
        number: &NumberSchema,
    ) -> bool {
        let Some(v) = value.result.as_f64() else {
            return self.type_is_valid(value, schema, false);
        };
        let shown = &value.result;
        let mut valid = true;
        if let Some(min) = number.minimum
            && v < min
        {
            valid = self.fail_at(
                "minimum",
                value,
                schema,
                format!("value {} is less than required minimum {}", shown, min),
            );
        }
        if let Some(max) = number.maximum
            && v > max
        {
            valid = self.fail_at(
                "maximum",
                value,
                schema,
                format!("value {} is greater than required maximum {}", shown, max),
            );
        }
        if let Some(min) = number.exclusive_minimum
            && v <= min
        {
            valid = self.fail_at(
                "exclusiveMinimum",
                value,
                schema,
                format!(
                    "value {} is less than or equal to required (exclusive) minimum {}",
                    shown, min
                ),
            );
        }
        if let Some(max) = number.exclusive_maximum
            && v >= max
        {
            valid = self.fail_at(
                "exclusiveMaximum",
                value,
                schema,
                format!(
                    "value {} is greater than or equal to required (exclusive) maximum {}",
                    shown, max
                ),
            );
        }
        valid
    }

    fn string(
        &mut self,
        value: &'a AnnotatedParse,
        schema: &Schema,
        string: &StringSchema,
    ) -> SchemaResult<bool> {
        let Some(text) = value.result.as_str() else {
            return Ok(self.type_is_valid(value, schema, false));
        };
        if let Some(pattern) = &string.pattern
            && !self.ctx.regex(pattern)?.is_match(text)
        {
            return Ok(self.fail_at("pattern", value, schema, "value doesn't match pattern"));
        }
        if let Some(rule) = &string.naming
            && !rule.accepts(text)
        {
            return Ok(self.fail_at("pattern", value, schema, "value doesn't match pattern"));
        }
        Ok(true)
    }

    fn any_of(&mut self, value: &'a AnnotatedParse, branches: &[Schema]) -> SchemaResult<bool> {
        let site = self.ctx.next_site;
        self.ctx.next_site += 1;
        let mut passing = 0;
        for (index, branch) in branches.iter().enumerate() {
            self.ctx.branches.push(BranchMark { site, branch: index });
            let result = self.with_schema_path(index, |w| w.generic(value, branch));
            self.ctx.branches.pop();
            if result? {
                passing += 1;
            }
        }
        Ok(passing > 0)
    }

    fn all_of(&mut self, value: &'a AnnotatedParse, branches: &[Schema]) -> SchemaResult<bool> {
        let mut valid = true;
        for (index, branch) in branches.iter().enumerate() {
            valid &= self.with_schema_path(index, |w| w.generic(value, branch))?;
        }
        Ok(valid)
    }

    fn array(
        &mut self,
        value: &'a AnnotatedParse,
        schema: &Schema,
        array: &ArraySchema,
    ) -> SchemaResult<bool> {
        let Some(items) = value.result.as_array() else {
            return Ok(self.type_is_valid(value, schema, false));
        };
        let length = items.len();
        let mut valid = true;
        if let Some(min) = array.min_items
            && length < min
        {
            valid = self.fail_at(
                "minItems",
                value,
                schema,
                format!(
                    "array should have at least {} items but has {} items instead",
                    min, length
                ),
            );
        }
        if let Some(max) = array.max_items
            && length > max
        {
            valid = self.fail_at(
                "maxItems",
                value,
                schema,
                format!(
                    "array should have at most {} items but has {} items instead",
                    max, length
                ),
            );
        }
        if let Some(item_schema) = array.items.as_deref() {
            valid &= self.with_schema_path("items", |w| {
                let mut valid = true;
                for (index, item) in value.components.iter().enumerate() {
                    valid &= w.with_instance_path(index, |w| w.generic(item, item_schema))?;
                }
                Ok(valid)
            })?;
        }
        Ok(valid)
    }

    fn object(
        &mut self,
        value: &'a AnnotatedParse,
        schema: &Schema,
        object: &ObjectSchema,
    ) -> SchemaResult<bool> {
        if !self.type_is_valid(
            value,
            schema,
            value.result.is_object() && !is_tagged_scalar(value),
        ) {
            return Ok(false);
        }

        // Later duplicates win, at the position of the first occurrence.
        let mut entries: IndexMap<String, (&'a AnnotatedParse, &'a AnnotatedParse)> =
            IndexMap::new();
        for (key, item) in value.pairs() {
            entries.insert(key.key_string(), (key, item));
        }

        let mut valid = true;
        let mut inspected: HashSet<&str> = HashSet::new();

        if object.closed {
            valid &= self.with_schema_path("closed", |w| {
                let mut valid = true;
                for (key, &(key_node, _)) in &entries {
                    if !object.properties.contains_key(key) {
                        w.error(
                            key_node,
                            schema,
                            format!("object has invalid field {}", key),
                            ErrorParams::InvalidKey { key: key.clone() },
                        );
                        valid = false;
                    }
                }
                Ok(valid)
            })?;
        }

        if !object.properties.is_empty() {
            valid &= self.with_schema_path("properties", |w| {
                let mut valid = true;
                for (key, &(_, item)) in &entries {
                    let Some(property) = object.properties.get(key) else {
                        continue;
                    };
                    inspected.insert(key.as_str());
                    valid &= w.with_instance_path(key.as_str(), |w| {
                        w.with_schema_path(key.as_str(), |w| w.generic(item, property))
                    })?;
                }
                Ok(valid)
            })?;
        }

        if !object.pattern_properties.is_empty() {
            valid &= self.with_schema_path("patternProperties", |w| {
                let mut valid = true;
                for (pattern, property) in &object.pattern_properties {
                    let re = w.ctx.regex(pattern)?;
                    for (key, &(_, item)) in &entries {
                        if !re.is_match(key) {
                            continue;
                        }
                        inspected.insert(key.as_str());
                        valid &= w.with_instance_path(key.as_str(), |w| {
                            w.with_schema_path(pattern.as_str(), |w| w.generic(item, property))
                        })?;
                    }
                }
                Ok(valid)
            })?;
        }

        if let Some(additional) = object.additional_properties.as_deref() {
            valid &= self.with_schema_path("additionalProperties", |w| {
                let mut valid = true;
                for (key, &(key_node, item)) in &entries {
                    if inspected.contains(key.as_str()) {
                        continue;
                    }
                    if matches!(additional, Schema::False) {
                        w.error(
                            key_node,
                            schema,
                            format!("object has invalid field {}", key),
                            ErrorParams::InvalidKey { key: key.clone() },
                        );
                        valid = false;
                    } else {
                        valid &= w
                            .with_instance_path(key.as_str(), |w| w.generic(item, additional))?;
                    }
                }
                Ok(valid)
            })?;
        }

        if let Some(names) = object.property_names.as_deref() {
            valid &= self.with_schema_path("propertyNames", |w| {
                let mut valid = true;
                for &(key_node, _) in entries.values() {
                    valid &= w.generic(key_node, names)?;
                }
                Ok(valid)
            })?;
        }

        if !object.required.is_empty() {
            valid &= self.with_schema_path("required", |w| {
                let mut valid = true;
                for property in &object.required {
                    if !entries.contains_key(property) {
                        w.error(
                            value,
                            schema,
                            format!("object is missing required property {}", property),
                            ErrorParams::MissingProperty {
                                properties: vec![property.clone()],
                            },
                        );
                        valid = false;
                    }
                }
                Ok(valid)
            })?;
        }

        Ok(valid)
    }
}

/// A compiled validator for one schema.
///
/// A validator keeps traversal state between passes and so cannot run two
/// validations at once; [`crate::queue::ValidatorQueue`] serializes access
/// per schema id.
pub struct SchemaValidator {
    schema: Arc<Schema>,
    registry: Arc<SchemaRegistry>,
    localizer: ErrorLocalizer,
    context: ValidationContext,
}

impl SchemaValidator {
    pub fn new(schema: Arc<Schema>, registry: Arc<SchemaRegistry>) -> Self {
        Self::with_config(schema, registry, LocalizerConfig::default())
    }

    pub fn with_config(
        schema: Arc<Schema>,
        registry: Arc<SchemaRegistry>,
        config: LocalizerConfig,
    ) -> Self {
        SchemaValidator {
            localizer: ErrorLocalizer::new(registry.clone(), config),
            schema,
            registry,
            context: ValidationContext::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn localizer(&self) -> &ErrorLocalizer {
        &self.localizer
    }

    /// Mutable access to the localizer, e.g. to append handlers.
    pub fn localizer_mut(&mut self) -> &mut ErrorLocalizer {
        &mut self.localizer
    }

    /// Validate and localize. An empty list means the document is valid.
    pub fn validate(
        &mut self,
        annotation: &AnnotatedParse,
        source: &MappedText,
    ) -> Result<Vec<LocalizedError>> {
        let errors = self
            .context
            .validate(annotation, &self.schema, &self.registry)?;
        if errors.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(
            schema_id = self.schema.id().unwrap_or_default(),
            raw_errors = errors.len(),
            "Localizing validation errors"
        );
        self.localizer
            .localize(errors, annotation, source, &self.schema)
    }
}
