//! Schema registry
//!
//! Registered schemas are compiled (eager references resolved, `extends`
//! merged) and immutable. The registry only grows.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, RwLock};

use super::Schema;
use super::merge::compile;
use crate::error::{SchemaError, SchemaResult};

/// A schema either borrowed from a caller or shared out of the registry.
#[derive(Debug, Clone)]
pub enum SchemaRef<'a> {
    Borrowed(&'a Schema),
    Shared(Arc<Schema>),
}

impl Deref for SchemaRef<'_> {
    type Target = Schema;

    fn deref(&self) -> &Schema {
        match self {
            SchemaRef::Borrowed(s) => s,
            SchemaRef::Shared(s) => s,
        }
    }
}

impl<'a> From<&'a Schema> for SchemaRef<'a> {
    fn from(schema: &'a Schema) -> Self {
        SchemaRef::Borrowed(schema)
    }
}

impl From<Arc<Schema>> for SchemaRef<'_> {
    fn from(schema: Arc<Schema>) -> Self {
        SchemaRef::Shared(schema)
    }
}

fn same_schema(a: &Schema, b: &Schema) -> bool {
    std::ptr::eq(a, b) || a == b
}

fn chain_label(schema: &Schema) -> String {
    match schema {
        Schema::Ref(r) => r.reference.clone(),
        other => other.id().unwrap_or(other.type_name()).to_string(),
    }
}

/// Follow a chain of indirections (references, `complete-from` tags) with
/// a two-pointer cycle detector.
///
/// The slow cursor takes one step per round and the fast cursor two. If
/// the fast cursor can still move and meets the slow one, the chain is a
/// cycle. Following a chain of length `n` costs at most `3n` steps.
pub(crate) fn follow_chain<'a>(
    start: SchemaRef<'a>,
    has_next: impl Fn(&Schema) -> bool,
    next: impl Fn(&Schema) -> SchemaResult<SchemaRef<'a>>,
) -> SchemaResult<SchemaRef<'a>> {
    if !has_next(&start) {
        return Ok(start);
    }
    let mut slow = start.clone();
    let mut fast = start;
    loop {
        slow = next(&slow)?;
        let mut stopped = false;
        for _ in 0..2 {
            if !stopped && has_next(&fast) {
                fast = next(&fast)?;
            } else {
                stopped = true;
            }
        }
        if !stopped && same_schema(&slow, &fast) {
            let id = chain_label(&slow);
            tracing::warn!(schema_id = %id, "Schema reference cycle detected");
            return Err(SchemaError::Cycle { id });
        }
        if !has_next(&slow) {
            return Ok(slow);
        }
    }
}

/// Process-wide or injected store of schemas by `$id`.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Schema>> {
        let schemas = self.schemas.read().unwrap_or_else(|e| e.into_inner());
        schemas.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        let schemas = self.schemas.read().unwrap_or_else(|e| e.into_inner());
        schemas.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.schemas.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let schemas = self.schemas.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = schemas.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Compile and register `schema` under its `$id`.
    ///
    /// Defining an id that is already registered is a no-op that returns
    /// the stored schema. References must name registered schemas (or the
    /// schema itself).
    pub fn define(&self, schema: Schema) -> SchemaResult<Arc<Schema>> {
        let id = schema
            .id()
            .ok_or_else(|| SchemaError::structure("schema must have an $id to be defined", None))?
            .to_string();
        if let Some(existing) = self.get(&id) {
            tracing::debug!(schema_id = %id, "Schema already defined");
            return Ok(existing);
        }
        tracing::debug!(schema_id = %id, "Defining schema");

        let pending = HashMap::from([(id.clone(), &schema)]);
        let compiled = compile(&schema, self, &pending)?;
        self.check_references(&compiled, |r| r == id)?;
        Ok(self.insert(id, compiled))
    }

    /// Define several schemas that may refer to each other.
    ///
    /// Nothing is registered when any member fails.
    pub fn define_all(&self, schemas: Vec<Schema>) -> SchemaResult<Vec<Arc<Schema>>> {
        let mut pending: HashMap<String, &Schema> = HashMap::new();
        for schema in &schemas {
            let id = schema.id().ok_or_else(|| {
                SchemaError::structure("schema must have an $id to be defined", None)
            })?;
            pending.insert(id.to_string(), schema);
        }

        let mut compiled = Vec::with_capacity(schemas.len());
        for schema in &schemas {
            let result = compile(schema, self, &pending)?;
            self.check_references(&result, |r| pending.contains_key(r))?;
            compiled.push(result);
        }

        tracing::debug!(count = compiled.len(), "Defining schema batch");
        Ok(compiled
            .into_iter()
            .map(|schema| {
                let id = schema.id().unwrap_or_default().to_string();
                self.insert(id, schema)
            })
            .collect())
    }

    fn insert(&self, id: String, schema: Schema) -> Arc<Schema> {
        let mut schemas = self.schemas.write().unwrap_or_else(|e| e.into_inner());
        schemas.entry(id).or_insert_with(|| Arc::new(schema)).clone()
    }

    fn check_references(
        &self,
        schema: &Schema,
        allowed: impl Fn(&str) -> bool,
    ) -> SchemaResult<()> {
        for reference in schema.references() {
            if !allowed(reference) && !self.contains(reference) {
                return Err(SchemaError::UnresolvedRef(reference.to_string()));
            }
        }
        Ok(())
    }

    /// Follow `Ref` links until a concrete schema is reached.
    pub fn resolve<'a>(&self, schema: &'a Schema) -> SchemaResult<SchemaRef<'a>> {
        self.resolve_ref(SchemaRef::Borrowed(schema))
    }

    /// [`SchemaRegistry::resolve`] for a schema that may already be shared.
    pub fn resolve_ref<'a>(&self, schema: SchemaRef<'a>) -> SchemaResult<SchemaRef<'a>> {
        follow_chain(
            schema,
            |s| matches!(s, Schema::Ref(_)),
            |s| match s {
                Schema::Ref(r) => self
                    .get(&r.reference)
                    .map(SchemaRef::Shared)
                    .ok_or_else(|| SchemaError::UnresolvedRef(r.reference.clone())),
                _ => Ok(SchemaRef::Shared(Arc::new(s.clone()))),
            },
        )
    }

    /// Look up `id` and resolve it.
    pub fn resolve_id(&self, id: &str) -> SchemaResult<Arc<Schema>> {
        let schema = self
            .get(id)
            .ok_or_else(|| SchemaError::UnresolvedRef(id.to_string()))?;
        match self.resolve(&schema)? {
            SchemaRef::Shared(resolved) => Ok(resolved),
            SchemaRef::Borrowed(_) => Ok(schema.clone()),
        }
    }
}

static GLOBAL_REGISTRY: Lazy<Arc<SchemaRegistry>> = Lazy::new(|| Arc::new(SchemaRegistry::new()));

/// The process-wide registry.
pub fn global_registry() -> Arc<SchemaRegistry> {
    GLOBAL_REGISTRY.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{NumberSchema, RefSchema};

    fn reference(target: &str) -> Schema {
        Schema::Ref(RefSchema {
            reference: target.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_define_requires_id() {
        let registry = SchemaRegistry::new();
        let err = registry
            .define(Schema::Number(NumberSchema::default()))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidStructure { .. }));
    }

    #[test]
    fn test_define_is_idempotent() {
        let registry = SchemaRegistry::new();
        let first = registry
            .define(Schema::Number(NumberSchema::default()).with_id("n"))
            .unwrap();
        let second = registry
            .define(Schema::Boolean(Default::default()).with_id("n"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let registry = SchemaRegistry::new();
        let err = registry.define(reference("missing").with_id("a")).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedRef(ref r) if r == "missing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_chain() {
        let registry = SchemaRegistry::new();
        registry
            .define(Schema::Number(NumberSchema::default()).with_id("n"))
            .unwrap();
        registry.define(reference("n").with_id("alias")).unwrap();
        let start = reference("alias");
        let resolved = registry.resolve(&start).unwrap();
        assert_eq!(resolved.type_name(), "number");
    }

    #[test]
    fn test_resolve_detects_cycle() {
        let registry = SchemaRegistry::new();
        registry
            .define_all(vec![reference("b").with_id("a"), reference("a").with_id("b")])
            .unwrap();
        let start = reference("a");
        let err = registry.resolve(&start).unwrap_err();
        assert!(matches!(err, SchemaError::Cycle { .. }));
    }

    #[test]
    fn test_self_reference_cycle() {
        let registry = SchemaRegistry::new();
        registry.define(reference("me").with_id("me")).unwrap();
        assert!(matches!(
            registry.resolve_id("me"),
            Err(SchemaError::Cycle { .. })
        ));
    }
}
