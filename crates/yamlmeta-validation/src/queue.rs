//! Shared validators for concurrent callers
//!
//! A [`SchemaValidator`] keeps mutable traversal state, so one instance
//! must not run two validations at once. The queue keeps one validator per
//! schema id and hands it out to one caller at a time; callers validating
//! against the same schema wait in line, callers using different schemas
//! run side by side.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use yamlmeta_annotated::AnnotatedParse;
use yamlmeta_mapped_text::MappedText;

use crate::config::LocalizerConfig;
use crate::error::Result;
use crate::localize::LocalizedError;
use crate::schema::{Schema, SchemaRegistry};
use crate::validator::SchemaValidator;

/// Validators keyed by schema id, each behind its own lock.
pub struct ValidatorQueue {
    registry: Arc<SchemaRegistry>,
    config: LocalizerConfig,
    validators: RwLock<HashMap<String, Arc<Mutex<SchemaValidator>>>>,
}

impl ValidatorQueue {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self::with_config(registry, LocalizerConfig::default())
    }

    pub fn with_config(registry: Arc<SchemaRegistry>, config: LocalizerConfig) -> Self {
        ValidatorQueue {
            registry,
            config,
            validators: RwLock::new(HashMap::new()),
        }
    }

    fn build(&self, schema: Arc<Schema>) -> SchemaValidator {
        SchemaValidator::with_config(schema, self.registry.clone(), self.config.clone())
    }

    async fn validator_for(&self, schema: &Schema) -> Arc<Mutex<SchemaValidator>> {
        // Schemas without an id cannot be told apart; each call gets its
        // own validator.
        let Some(id) = schema.id() else {
            return Arc::new(Mutex::new(self.build(Arc::new(schema.clone()))));
        };
        if let Some(validator) = self.validators.read().await.get(id) {
            return validator.clone();
        }
        let mut validators = self.validators.write().await;
        validators
            .entry(id.to_string())
            .or_insert_with(|| {
                let schema = self
                    .registry
                    .get(id)
                    .unwrap_or_else(|| Arc::new(schema.clone()));
                Arc::new(Mutex::new(self.build(schema)))
            })
            .clone()
    }

    /// Run `f` with exclusive use of the validator for `schema`.
    pub async fn with_validator<R>(
        &self,
        schema: &Schema,
        f: impl FnOnce(&mut SchemaValidator) -> R,
    ) -> R {
        let validator = self.validator_for(schema).await;
        let mut guard = match validator.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(
                    schema_id = schema.id().unwrap_or_default(),
                    "Waiting for validator"
                );
                validator.lock().await
            }
        };
        f(&mut guard)
    }

    /// Validate `annotation` against `schema` and localize the errors.
    pub async fn validate(
        &self,
        schema: &Schema,
        annotation: &AnnotatedParse,
        source: &MappedText,
    ) -> Result<Vec<LocalizedError>> {
        self.with_validator(schema, |validator| validator.validate(annotation, source))
            .await
    }

    /// Number of cached validators.
    pub async fn len(&self) -> usize {
        self.validators.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.validators.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn document(yaml: &str) -> (MappedText, AnnotatedParse) {
        let source = MappedText::from_literal(yaml, None);
        let doc = yamlmeta_annotated::parse(&source).unwrap();
        (source, doc)
    }

    fn defined(registry: &SchemaRegistry, yaml: &str, id: &str) -> Arc<Schema> {
        registry
            .define(Schema::from_yaml_str(yaml).unwrap().with_id(id))
            .unwrap()
    }

    // ========================================================================
    // Exclusive use
    // ========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_caller_per_schema_at_a_time() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = defined(&registry, "number\n", "count");
        let queue = Arc::new(ValidatorQueue::new(registry));
        let running = Arc::new(AtomicUsize::new(0));
        let most = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let (queue, schema) = (queue.clone(), schema.clone());
            let (running, most) = (running.clone(), most.clone());
            tasks.push(tokio::spawn(async move {
                queue
                    .with_validator(&schema, |_| {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        most.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(5));
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(most.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_schemas_run_side_by_side() {
        let registry = Arc::new(SchemaRegistry::new());
        let a = defined(&registry, "number\n", "a");
        let b = defined(&registry, "string\n", "b");
        let queue = Arc::new(ValidatorQueue::new(registry));
        let inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for schema in [a, b] {
            let (queue, inside) = (queue.clone(), inside.clone());
            tasks.push(tokio::spawn(async move {
                queue
                    .with_validator(&schema, |_| {
                        inside.fetch_add(1, Ordering::SeqCst);
                        let deadline = Instant::now() + Duration::from_secs(2);
                        while inside.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
                            std::thread::yield_now();
                        }
                        inside.load(Ordering::SeqCst)
                    })
                    .await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), 2);
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_waiting_callers_are_served_in_order() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = defined(&registry, "number\n", "count");
        let queue = Arc::new(ValidatorQueue::new(registry));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let validator = queue.validator_for(&schema).await;
        let held = validator.lock().await;
        let mut tasks = Vec::new();
        for i in 0..4 {
            let (queue, schema, order) = (queue.clone(), schema.clone(), order.clone());
            tasks.push(tokio::spawn(async move {
                queue
                    .with_validator(&schema, |_| order.lock().unwrap().push(i))
                    .await
            }));
            // let the task reach the lock before spawning the next one
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
        }
        assert!(order.lock().unwrap().is_empty());
        drop(held);
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    // ========================================================================
    // Failures
    // ========================================================================

    #[tokio::test]
    async fn test_failed_call_releases_validator() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = defined(&registry, "number\n", "count");
        let queue = ValidatorQueue::new(registry);

        let failed: std::result::Result<(), &str> =
            queue.with_validator(&schema, |_| Err("no")).await;
        assert!(failed.is_err());

        let (source, doc) = document("x\n");
        assert_eq!(queue.validate(&schema, &doc, &source).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_call_releases_validator() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = defined(&registry, "number\n", "count");
        let queue = Arc::new(ValidatorQueue::new(registry));

        let task = {
            let (queue, schema) = (queue.clone(), schema.clone());
            tokio::spawn(async move {
                queue
                    .with_validator::<()>(&schema, |_| panic!("validator callback failed"))
                    .await
            })
        };
        assert!(task.await.unwrap_err().is_panic());

        let (source, doc) = document("4\n");
        assert!(queue.validate(&schema, &doc, &source).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reuses_validator_per_id() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = registry
            .define(Schema::from_yaml_str("number\n").unwrap().with_id("count"))
            .unwrap();
        let queue = ValidatorQueue::new(registry);
        let (source, doc) = document("x\n");

        let first = queue.validate(&schema, &doc, &source).await.unwrap();
        let second = queue.validate(&schema, &doc, &source).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].message, second[0].message);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_anonymous_schemas_are_not_cached() {
        let queue = ValidatorQueue::new(Arc::new(SchemaRegistry::new()));
        let schema = Schema::from_yaml_str("string\n").unwrap();
        let (source, doc) = document("hello\n");
        assert!(queue.validate(&schema, &doc, &source).await.unwrap().is_empty());
        assert!(queue.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_validations_agree() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = registry
            .define(
                Schema::from_yaml_str(
                    "object:\n  properties:\n    toc: boolean\n    n: number\n",
                )
                .unwrap()
                .with_id("doc"),
            )
            .unwrap();
        let queue = Arc::new(ValidatorQueue::new(registry));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let queue = queue.clone();
            let schema = schema.clone();
            tasks.push(tokio::spawn(async move {
                let yaml = if i % 2 == 0 { "toc: 3\nn: x\n" } else { "toc: true\n" };
                let (source, doc) = document(yaml);
                queue.validate(&schema, &doc, &source).await.unwrap().len()
            }));
        }
        for (i, task) in tasks.into_iter().enumerate() {
            let expected = if i % 2 == 0 { 2 } else { 0 };
            assert_eq!(task.await.unwrap(), expected);
        }
    }
}
