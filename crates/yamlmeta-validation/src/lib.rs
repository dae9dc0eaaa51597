//! # yamlmeta-validation
//!
//! Schema model, validator and error localizer for annotated YAML.
//!
//! Schemas are written in a small declarative YAML vocabulary (`object`,
//! `arrayOf`, `anyOf`, `enum`, `ref`, ...) and registered by `$id` in a
//! [`SchemaRegistry`]. The validator walks an
//! [`AnnotatedParse`](yamlmeta_annotated::AnnotatedParse) and a schema in
//! collect-all mode; the localizer then prunes the raw errors down to the
//! ones worth reporting and explains each with its source location.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use yamlmeta_mapped_text::MappedText;
//! use yamlmeta_validation::{Schema, SchemaRegistry, validate};
//!
//! let registry = Arc::new(SchemaRegistry::new());
//! let schema = Schema::from_yaml_str("object:\n  properties:\n    toc: boolean\n").unwrap();
//!
//! let source = MappedText::from_literal("toc: yes\n", Some("front-matter.yml"));
//! let doc = yamlmeta_annotated::parse(&source).unwrap();
//! let errors = validate(&schema, &doc, &source, &registry).unwrap();
//!
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].nice_error.info["suggestion-fix"], "Try using true instead.");
//! ```

pub mod config;
mod error;
pub mod localize;
pub mod queue;
pub mod schema;
pub mod text;
pub mod validator;

pub use config::{LocalizerConfig, ValidationConfig};
pub use error::{Error, InternalError, Result, SchemaError, SchemaResult, ValidationFailure};
pub use localize::{ErrorLocalizer, LocalizedError, NiceError};
pub use queue::ValidatorQueue;
pub use schema::{Completion, Schema, SchemaRegistry, completions_for, global_registry};
pub use validator::{SchemaValidator, validate_value};

use std::sync::Arc;
use yamlmeta_annotated::AnnotatedParse;
use yamlmeta_mapped_text::MappedText;

/// Validate `annotation` against `schema` and localize the errors.
///
/// An empty list means the document is valid.
pub fn validate(
    schema: &Schema,
    annotation: &AnnotatedParse,
    source: &MappedText,
    registry: &Arc<SchemaRegistry>,
) -> Result<Vec<LocalizedError>> {
    SchemaValidator::new(Arc::new(schema.clone()), registry.clone()).validate(annotation, source)
}

/// Parse `source` with `config.parser` and validate it.
pub fn validate_text(
    schema: &Schema,
    source: &MappedText,
    registry: &Arc<SchemaRegistry>,
    config: &ValidationConfig,
) -> Result<Vec<LocalizedError>> {
    let annotation = yamlmeta_annotated::parse_with_config(source, &config.parser)?;
    SchemaValidator::with_config(
        Arc::new(schema.clone()),
        registry.clone(),
        config.localizer.clone(),
    )
    .validate(&annotation, source)
}

/// Like [`validate`], but any error fails with [`Error::Validation`].
pub fn validate_or_fail(
    schema: &Schema,
    annotation: &AnnotatedParse,
    source: &MappedText,
    registry: &Arc<SchemaRegistry>,
) -> Result<()> {
    let errors = validate(schema, annotation, source, registry)?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure(errors).into())
    }
}

/// Register `schema` in the process-wide registry.
///
/// Defining the same `$id` again returns the schema already stored.
pub fn define_schema(schema: Schema) -> SchemaResult<Arc<Schema>> {
    global_registry().define(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(yaml: &str) -> (MappedText, AnnotatedParse) {
        let text = MappedText::from_literal(yaml, None);
        let doc = yamlmeta_annotated::parse(&text).unwrap();
        (text, doc)
    }

    #[test]
    fn test_validate_or_fail_carries_errors() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = Schema::from_yaml_str("number").unwrap();
        let (text, doc) = source("x\n");
        let err = validate_or_fail(&schema, &doc, &text, &registry).unwrap_err();
        match err {
            Error::Validation(failure) => assert_eq!(failure.errors().len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        let (text, doc) = source("3\n");
        assert!(validate_or_fail(&schema, &doc, &text, &registry).is_ok());
    }

    #[test]
    fn test_validate_text_reports_syntax_errors() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = Schema::from_yaml_str("any").unwrap();
        let config = ValidationConfig {
            parser: yamlmeta_annotated::ParserConfig::strict(),
            ..Default::default()
        };
        let text = MappedText::from_literal("a: [1, 2\n", Some("bad.yml"));
        let err = validate_text(&schema, &text, &registry, &config).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_define_schema_uses_global_registry() {
        let schema = Schema::from_yaml_str("string").unwrap().with_id("lib-test-title");
        let first = define_schema(schema.clone()).unwrap();
        let second = define_schema(schema).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(global_registry().contains("lib-test-title"));
    }
}
