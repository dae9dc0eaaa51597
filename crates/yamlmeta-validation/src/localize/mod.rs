//! Error localization
//!
//! Turns the raw errors of a validation pass into the few errors a person
//! should read, each with a location, a source excerpt and advice.
//!
//! The pipeline:
//!
//! 1. group raw errors by instance path;
//! 2. attach invalid-key errors to their keys, then drop errors on a
//!    prefix of another error's instance path;
//! 3. narrow failing `anyOf` combinators to one branch, pruning again
//!    after each round;
//! 4. keep the most general schema path per instance path;
//! 5. build a [`LocalizedError`] for each survivor and run the handlers;
//! 6. sort by position in the document.
//!
//! Steps 2 to 4 are skipped when [`LocalizerConfig::prune_errors`] is off.

mod handlers;
mod narrow;
mod nice;

pub use handlers::default_handlers;
pub use nice::{ErrorLocation, NiceError, location_string, reindent, source_context};

use indexmap::IndexMap;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use yamlmeta_annotated::{AnnotatedParse, PathSegment, format_path};
use yamlmeta_diagnostics::DiagnosticMessage;
use yamlmeta_mapped_text::MappedText;

use crate::config::LocalizerConfig;
use crate::error::Result;
use crate::schema::{Schema, SchemaPath, SchemaRegistry};
use crate::validator::{ErrorParams, RawError};
use narrow::{
    INVALID_PROPERTY, group_by_instance_path, keep_most_general, narrow_any_of, prune_prefixes,
    rewrite_invalid_properties,
};

/// A validation error ready to be reported.
#[derive(Debug, Clone)]
pub struct LocalizedError {
    /// The node the error is about: the value, or the key for key errors.
    pub violating_object: AnnotatedParse,
    pub instance_path: Vec<PathSegment>,
    pub schema_path: SchemaPath,
    pub keyword: String,
    pub schema: Schema,
    pub message: String,
    pub params: ErrorParams,
    /// The text of the violating node.
    pub source: MappedText,
    pub location: ErrorLocation,
    pub nice_error: NiceError,
}

impl LocalizedError {
    fn from_raw(raw: RawError<'_>, document: &MappedText) -> Self {
        let node = raw.violating;
        let location = ErrorLocation {
            start: node.source.offset_to_line_col(node.start).unwrap_or_default(),
            end: node.source.offset_to_line_col(node.end).unwrap_or_default(),
        };
        let nice_error = NiceError {
            heading: raw.message.clone(),
            body: Vec::new(),
            info: IndexMap::new(),
            file_name: node.source.file_name().or_else(|| document.file_name()),
            location,
            source_context: source_context(&node.source, node.span()),
            code: error_code(&raw.keyword, &raw.params, &raw.schema_path).to_string(),
            source_span: node.source_span(),
        };
        LocalizedError {
            violating_object: node.clone(),
            source: node.mapped_text(),
            instance_path: raw.instance_path,
            schema_path: raw.schema_path,
            keyword: raw.keyword,
            schema: raw.schema,
            message: raw.message,
            params: raw.params,
            location,
            nice_error,
        }
    }

    /// The text of the violating node, as written.
    pub fn verbatim(&self) -> &str {
        self.source.value()
    }

    /// Whether the error is about a key rather than a value.
    pub fn is_key_error(&self) -> bool {
        self.keyword == INVALID_PROPERTY
            || matches!(self.params, ErrorParams::InvalidKey { .. })
            || self
                .schema_path
                .iter()
                .any(|s| matches!(s, PathSegment::Key(k) if k == "propertyNames"))
    }

    /// The offending key of a key error.
    pub fn bad_key(&self) -> String {
        match &self.params {
            ErrorParams::InvalidKey { key } => key.clone(),
            _ => self.violating_object.key_string(),
        }
    }

    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        self.nice_error.to_diagnostic()
    }

    /// Machine-readable form for tools.
    pub fn to_json(&self) -> Value {
        json!({
            "instancePath": format_path(&self.instance_path),
            "schemaPath": format_path(&self.schema_path),
            "keyword": self.keyword,
            "message": self.message,
            "location": self.location,
            "niceError": self.nice_error,
        })
    }
}

impl fmt::Display for LocalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.location.start;
        match &self.nice_error.file_name {
            Some(file) => write!(f, "{}:{}:{}: ", file, start.line + 1, start.column + 1)?,
            None => write!(f, "{}:{}: ", start.line + 1, start.column + 1)?,
        }
        write!(f, "{}", self.nice_error.heading)
    }
}

/// Catalog code for an error.
fn error_code(keyword: &str, params: &ErrorParams, schema_path: &[PathSegment]) -> &'static str {
    let key_error = matches!(params, ErrorParams::InvalidKey { .. })
        || schema_path
            .iter()
            .any(|s| matches!(s, PathSegment::Key(k) if k == "propertyNames"));
    if key_error || keyword == INVALID_PROPERTY {
        return "Y-3-3";
    }
    match keyword {
        "required" => "Y-3-1",
        "type" => "Y-3-2",
        "enum" | "false" => "Y-3-4",
        "pattern" => "Y-3-5",
        "minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" => "Y-3-6",
        "minItems" | "maxItems" => "Y-3-7",
        _ => "Y-3-99",
    }
}

/// What a handler can see besides the error itself.
pub struct HandlerContext<'h> {
    /// The whole validated document.
    pub annotation: &'h AnnotatedParse,
    /// The schema the document was validated against.
    pub schema: &'h Schema,
    pub registry: &'h SchemaRegistry,
    pub config: &'h LocalizerConfig,
}

/// Rewrites one localized error. Returning `None` drops the error.
pub type ErrorHandler = Box<
    dyn Fn(LocalizedError, &HandlerContext<'_>) -> Result<Option<LocalizedError>> + Send + Sync,
>;

/// Selects and explains validation errors.
pub struct ErrorLocalizer {
    config: LocalizerConfig,
    registry: Arc<SchemaRegistry>,
    handlers: Vec<ErrorHandler>,
}

impl fmt::Debug for ErrorLocalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorLocalizer")
            .field("config", &self.config)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl ErrorLocalizer {
    /// A localizer with the default handlers.
    pub fn new(registry: Arc<SchemaRegistry>, config: LocalizerConfig) -> Self {
        ErrorLocalizer {
            config,
            registry,
            handlers: default_handlers(),
        }
    }

    pub fn config(&self) -> &LocalizerConfig {
        &self.config
    }

    /// Append a handler; it runs after all existing ones.
    pub fn add_handler<F>(&mut self, handler: F)
    where
        F: Fn(LocalizedError, &HandlerContext<'_>) -> Result<Option<LocalizedError>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Steps 1 to 4: choose which raw errors to report.
    fn select<'a>(&self, errors: Vec<RawError<'a>>) -> Vec<RawError<'a>> {
        let mut errors = group_by_instance_path(errors);
        if !self.config.prune_errors {
            return errors;
        }
        rewrite_invalid_properties(&mut errors);
        errors = prune_prefixes(errors);
        let mut rounds = 0;
        while rounds < self.config.max_narrowing_rounds {
            rounds += 1;
            let (narrowed, changed) = narrow_any_of(errors);
            errors = prune_prefixes(narrowed);
            if !changed {
                break;
            }
        }
        tracing::debug!(rounds, remaining = errors.len(), "Narrowed validation errors");
        keep_most_general(errors)
    }

    /// Localize the raw errors of validating `annotation` against `schema`.
    ///
    /// The result is sorted by start position and is empty only when every
    /// error was dropped by a handler.
    pub fn localize(
        &self,
        errors: Vec<RawError<'_>>,
        annotation: &AnnotatedParse,
        source: &MappedText,
        schema: &Schema,
    ) -> Result<Vec<LocalizedError>> {
        let selected = self.select(errors);
        let cx = HandlerContext {
            annotation,
            schema,
            registry: &self.registry,
            config: &self.config,
        };
        let mut localized = Vec::with_capacity(selected.len());
        'errors: for raw in selected {
            let mut error = LocalizedError::from_raw(raw, source);
            for handler in &self.handlers {
                match handler(error, &cx)? {
                    Some(next) => error = next,
                    None => continue 'errors,
                }
            }
            localized.push(error);
        }
        localized.sort_by_key(|e| e.location.start);
        Ok(localized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::SchemaValidator;

    fn validator(schema: &str, config: LocalizerConfig) -> SchemaValidator {
        SchemaValidator::with_config(
            Arc::new(Schema::from_yaml_str(schema).unwrap()),
            Arc::new(SchemaRegistry::new()),
            config,
        )
    }

    fn run(validator: &mut SchemaValidator, yaml: &str) -> Vec<LocalizedError> {
        let source = MappedText::from_literal(yaml, None);
        let doc = yamlmeta_annotated::parse(&source).unwrap();
        validator.validate(&doc, &source).unwrap()
    }

    const NESTED: &str = "anyOf:\n  - string\n  - object:\n      properties:\n        a:\n          object:\n            properties:\n              b: number\n";

    #[test]
    fn test_pruning_keeps_only_deepest() {
        let mut v = validator(NESTED, LocalizerConfig::default());
        let errors = run(&mut v, "a:\n  b: x\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(format_path(&errors[0].instance_path), "a.b");
        assert_eq!(errors[0].nice_error.code, "Y-3-2");
    }

    #[test]
    fn test_no_prune_reports_everything() {
        let config = LocalizerConfig {
            prune_errors: false,
            ..Default::default()
        };
        let mut v = validator(NESTED, config);
        let errors = run(&mut v, "a:\n  b: x\n");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_sorted_by_position() {
        let mut v = validator(
            "object:\n  properties:\n    a: number\n    b: number\n",
            LocalizerConfig::default(),
        );
        let errors = run(&mut v, "b: x\na: y\n");
        let lines: Vec<usize> = errors.iter().map(|e| e.location.start.line).collect();
        assert_eq!(lines, vec![0, 1]);
    }

    #[test]
    fn test_custom_handler_can_drop() {
        let mut v = validator("number", LocalizerConfig::default());
        v.localizer_mut().add_handler(|error, _cx| {
            Ok((error.keyword != "type").then_some(error))
        });
        assert!(run(&mut v, "hello\n").is_empty());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(error_code("required", &ErrorParams::None, &[]), "Y-3-1");
        assert_eq!(error_code("maxItems", &ErrorParams::None, &[]), "Y-3-7");
        assert_eq!(
            error_code(
                "pattern",
                &ErrorParams::None,
                &[PathSegment::from("object"), PathSegment::from("propertyNames")]
            ),
            "Y-3-3"
        );
        assert_eq!(error_code("exclusiveMinimum", &ErrorParams::None, &[]), "Y-3-6");
    }

    #[test]
    fn test_display_and_json() {
        let mut v = validator("object:\n  properties:\n    toc: boolean\n", LocalizerConfig::default());
        let source = MappedText::from_literal("toc: 3\n", Some("doc.yml"));
        let doc = yamlmeta_annotated::parse(&source).unwrap();
        let errors = v.validate(&doc, &source).unwrap();
        assert!(errors[0].to_string().starts_with("doc.yml:1:6: Field \"toc\""));
        let json = errors[0].to_json();
        assert_eq!(json["instancePath"], "toc");
        assert_eq!(json["schemaPath"], "object.properties.toc.boolean.type");
        assert_eq!(json["niceError"]["code"], "Y-3-2");
    }
}
