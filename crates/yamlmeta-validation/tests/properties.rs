//! Registry, validator and localizer properties.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use yamlmeta_annotated::{AnnotatedParse, PathSegment, format_path, parse};
use yamlmeta_mapped_text::MappedText;
use yamlmeta_validation::validator::{ErrorParams, RawError, ValidationContext};
use yamlmeta_validation::{
    ErrorLocalizer, LocalizerConfig, Schema, SchemaError, SchemaRegistry, SchemaValidator,
};

fn load(yaml: &str) -> Schema {
    Schema::from_yaml_str(yaml).unwrap()
}

fn document(yaml: &str) -> (MappedText, AnnotatedParse) {
    let text = MappedText::from_literal(yaml, Some("doc.yml"));
    let doc = parse(&text).unwrap();
    (text, doc)
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_define_twice_is_idempotent() {
    let registry = SchemaRegistry::new();
    let schema = load("object:\n  properties:\n    title: string\nid: front-matter\n");

    let first = registry.define(schema.clone()).unwrap();
    let ids_once = registry.ids();
    let second = registry.define(schema).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.ids(), ids_once);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_redefining_an_id_keeps_the_first_schema() {
    let registry = SchemaRegistry::new();
    registry.define(load("number").with_id("size")).unwrap();
    let kept = registry.define(load("string").with_id("size")).unwrap();
    assert_eq!(kept.type_name(), "number");
}

#[test]
fn test_mutual_reference_cycle_terminates() {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let registry = SchemaRegistry::new();
        registry
            .define_all(vec![
                load("ref: cycle-b\n").with_id("cycle-a"),
                load("ref: cycle-a\n").with_id("cycle-b"),
            ])
            .unwrap();
        let result = registry.resolve_id("cycle-a");
        let _ = tx.send(matches!(result, Err(SchemaError::Cycle { .. })));
    });
    let is_cycle = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("resolving a reference cycle did not terminate");
    assert!(is_cycle);
}

#[test]
fn test_dangling_reference_is_rejected() {
    let registry = SchemaRegistry::new();
    let err = registry
        .define(load("ref: nowhere\n").with_id("dangling"))
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnresolvedRef(ref id) if id == "nowhere"));
    assert!(!registry.contains("dangling"));
}

// ============================================================================
// Validator
// ============================================================================

const ARTICLE: &str = "\
object:
  closed: true
  properties:
    title: string
    toc: boolean
    toc-depth:
      number:
        minimum: 1
        maximum: 6
    authors:
      arrayOf:
        object:
          properties:
            name: string
          required: [name]
  required: [title]
";

const BAD_ARTICLE: &str = "\
toc: maybe
toc-depth: 9
authors:
  - name: 3
  - affiliation: Lab
subtitle: extra
";

#[test]
fn test_validation_is_deterministic() {
    let schema = load(ARTICLE);
    let registry = SchemaRegistry::new();
    let (_, doc) = document(BAD_ARTICLE);

    let summarize = |errors: Vec<RawError<'_>>| -> Vec<(String, String, String)> {
        errors
            .into_iter()
            .map(|e| {
                (
                    format_path(&e.instance_path),
                    format_path(&e.schema_path),
                    e.message,
                )
            })
            .collect()
    };

    let mut context = ValidationContext::new();
    let first = summarize(context.validate(&doc, &schema, &registry).unwrap());
    let second = summarize(context.validate(&doc, &schema, &registry).unwrap());
    let fresh = summarize(ValidationContext::new().validate(&doc, &schema, &registry).unwrap());

    assert_eq!(first, second);
    assert_eq!(first, fresh);
    assert_eq!(first.len(), 6);
}

#[test]
fn test_localized_output_is_deterministic() {
    let mut validator = SchemaValidator::new(Arc::new(load(ARTICLE)), Arc::new(SchemaRegistry::new()));
    let (text, doc) = document(BAD_ARTICLE);
    let headings = |errors: Vec<yamlmeta_validation::LocalizedError>| -> Vec<String> {
        errors.into_iter().map(|e| e.nice_error.heading).collect()
    };
    let first = headings(validator.validate(&doc, &text).unwrap());
    let second = headings(validator.validate(&doc, &text).unwrap());
    assert_eq!(first, second);
}

#[test]
fn test_collect_all_reports_every_key() {
    let mut validator = SchemaValidator::new(Arc::new(load(ARTICLE)), Arc::new(SchemaRegistry::new()));
    let (text, doc) = document(BAD_ARTICLE);
    let errors = validator.validate(&doc, &text).unwrap();
    let paths: Vec<String> = errors.iter().map(|e| format_path(&e.instance_path)).collect();
    // The missing `title` sits on the root path, a prefix of every other
    // error, so it waits until the nested errors are fixed.
    assert_eq!(
        paths,
        vec!["toc", "toc-depth", "authors.0.name", "authors.1", "subtitle"]
    );
    assert!(
        errors
            .iter()
            .all(|e| !matches!(e.params, ErrorParams::MissingProperty { .. }))
    );
    assert_eq!(errors[4].nice_error.heading, "property name subtitle is invalid");
}

// ============================================================================
// Localizer
// ============================================================================

#[test]
fn test_prefix_error_is_pruned() {
    let schema = load("object:\n  properties:\n    a:\n      object:\n        properties:\n          b: number\n");
    let (text, doc) = document("a:\n  b: x\n");
    let a = doc.value_node("a").unwrap();
    let b = a.value_node("b").unwrap();

    let raw = |path: Vec<PathSegment>, node| RawError {
        instance_path: path,
        schema_path: vec!["object".into(), "type".into()],
        keyword: "type".to_string(),
        schema: load("object"),
        violating: node,
        message: "type mismatch".to_string(),
        params: ErrorParams::None,
        branches: Vec::new(),
    };
    let errors = vec![
        raw(vec!["a".into()], a),
        raw(vec!["a".into(), "b".into()], b),
    ];

    let localizer = ErrorLocalizer::new(Arc::new(SchemaRegistry::new()), LocalizerConfig::default());
    let localized = localizer.localize(errors, &doc, &text, &schema).unwrap();
    assert_eq!(localized.len(), 1);
    assert_eq!(format_path(&localized[0].instance_path), "a.b");
}

#[test]
fn test_narrowing_is_bounded() {
    let registry = Arc::new(SchemaRegistry::new());
    registry
        .define(load(
            "anyOf:\n  - number\n  - object:\n      properties:\n        next:\n          ref: chain\nid: chain\n",
        ))
        .unwrap();
    let schema = load("ref: chain\n");
    let config = LocalizerConfig {
        max_narrowing_rounds: 1,
        ..Default::default()
    };
    let mut validator = SchemaValidator::with_config(Arc::new(schema), registry, config);
    let (text, doc) = document("next:\n  next:\n    next: x\n");
    let errors = validator.validate(&doc, &text).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(format_path(&errors[0].instance_path), "next.next.next");
}
