//! End-to-end validation of small documents.

use std::sync::Arc;
use yamlmeta_annotated::{PathSegment, format_path};
use yamlmeta_mapped_text::MappedText;
use yamlmeta_validation::{
    LocalizedError, Schema, SchemaRegistry, ValidationConfig, validate, validate_text,
};

fn load(yaml: &str) -> Schema {
    Schema::from_yaml_str(yaml).unwrap()
}

fn check(schema: &str, document: &str) -> Vec<LocalizedError> {
    check_with(&Arc::new(SchemaRegistry::new()), &load(schema), document)
}

fn check_with(registry: &Arc<SchemaRegistry>, schema: &Schema, document: &str) -> Vec<LocalizedError> {
    let source = MappedText::from_literal(document, Some("doc.yml"));
    let doc = yamlmeta_annotated::parse(&source).unwrap();
    validate(schema, &doc, &source, registry).unwrap()
}

// ============================================================================
// Required properties
// ============================================================================

#[test]
fn test_missing_required_property() {
    let errors = check(
        "object:\n  properties:\n    baz: number\n  required: [baz]\n",
        "{}\n",
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].schema_path.last(),
        Some(&PathSegment::from("required"))
    );
    assert!(errors[0].message.contains("baz"));
    assert_eq!(errors[0].nice_error.code, "Y-3-1");
}

#[test]
fn test_any_of_required_alternatives_merge() {
    let errors = check(
        "anyOf:\n  - object:\n      required: [x]\n  - object:\n      required: [y]\n",
        "{}\n",
    );
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("x or y"), "{}", errors[0].message);
}

#[test]
fn test_valid_document_has_no_errors() {
    let errors = check(
        "object:\n  properties:\n    baz: number\n  required: [baz]\n",
        "baz: 4\n",
    );
    assert!(errors.is_empty());
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_yaml_1_1_boolean_gets_a_fix() {
    let errors = check("object:\n  properties:\n    draft: boolean\n", "draft: yes\n");
    assert_eq!(errors.len(), 1);
    let fix = &errors[0].nice_error.info["suggestion-fix"];
    assert!(fix.contains("true"), "{fix}");
    assert!(
        errors[0]
            .to_diagnostic()
            .hints
            .iter()
            .any(|h| h.contains("true"))
    );
}

#[test]
fn test_error_location_points_into_document() {
    let errors = check(
        "object:\n  properties:\n    title: string\n    pages: number\n",
        "title: Notes\npages: many\n",
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].location.start.line, 1);
    assert_eq!(errors[0].location.start.column, 7);
    assert_eq!(errors[0].verbatim(), "many");
    assert!(errors[0].to_string().starts_with("doc.yml:2:8: "));
}

#[test]
fn test_reference_to_registered_schema() {
    let registry = Arc::new(SchemaRegistry::new());
    registry
        .define(load("number:\n  minimum: 1\nid: page-count\n"))
        .unwrap();
    let schema = load("object:\n  properties:\n    pages:\n      ref: page-count\n");

    let errors = check_with(&registry, &schema, "pages: 0\n");
    assert_eq!(errors.len(), 1);
    assert_eq!(format_path(&errors[0].instance_path), "pages");
    assert_eq!(errors[0].keyword, "minimum");

    assert!(check_with(&registry, &schema, "pages: 12\n").is_empty());
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_json_output_names_paths() {
    let errors = check("object:\n  properties:\n    n: number\n", "n: x\n");
    let json = errors[0].to_json();
    assert_eq!(json["instancePath"], "n");
    assert_eq!(json["keyword"], "type");
    assert_eq!(json["location"]["start"]["line"], 0);
}

#[test]
fn test_validate_text_parses_and_validates() {
    let registry = Arc::new(SchemaRegistry::new());
    let schema = load("arrayOf: string\n");
    let source = MappedText::from_literal("- a\n- 2\n", None);
    let errors = validate_text(&schema, &source, &registry, &ValidationConfig::default()).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(format_path(&errors[0].instance_path), "1");
}
