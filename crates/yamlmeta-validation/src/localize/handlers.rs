//! Default error handlers
//!
//! Each handler looks at one localized error and may rewrite its report,
//! leave it alone, or drop the error entirely. They run in the order of
//! [`default_handlers`]; later handlers see the changes of earlier ones.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use yamlmeta_annotated::{PathSegment, navigate};

use super::nice::{ErrorLocation, location_string, reindent, source_context};
use super::{ErrorHandler, HandlerContext, LocalizedError};
use crate::error::{InternalError, Result};
use crate::schema::{Schema, possible_schema_keys, possible_schema_values};
use crate::text::{closest_matches, join_alternatives};
use crate::validator::ErrorParams;

type HandlerResult = Result<Option<LocalizedError>>;
type HandlerFn = fn(LocalizedError, &HandlerContext<'_>) -> HandlerResult;

/// The built-in handlers, in the order they run.
pub fn default_handlers() -> Vec<ErrorHandler> {
    let handlers: [HandlerFn; 11] = [
        ignore_expr_violations,
        expand_empty_span,
        improve_heading_for_value_errors,
        check_for_type_mismatch,
        check_for_bad_boolean,
        check_for_bad_colon,
        check_for_bad_equals,
        identify_key_errors,
        check_for_nearby_correction,
        check_for_nearby_required,
        schema_defined_errors,
    ];
    handlers
        .into_iter()
        .map(|f| Box::new(f) as ErrorHandler)
        .collect()
}

// ============================================================================
// Helpers
// ============================================================================

fn schema_path_ends_with(error: &LocalizedError, suffix: &[&str]) -> bool {
    let path = &error.schema_path;
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(segment, keyword)| matches!(segment, PathSegment::Key(k) if k == keyword))
}

fn add_instance_path_info(error: &mut LocalizedError, path: &[PathSegment]) {
    if path.is_empty() {
        return;
    }
    let location = path
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(":");
    error.nice_error.info.insert(
        "instance-path-location".to_string(),
        format!("The error happened in location {}.", location),
    );
}

fn add_file_info(error: &mut LocalizedError) {
    if let Some(file_name) = error.source.file_name() {
        error.nice_error.file_name = Some(file_name);
    }
}

fn json_type_phrase(value: &Value) -> &'static str {
    match value {
        Value::Null => "a null value",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The offending value as it should be quoted: reindented, and cut down
/// to its first and last two lines when long.
fn quoted_value(error: &LocalizedError) -> String {
    let text = reindent(error.verbatim());
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() > 4 {
        [lines[0], lines[1], "...", lines[lines.len() - 2], lines[lines.len() - 1]].join("\n")
    } else {
        text
    }
}

/// A heading that names where the bad value is and what it should be.
fn value_error_heading(error: &LocalizedError) -> String {
    let value = quoted_value(error);
    let empty = value.trim().is_empty();
    let expected = error.schema.description();
    match error.instance_path.last() {
        None if empty => "YAML value is missing.".to_string(),
        None => format!("YAML value {} must {}.", value, expected),
        Some(PathSegment::Index(index)) if empty => format!(
            "Array entry {} is empty but it must instead {}.",
            index + 1,
            expected
        ),
        Some(PathSegment::Index(index)) => format!(
            "Array entry {} with value {} failed to {}.",
            index + 1,
            value,
            expected
        ),
        Some(PathSegment::Key(key)) if empty => format!(
            "Field \"{}\" has empty value but it must instead {}",
            key, expected
        ),
        Some(PathSegment::Key(key)) if value.contains('\n') => format!(
            "Field \"{}\" has value\n\n{}\n\nThe value must instead {}.",
            key, value, expected
        ),
        Some(PathSegment::Key(key)) => format!(
            "Field \"{}\" has value {}, which must instead {}",
            key, value, expected
        ),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// `!expr` values are evaluated later; their type cannot be checked here.
fn ignore_expr_violations(error: LocalizedError, _cx: &HandlerContext<'_>) -> HandlerResult {
    let result = &error.violating_object.result;
    let is_expr = result.get("tag").and_then(Value::as_str) == Some("!expr")
        && result.get("value").is_some_and(Value::is_string);
    if is_expr && error.keyword == "type" {
        return Ok(None);
    }
    Ok(Some(error))
}

/// A missing value has no text to point at; point at its key instead.
fn expand_empty_span(mut error: LocalizedError, cx: &HandlerContext<'_>) -> HandlerResult {
    if error.location.start != error.location.end
        || error.instance_path.is_empty()
        || !error.verbatim().trim().is_empty()
    {
        return Ok(Some(error));
    }
    let key = navigate(&error.instance_path, cx.annotation, true);
    let location = ErrorLocation {
        start: key.source.offset_to_line_col(key.start).unwrap_or_default(),
        end: key.source.offset_to_line_col(key.end).unwrap_or_default(),
    };
    error.location = location;
    error.nice_error.location = location;
    error.nice_error.source_span = key.source_span();
    error.nice_error.source_context = source_context(&key.source, key.span());
    Ok(Some(error))
}

fn improve_heading_for_value_errors(
    mut error: LocalizedError,
    _cx: &HandlerContext<'_>,
) -> HandlerResult {
    if error.is_key_error() || error.keyword == "required" {
        return Ok(Some(error));
    }
    error.nice_error.heading = value_error_heading(&error);
    Ok(Some(error))
}

fn check_for_type_mismatch(mut error: LocalizedError, _cx: &HandlerContext<'_>) -> HandlerResult {
    if error.keyword != "type" || error.is_key_error() || error.verbatim().trim().is_empty() {
        return Ok(Some(error));
    }
    let value = reindent(error.verbatim());
    let subject = if value.contains('\n') {
        format!("The value\n\n{}\n\n", value)
    } else {
        format!("The value {} ", value)
    };
    error.nice_error.heading = value_error_heading(&error);
    error.nice_error.body = vec![format!(
        "{}is of type {}.",
        subject,
        json_type_phrase(&error.violating_object.result)
    )];
    error.nice_error.info.clear();
    let path = error.instance_path.clone();
    add_instance_path_info(&mut error, &path);
    add_file_info(&mut error);
    Ok(Some(error))
}

const YAML_1_1_TRUE: &[&str] = &[
    "y", "Y", "yes", "Yes", "YES", "true", "True", "TRUE", "on", "On", "ON",
];
const YAML_1_1_FALSE: &[&str] = &[
    "n", "N", "no", "No", "NO", "false", "False", "FALSE", "off", "Off", "OFF",
];

/// `yes`/`no` style booleans are strings in YAML 1.2.
fn check_for_bad_boolean(mut error: LocalizedError, _cx: &HandlerContext<'_>) -> HandlerResult {
    if error.keyword != "type" || !matches!(error.schema, Schema::Boolean(_)) {
        return Ok(Some(error));
    }
    let Some(text) = error.violating_object.result.as_str() else {
        return Ok(Some(error));
    };
    let fix = if YAML_1_1_TRUE.contains(&text) {
        "true"
    } else if YAML_1_1_FALSE.contains(&text) {
        "false"
    } else {
        return Ok(Some(error));
    };
    let body = format!("The value {} is a string.", text);
    error.nice_error.heading = value_error_heading(&error);
    error.nice_error.body = vec![body];
    error.nice_error.info.clear();
    let path = error.instance_path.clone();
    add_instance_path_info(&mut error, &path);
    add_file_info(&mut error);
    error.nice_error.info.insert(
        "yaml-version-1.2".to_string(),
        "The validator uses YAML 1.2, which interprets booleans strictly.".to_string(),
    );
    error.nice_error.info.insert(
        "suggestion-fix".to_string(),
        format!("Try using {} instead.", fix),
    );
    Ok(Some(error))
}

static BAD_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.+:[^ ].*$").unwrap());
static BAD_EQUALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.+ *= *.+$").unwrap());
static EQUALS: Lazy<Regex> = Lazy::new(|| Regex::new(r" *= *").unwrap());

/// `key:value` parses as one string where an object was expected.
fn check_for_bad_colon(mut error: LocalizedError, _cx: &HandlerContext<'_>) -> HandlerResult {
    let Some(text) = error.violating_object.result.as_str().map(str::to_string) else {
        return Ok(Some(error));
    };
    if !schema_path_ends_with(&error, &["object", "type"]) || !BAD_COLON.is_match(&text) {
        return Ok(Some(error));
    }
    error.nice_error.heading = value_error_heading(&error);
    error.nice_error.body = vec![format!("The value {} is a string.", text)];
    error.nice_error.info.insert(
        "yaml-key-value-pairs".to_string(),
        "In YAML, key-value pairs in objects must be separated by a space.".to_string(),
    );
    error.nice_error.info.insert(
        "suggestion-fix".to_string(),
        format!("Did you mean {} instead?", text.replacen(':', ": ", 1)),
    );
    Ok(Some(error))
}

/// `key=value` or `key = value` where `key: value` was meant.
fn check_for_bad_equals(mut error: LocalizedError, _cx: &HandlerContext<'_>) -> HandlerResult {
    let Some(text) = error.violating_object.result.as_str().map(str::to_string) else {
        return Ok(Some(error));
    };
    let applies = schema_path_ends_with(&error, &["object", "type"])
        || schema_path_ends_with(&error, &["object", "propertyNames", "string", "pattern"]);
    if !applies || !BAD_EQUALS.is_match(&text) {
        return Ok(Some(error));
    }
    error.nice_error.heading = value_error_heading(&error);
    error.nice_error.body = vec![format!("The value {} is a string.", text)];
    error.nice_error.info.insert(
        "yaml-key-value-pairs".to_string(),
        "In YAML, key-value pairs in objects must be separated by a colon and a space."
            .to_string(),
    );
    error.nice_error.info.insert(
        "suggestion-fix".to_string(),
        format!(
            "Did you mean {} instead?",
            EQUALS.replace_all(&text, ": ")
        ),
    );
    Ok(Some(error))
}

fn identify_key_errors(mut error: LocalizedError, _cx: &HandlerContext<'_>) -> HandlerResult {
    if !error.is_key_error() {
        return Ok(Some(error));
    }
    let key = error.bad_key();
    let mut path = error.instance_path.clone();
    if path.last() != Some(&PathSegment::Key(key.clone())) {
        path.push(PathSegment::Key(key.clone()));
    }
    add_instance_path_info(&mut error, &path);
    error.nice_error.heading = format!("property name {} is invalid", key);
    Ok(Some(error))
}

/// Offer the closest known key or enum value for a near miss.
fn check_for_nearby_correction(
    mut error: LocalizedError,
    cx: &HandlerContext<'_>,
) -> HandlerResult {
    let (word, candidates, info_key) = if error.is_key_error() {
        let mut candidates = possible_schema_keys(&error.schema, cx.registry)?;
        if candidates.is_empty() {
            candidates = possible_schema_values(&error.schema);
        }
        (error.bad_key(), candidates, "did-you-mean-key")
    } else {
        let value = navigate(&error.instance_path, cx.annotation, false);
        let Some(word) = value.result.as_str() else {
            return Ok(Some(error));
        };
        (
            word.to_string(),
            possible_schema_values(&error.schema),
            "did-you-mean-value",
        )
    };
    let suggestions: Vec<String> = closest_matches(
        &word,
        candidates.iter().map(String::as_str).filter(|c| *c != word),
        cx.config.typo_threshold,
    )
    .into_iter()
    .map(str::to_string)
    .collect();
    if suggestions.is_empty() {
        return Ok(Some(error));
    }
    error.nice_error.info.insert(
        info_key.to_string(),
        format!("Did you mean {}?", join_alternatives(&suggestions)),
    );
    Ok(Some(error))
}

/// A required property may be present under a misspelled name.
fn check_for_nearby_required(mut error: LocalizedError, cx: &HandlerContext<'_>) -> HandlerResult {
    if error.keyword != "required" {
        return Ok(Some(error));
    }
    let keys: Vec<String> = error
        .violating_object
        .pairs()
        .map(|(key, _)| key.key_string())
        .collect();
    let missing: Vec<String> = match (&error.params, &error.schema) {
        (ErrorParams::MissingProperty { properties }, _) => properties.clone(),
        (_, Schema::Object(object)) => object
            .required
            .iter()
            .filter(|p| !keys.contains(p))
            .cloned()
            .collect(),
        _ => {
            return Err(InternalError(format!(
                "required error on a {} schema",
                error.schema.type_name()
            ))
            .into());
        }
    };
    for property in &missing {
        let typos: Vec<String> = closest_matches(
            property,
            keys.iter().map(String::as_str),
            cx.config.typo_threshold,
        )
        .into_iter()
        .map(str::to_string)
        .collect();
        let suggestion = match typos.as_slice() {
            [] => continue,
            [one] => format!("Is {} a typo of {}?", one, property),
            [a, b] => format!("Is {} or {} a typo of {}?", a, b, property),
            many => format!(
                "Is one of {} a typo of {}?",
                join_alternatives(many),
                property
            ),
        };
        error
            .nice_error
            .info
            .insert("did-you-mean-key".to_string(), suggestion);
    }
    Ok(Some(error))
}

/// A schema's own `errorMessage` wins over generated headings.
///
/// The template may use `${location}`, `${fullPath}`, `${key}` and
/// `${value}`.
fn schema_defined_errors(mut error: LocalizedError, _cx: &HandlerContext<'_>) -> HandlerResult {
    let Some(template) = error.schema.annotations().error_message.clone() else {
        return Ok(Some(error));
    };
    let full_path = error
        .instance_path
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(":");
    let key = error
        .instance_path
        .last()
        .map(ToString::to_string)
        .unwrap_or_default();
    error.nice_error.heading = template
        .replace("${location}", &location_string(&error.location))
        .replace("${fullPath}", &full_path)
        .replace("${key}", &key)
        .replace("${value}", &reindent(error.verbatim()));
    Ok(Some(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::validator::SchemaValidator;
    use std::sync::Arc;
    use yamlmeta_mapped_text::MappedText;

    fn localize(schema: &str, yaml: &str) -> Vec<LocalizedError> {
        let schema = Arc::new(Schema::from_yaml_str(schema).unwrap());
        let mut validator = SchemaValidator::new(schema, Arc::new(SchemaRegistry::new()));
        let source = MappedText::from_literal(yaml, Some("doc.yml"));
        let doc = yamlmeta_annotated::parse(&source).unwrap();
        validator.validate(&doc, &source).unwrap()
    }

    const TOC: &str = "object:\n  properties:\n    toc: boolean\n    theme:\n      enum: [cosmo, darkly]\n";

    #[test]
    fn test_type_mismatch_heading_and_body() {
        let errors = localize(TOC, "toc: 3\n");
        assert_eq!(errors.len(), 1);
        let nice = &errors[0].nice_error;
        assert_eq!(
            nice.heading,
            "Field \"toc\" has value 3, which must instead be `true` or `false`"
        );
        assert_eq!(nice.body, vec!["The value 3 is of type number.".to_string()]);
        assert_eq!(
            nice.info["instance-path-location"],
            "The error happened in location toc."
        );
        assert_eq!(nice.file_name.as_deref(), Some("doc.yml"));
    }

    #[test]
    fn test_bad_boolean_suggests_fix() {
        let errors = localize(TOC, "toc: no\n");
        let nice = &errors[0].nice_error;
        assert_eq!(nice.info["suggestion-fix"], "Try using false instead.");
        assert!(nice.info.contains_key("yaml-version-1.2"));
    }

    #[test]
    fn test_enum_typo_suggests_value() {
        let errors = localize(TOC, "theme: cosmos\n");
        assert_eq!(
            errors[0].nice_error.info["did-you-mean-value"],
            "Did you mean cosmo?"
        );
    }

    #[test]
    fn test_bad_colon() {
        let errors = localize(
            "object:\n  properties:\n    format:\n      object:\n        properties:\n          html: any\n",
            "format: html:default\n",
        );
        assert_eq!(
            errors[0].nice_error.info["suggestion-fix"],
            "Did you mean html: default instead?"
        );
    }

    #[test]
    fn test_bad_equals() {
        let errors = localize(
            "object:\n  properties:\n    format:\n      object:\n        properties:\n          html: any\n",
            "format: html = yes\n",
        );
        assert_eq!(
            errors[0].nice_error.info["suggestion-fix"],
            "Did you mean html: yes instead?"
        );
    }

    #[test]
    fn test_invalid_key_heading_and_suggestion() {
        let errors = localize(
            "object:\n  closed: true\n  properties:\n    number-sections: boolean\n",
            "number-sectons: true\n",
        );
        assert_eq!(errors.len(), 1);
        let nice = &errors[0].nice_error;
        assert_eq!(nice.heading, "property name number-sectons is invalid");
        assert_eq!(nice.info["did-you-mean-key"], "Did you mean number-sections?");
        assert_eq!(nice.code, "Y-3-3");
    }

    #[test]
    fn test_nearby_required() {
        let errors = localize(
            "object:\n  properties:\n    title: string\n  required: [title]\n",
            "titl: Hello\n",
        );
        let required = errors
            .iter()
            .find(|e| e.keyword == "required")
            .unwrap();
        assert_eq!(
            required.nice_error.info["did-you-mean-key"],
            "Is titl a typo of title?"
        );
    }

    #[test]
    fn test_expr_values_are_ignored() {
        let errors = localize(TOC, "toc: !expr params.toc\n");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_schema_error_message_template() {
        let errors = localize(
            "object:\n  properties:\n    size:\n      number:\n        errorMessage: size ${value} at ${fullPath} is wrong\n",
            "size: big\n",
        );
        assert_eq!(errors[0].nice_error.heading, "size big at size is wrong");
    }

    #[test]
    fn test_empty_value_points_at_key() {
        let errors = localize(TOC, "toc:\n");
        let error = &errors[0];
        assert_eq!(
            error.nice_error.heading,
            "Field \"toc\" has empty value but it must instead be `true` or `false`"
        );
        assert_eq!(error.location.start.column, 0);
        assert_eq!(error.location.end.column, 3);
    }

    #[test]
    fn test_value_heading_for_array_entry() {
        let errors = localize("arrayOf: number\n", "- 1\n- two\n");
        assert_eq!(
            errors[0].nice_error.heading,
            "Array entry 2 with value two failed to be a number."
        );
    }
}
