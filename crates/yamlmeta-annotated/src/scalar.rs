//! YAML 1.2 core-schema scalar resolution
//!
//! Only plain (unquoted) scalars are resolved; quoted and block scalars are
//! always strings. Unlike YAML 1.1, `yes`/`no`/`on`/`off` are strings here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

static INT_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?[0-9]+$").unwrap());
static INT_OCTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0o[0-7]+$").unwrap());
static INT_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").unwrap());
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$").unwrap()
});

/// Resolve the text of a plain scalar into a JSON value.
///
/// Infinities and NaN have no JSON representation and stay strings.
pub fn resolve_plain(text: &str) -> Value {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if INT_DECIMAL.is_match(text) {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Number(i.into());
        }
        return float_or_string(text);
    }
    if INT_OCTAL.is_match(text) {
        if let Ok(i) = i64::from_str_radix(&text[2..], 8) {
            return Value::Number(i.into());
        }
    }
    if INT_HEX.is_match(text) {
        if let Ok(i) = i64::from_str_radix(&text[2..], 16) {
            return Value::Number(i.into());
        }
    }
    if FLOAT.is_match(text) {
        return float_or_string(text);
    }
    Value::String(text.to_string())
}

fn float_or_string(text: &str) -> Value {
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(text.to_string()), Value::Number)
}

/// Apply a node tag to a resolved value.
///
/// `!!str` forces the raw text to a string, other standard `!!` tags keep
/// the resolved value, and application tags such as `!expr` wrap the value
/// as `{"tag": ..., "value": ...}`.
pub fn apply_tag(tag: &str, value: Value, raw: &str) -> Value {
    match tag {
        "!!str" => match value {
            Value::String(_) => value,
            _ => Value::String(raw.to_string()),
        },
        t if t.starts_with("!!") => value,
        t => {
            let mut obj = serde_json::Map::new();
            obj.insert("tag".to_string(), Value::String(t.to_string()));
            obj.insert("value".to_string(), value);
            Value::Object(obj)
        }
    }
}

/// Stringify a resolved key the way it shows up in a mapping's result.
pub fn key_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_core_schema_nulls_and_bools() {
        assert_eq!(resolve_plain("~"), Value::Null);
        assert_eq!(resolve_plain("NULL"), Value::Null);
        assert_eq!(resolve_plain("True"), json!(true));
        assert_eq!(resolve_plain("FALSE"), json!(false));
    }

    #[test]
    fn test_yaml_11_booleans_stay_strings() {
        for word in ["yes", "no", "on", "off", "y", "N"] {
            assert_eq!(resolve_plain(word), json!(word), "{} should be a string", word);
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(resolve_plain("42"), json!(42));
        assert_eq!(resolve_plain("-7"), json!(-7));
        assert_eq!(resolve_plain("0o17"), json!(15));
        assert_eq!(resolve_plain("0x1F"), json!(31));
        assert_eq!(resolve_plain("1.5"), json!(1.5));
        assert_eq!(resolve_plain("1e3"), json!(1000.0));
        assert_eq!(resolve_plain(".inf"), json!(".inf"));
        assert_eq!(resolve_plain("1.2.3"), json!("1.2.3"));
    }

    #[test]
    fn test_tags() {
        assert_eq!(apply_tag("!!str", json!(3), "3"), json!("3"));
        assert_eq!(apply_tag("!!int", json!(3), "3"), json!(3));
        assert_eq!(
            apply_tag("!expr", json!("x + 1"), "x + 1"),
            json!({"tag": "!expr", "value": "x + 1"})
        );
    }
}
