//! Error code catalog.
//!
//! Codes have the shape `Y-<subsystem>-<number>`. Subsystem 0 is internal,
//! 1 is YAML parsing, 2 is schema construction and 3 is validation.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Metadata for an error code.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    pub subsystem: &'static str,
    pub title: &'static str,
}

const ENTRIES: &[(&str, &str, &str)] = &[
    ("Y-0-1", "internal", "Internal Error"),
    ("Y-1-1", "yaml", "YAML Syntax Error"),
    ("Y-1-2", "yaml", "Duplicate Key"),
    ("Y-1-3", "yaml", "Recovered YAML Problem"),
    ("Y-2-1", "schema", "Invalid Schema"),
    ("Y-2-2", "schema", "Unresolved Schema Reference"),
    ("Y-2-3", "schema", "Schema Reference Cycle"),
    ("Y-3-1", "validation", "Missing Required Property"),
    ("Y-3-2", "validation", "Type Mismatch"),
    ("Y-3-3", "validation", "Invalid Property Name"),
    ("Y-3-4", "validation", "Value Not Allowed"),
    ("Y-3-5", "validation", "Pattern Mismatch"),
    ("Y-3-6", "validation", "Number Out Of Range"),
    ("Y-3-7", "validation", "Invalid Array Length"),
    ("Y-3-99", "validation", "Schema Violation"),
];

/// All known codes.
pub static ERROR_CATALOG: Lazy<HashMap<&'static str, ErrorCodeInfo>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|&(code, subsystem, title)| (code, ErrorCodeInfo { subsystem, title }))
        .collect()
});

/// Look up error code information.
pub fn get_error_info(code: &str) -> Option<&'static ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

/// The subsystem an error code belongs to.
///
/// ```
/// use yamlmeta_diagnostics::get_subsystem;
///
/// assert_eq!(get_subsystem("Y-1-1"), Some("yaml"));
/// ```
pub fn get_subsystem(code: &str) -> Option<&'static str> {
    get_error_info(code).map(|info| info.subsystem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_codes_are_unique() {
        assert_eq!(ERROR_CATALOG.len(), ENTRIES.len());
    }

    #[test]
    fn test_lookup() {
        let info = get_error_info("Y-3-1").unwrap();
        assert_eq!(info.subsystem, "validation");
        assert_eq!(info.title, "Missing Required Property");
        assert!(get_error_info("Y-9-9").is_none());
        assert_eq!(get_subsystem("Y-0-1"), Some("internal"));
    }
}
