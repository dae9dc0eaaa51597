// Error types for schema construction and validation

use crate::localize::LocalizedError;
use thiserror::Error;
use yamlmeta_annotated::ParseError;
use yamlmeta_mapped_text::SourceSpan;

/// Errors raised while building, compiling or registering schemas.
///
/// These are fatal at registration time: a registry never stores a schema
/// that produced one of them.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// The declarative description has the wrong shape.
    #[error("Invalid schema structure: {message}{}", location_suffix(.location))]
    InvalidStructure {
        message: String,
        location: Option<SourceSpan>,
    },

    /// A `ref` or `resolveRef` names a schema that is not registered.
    #[error("Unresolved schema reference: {0}")]
    UnresolvedRef(String),

    /// Following `ref` links (or `complete-from` redirections) loops.
    #[error("Schema reference cycle detected at '{id}'")]
    Cycle { id: String },

    /// A `pattern` or `patternProperties` key is not a valid regex.
    #[error("Invalid regular expression '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Two base schemas of an `extends` merge declare the same property.
    #[error("base schemas {} share property {property}", .bases.join(", "))]
    DuplicateBaseProperty {
        property: String,
        bases: Vec<String>,
    },

    /// The YAML holding a schema description could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

fn location_suffix(location: &Option<SourceSpan>) -> String {
    match location {
        Some(span) => {
            let pos = span.start_line_col();
            format!(
                " ({}:{}:{})",
                span.file_name().unwrap_or("<unknown>"),
                pos.line + 1,
                pos.column + 1
            )
        }
        None => String::new(),
    }
}

impl SchemaError {
    pub(crate) fn structure(message: impl Into<String>, location: Option<SourceSpan>) -> Self {
        SchemaError::InvalidStructure {
            message: message.into(),
            location,
        }
    }
}

/// An invariant of the validator or localizer was violated.
///
/// This always indicates a bug; callers should surface it rather than
/// fall back to a guess.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Internal error: {0}")]
pub struct InternalError(pub String);

/// Aggregate error for callers that want validate-or-fail semantics.
#[derive(Debug, Clone, Error)]
#[error("{} validation error(s)", .0.len())]
pub struct ValidationFailure(pub Vec<LocalizedError>);

impl ValidationFailure {
    pub fn errors(&self) -> &[LocalizedError] {
        &self.0
    }
}

/// Umbrella error type of this crate.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Internal(#[from] InternalError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for schema construction.
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
