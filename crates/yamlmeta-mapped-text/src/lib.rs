//! Position-mapped text for yamlmeta
//!
//! This crate provides strings that remember where they came from. Every
//! derived string (substring, concatenation, trimmed, regex-rewritten) keeps
//! a composable map from its own offsets back to the root text, so that
//! diagnostics computed on the derived string can point at the right line
//! and column of the file the user actually edited.
//!
//! # Overview
//!
//! - [`MappedText`]: an immutable string plus its offset mapping
//! - [`SourceText`]: a root text with a file name and a line index
//! - [`Span`] / [`SourceSpan`]: local and root-anchored ranges
//!
//! # Example
//!
//! ```rust
//! use yamlmeta_mapped_text::{MappedText, TextPart};
//!
//! let text = MappedText::from_literal("title: Hello\n", Some("doc.yml"));
//! let value = text.substring(7, 12);
//! let joined = MappedText::concat([TextPart::from("\""), value.into(), "\"".into()]);
//!
//! assert_eq!(joined.value(), "\"Hello\"");
//! assert_eq!(joined.original_of(1).map(|o| o.offset), Some(7));
//! assert!(joined.original_of(0).is_none());
//! ```

pub mod mapped;
pub mod source;
pub mod span;

pub use mapped::{MappedText, Piece, TextPart};
pub use source::{FormattedLine, LineCol, SourceText, format_line_range};
pub use span::{OriginalOffset, SourceSpan, Span};
