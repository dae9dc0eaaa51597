//! Diagnostic messages for YAML metadata tools.
//!
//! Messages follow the tidyverse structure: a short title, an optional
//! problem statement, bulleted details and hints. When a message carries a
//! source location, [`DiagnosticMessage::to_text`] renders the offending
//! lines with `ariadne`.
//!
//! ```
//! use yamlmeta_diagnostics::DiagnosticMessageBuilder;
//!
//! let msg = DiagnosticMessageBuilder::error("Invalid metadata")
//!     .with_code("Y-3-2")
//!     .problem("Field `toc` must be `true` or `false`")
//!     .add_hint("Did you mean `true`?")
//!     .build();
//!
//! assert!(msg.to_text().contains("Did you mean `true`?"));
//! ```

pub mod builder;
pub mod catalog;
pub mod diagnostic;

pub use builder::DiagnosticMessageBuilder;
pub use catalog::{ERROR_CATALOG, ErrorCodeInfo, get_error_info, get_subsystem};
pub use diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage};
