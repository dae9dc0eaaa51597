//! Parser configuration

use serde::{Deserialize, Serialize};

/// Controls the two-stage parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParserConfig {
    /// Try the error-recovering parser before the strict one.
    pub lenient: bool,
    /// Fraction of significant input the recovering parser must cover for
    /// its tree to be accepted.
    pub min_coverage: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            lenient: true,
            min_coverage: 0.95,
        }
    }
}

impl ParserConfig {
    pub fn strict() -> Self {
        ParserConfig {
            lenient: false,
            ..Default::default()
        }
    }
}
