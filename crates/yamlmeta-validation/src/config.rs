//! Validation configuration

use serde::{Deserialize, Serialize};
use yamlmeta_annotated::ParserConfig;

/// Tuning knobs of the error localizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LocalizerConfig {
    /// A "did you mean" suggestion is offered only when the best edit
    /// distance is at most `len * 10 * typo_threshold`.
    pub typo_threshold: f64,
    /// Prune prefix errors and narrow `anyOf` failures. When off, every raw
    /// error is reported.
    pub prune_errors: bool,
    /// Upper bound on `anyOf` narrowing rounds.
    pub max_narrowing_rounds: usize,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        LocalizerConfig {
            typo_threshold: 0.3,
            prune_errors: true,
            max_narrowing_rounds: 16,
        }
    }
}

/// Parser and localizer settings for one validation setup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ValidationConfig {
    pub parser: ParserConfig,
    pub localizer: LocalizerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::default();
        assert!(config.parser.lenient);
        assert_eq!(config.parser.min_coverage, 0.95);
        assert_eq!(config.localizer.typo_threshold, 0.3);
        assert!(config.localizer.prune_errors);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: ValidationConfig =
            serde_json::from_str(r#"{"localizer": {"typo-threshold": 0.5}}"#).unwrap();
        assert_eq!(config.localizer.typo_threshold, 0.5);
        assert_eq!(config.localizer.max_narrowing_rounds, 16);
        assert_eq!(config.parser, ParserConfig::default());
    }
}
