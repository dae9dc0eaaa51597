//! yamlmeta-check - validate a YAML document against a schema
//!
//! Prints one diagnostic per error and exits with status 1 when the
//! document does not conform.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use yamlmeta_annotated::ParserConfig;
use yamlmeta_mapped_text::MappedText;
use yamlmeta_validation::{
    LocalizedError, LocalizerConfig, Schema, SchemaRegistry, ValidationConfig, ValidatorQueue,
};

#[derive(Parser, Debug)]
#[command(name = "yamlmeta-check")]
#[command(about = "Validate a YAML document against a yamlmeta schema")]
#[command(version)]
struct Args {
    /// Schema file, written in the yamlmeta schema vocabulary
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Document to validate
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Only use the strict YAML parser; syntax errors fail immediately
    #[arg(long)]
    strict: bool,

    /// Print errors as a JSON array
    #[arg(long)]
    json: bool,

    /// Report every raw error instead of the most relevant ones
    #[arg(long)]
    no_prune: bool,

    /// Share of the input the recovering parser must cover
    #[arg(long, value_name = "F", default_value_t = ParserConfig::default().min_coverage)]
    min_coverage: f64,

    /// How close a misspelling must be to get a "did you mean" hint
    #[arg(long, value_name = "F", default_value_t = LocalizerConfig::default().typo_threshold)]
    typo_threshold: f64,
}

impl Args {
    fn config(&self) -> ValidationConfig {
        ValidationConfig {
            parser: ParserConfig {
                lenient: !self.strict,
                min_coverage: self.min_coverage,
            },
            localizer: LocalizerConfig {
                typo_threshold: self.typo_threshold,
                prune_errors: !self.no_prune,
                ..Default::default()
            },
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("YAMLMETA_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "yamlmeta=warn".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_source(path: &Path) -> Result<MappedText> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(MappedText::from_literal(text, Some(&path.display().to_string())))
}

/// Parse, convert and register the schema. A schema without `$id` is
/// registered under its file name.
fn load_schema(
    source: &MappedText,
    registry: &SchemaRegistry,
    config: &ParserConfig,
) -> Result<Arc<Schema>> {
    let name = source.file_name().unwrap_or_else(|| "schema".to_string());
    let node = yamlmeta_annotated::parse_with_config(source, config)
        .with_context(|| format!("Failed to parse schema {}", name))?;
    let mut schema =
        Schema::from_yaml(&node).with_context(|| format!("Invalid schema {}", name))?;
    if schema.id().is_none() {
        schema = schema.with_id(name.clone());
    }
    registry
        .define(schema)
        .with_context(|| format!("Failed to define schema {}", name))
}

async fn check(
    schema_source: &MappedText,
    input: &MappedText,
    config: &ValidationConfig,
) -> Result<Vec<LocalizedError>> {
    let registry = Arc::new(SchemaRegistry::new());
    let schema = load_schema(schema_source, &registry, &config.parser)?;
    let name = input.file_name().unwrap_or_else(|| "input".to_string());
    let document = yamlmeta_annotated::parse_with_config(input, &config.parser)
        .with_context(|| format!("Failed to parse {}", name))?;
    let queue = ValidatorQueue::with_config(registry, config.localizer.clone());
    let errors = queue
        .validate(&schema, &document, input)
        .await
        .with_context(|| format!("Failed to validate {}", name))?;
    Ok(errors)
}

fn render(errors: &[LocalizedError], json: bool) -> Result<String> {
    if json {
        let values: Vec<_> = errors.iter().map(LocalizedError::to_json).collect();
        return Ok(serde_json::to_string_pretty(&values)?);
    }
    Ok(errors
        .iter()
        .map(|e| e.to_diagnostic().to_text().trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let args = Args::parse();
    let config = args.config();

    let schema = read_source(&args.schema)?;
    let input = read_source(&args.input)?;
    let errors = check(&schema, &input, &config).await?;

    tracing::info!(
        input = %args.input.display(),
        errors = errors.len(),
        "Validation finished"
    );

    if args.json || !errors.is_empty() {
        println!("{}", render(&errors, args.json)?);
    }
    Ok(if errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const SCHEMA: &str = "object:\n  closed: true\n  properties:\n    toc: boolean\n    title: string\n";

    fn text(value: &str, name: &str) -> MappedText {
        MappedText::from_literal(value, Some(name))
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_map_to_config() {
        let args = Args::try_parse_from([
            "yamlmeta-check",
            "--schema",
            "s.yml",
            "--input",
            "i.yml",
            "--strict",
            "--no-prune",
            "--typo-threshold",
            "0.5",
        ])
        .unwrap();
        let config = args.config();
        assert!(!config.parser.lenient);
        assert_eq!(config.parser.min_coverage, 0.95);
        assert!(!config.localizer.prune_errors);
        assert_eq!(config.localizer.typo_threshold, 0.5);
    }

    #[test]
    fn test_defaults_match_library() {
        let args =
            Args::try_parse_from(["yamlmeta-check", "-s", "s.yml", "-i", "i.yml"]).unwrap();
        assert_eq!(args.config(), ValidationConfig::default());
    }

    #[test]
    fn test_schema_without_id_uses_file_name() {
        let registry = SchemaRegistry::new();
        let schema = load_schema(
            &text(SCHEMA, "front-matter.yml"),
            &registry,
            &ParserConfig::default(),
        )
        .unwrap();
        assert_eq!(schema.id(), Some("front-matter.yml"));
        assert!(registry.contains("front-matter.yml"));
    }

    #[tokio::test]
    async fn test_check_reports_errors() {
        let errors = check(
            &text(SCHEMA, "schema.yml"),
            &text("toc: yes\ntitel: Notes\n", "doc.yml"),
            &ValidationConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(errors.len(), 2);

        let rendered = render(&errors, false).unwrap();
        assert!(rendered.contains("Try using true instead."));

        let json: serde_json::Value = serde_json::from_str(&render(&errors, true).unwrap()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert_eq!(json[0]["instancePath"], "toc");
    }

    #[tokio::test]
    async fn test_check_accepts_valid_document() {
        let errors = check(
            &text(SCHEMA, "schema.yml"),
            &text("toc: true\ntitle: Notes\n", "doc.yml"),
            &ValidationConfig::default(),
        )
        .await
        .unwrap();
        assert!(errors.is_empty());
        assert_eq!(render(&errors, true).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_invalid_schema_is_an_error() {
        let err = check(
            &text("object:\n  properties: [a, b]\n", "schema.yml"),
            &text("a: 1\n", "doc.yml"),
            &ValidationConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("schema.yml"));
    }
}
