//! Subcommands and the plumbing they share.

pub mod batch;
pub mod config;
pub mod process;
pub mod templates;
pub mod text;

use std::path::{Path, PathBuf};

use tracing::debug;

use invex_core::models::config::InvexConfig;
use invex_core::{DocumentProcessor, ExtractionResult, InvexError};

/// Load the configuration named by `--config`, or the defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InvexConfig> {
    match config_path {
        Some(path) => InvexConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path, e)),
        None => Ok(InvexConfig::default()),
    }
}

/// Apply a `--templates` override on top of the loaded configuration.
pub fn with_templates_dir(mut config: InvexConfig, templates: Option<&PathBuf>) -> InvexConfig {
    if let Some(dir) = templates {
        config.templates.path = dir.clone();
    }
    config
}

/// Build the pipeline. Misconfigured templates are rejected here, before
/// any document is read.
pub fn build_processor(config: &InvexConfig) -> anyhow::Result<DocumentProcessor> {
    debug!("Loading templates from {}", config.templates.path.display());
    DocumentProcessor::from_config(config).map_err(describe)
}

/// File name handed to the engine for a path on disk.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Attach the stable error kind and code to an engine error.
pub fn describe(err: InvexError) -> anyhow::Error {
    anyhow::anyhow!("{} [{} {}]", err, err.kind(), err.code())
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["file_name", "template_name"];
    header.extend(result.fields.keys().map(String::as_str));
    wtr.write_record(&header)?;

    let mut row = vec![result.file_name.as_str(), result.template_name.as_str()];
    row.extend(result.fields.values().map(String::as_str));
    wtr.write_record(&row)?;

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(result: &ExtractionResult) -> String {
    let mut output = String::new();
    output.push_str(&format!("File: {}\n", result.file_name));
    output.push_str(&format!("Template: {}\n", result.template_name));
    output.push('\n');

    let width = result.fields.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for (name, value) in &result.fields {
        output.push_str(&format!("  {:width$}  {}\n", name, value, width = width));
    }
    output
}
