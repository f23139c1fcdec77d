//! Batch command - extract fields from many PDFs concurrently.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use invex_core::{DocumentProcessor, ExtractionResult};

use super::{build_processor, describe, file_name_of, format_result, load_config, with_templates_dir, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern selecting the input PDFs
    #[arg(required = true)]
    input: String,

    /// Template directory (overrides the config)
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of documents processed at once
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome of one document.
struct FileOutcome {
    path: PathBuf,
    result: Result<ExtractionResult, String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = with_templates_dir(load_config(config_path)?, args.templates.as_ref());

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            ext.eq_ignore_ascii_case("pdf")
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let processor = Arc::new(build_processor(&config)?);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let outcomes = process_all(files, processor, args.jobs.max(1), &pb).await?;
    pb.finish_and_clear();

    if !args.continue_on_error {
        if let Some(failed) = outcomes.iter().find(|o| o.result.is_err()) {
            let message = failed.result.as_ref().err().cloned().unwrap_or_default();
            error!("Failed to process {}: {}", failed.path.display(), message);
            anyhow::bail!("Processing failed for {}: {}", failed.path.display(), message);
        }
    }

    if let Some(output_dir) = &args.output_dir {
        for outcome in &outcomes {
            if let Ok(result) = &outcome.result {
                let stem = outcome.path.file_stem().and_then(|s| s.to_str()).unwrap_or("document");
                let output_path = output_dir.join(format!("{}.{}", stem, args.format.extension()));
                fs::write(&output_path, format_result(result, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    } else {
        for outcome in &outcomes {
            if let Ok(result) = &outcome.result {
                println!("{}", serde_json::to_string(result)?);
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.result.as_ref().err().map(String::as_str).unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Run every file on the blocking pool, at most `jobs` at a time. Outcomes
/// come back in input order.
async fn process_all(
    files: Vec<PathBuf>,
    processor: Arc<DocumentProcessor>,
    jobs: usize,
    pb: &ProgressBar,
) -> anyhow::Result<Vec<FileOutcome>> {
    let semaphore = Arc::new(Semaphore::new(jobs));
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let permit = semaphore.clone().acquire_owned().await?;
        let processor = processor.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let outcome = process_file(&processor, path);
            drop(permit);
            outcome
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        let outcome = handle.await?;
        if let Err(e) = &outcome.result {
            warn!("Failed to process {}: {}", outcome.path.display(), e);
        }
        pb.inc(1);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn process_file(processor: &DocumentProcessor, path: PathBuf) -> FileOutcome {
    let start = Instant::now();
    let result = match fs::read(&path) {
        Ok(data) => processor
            .process(&file_name_of(&path), &data)
            .map_err(|e| describe(e).to_string()),
        Err(e) => Err(e.to_string()),
    };
    FileOutcome {
        path,
        result,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }
}

fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "template_name",
        "fields",
        "processing_time_ms",
        "error",
    ])?;

    for outcome in outcomes {
        let filename = file_name_of(&outcome.path);
        let time = outcome.processing_time_ms.to_string();
        match &outcome.result {
            Ok(result) => wtr.write_record([
                filename.as_str(),
                "success",
                result.template_name.as_str(),
                serde_json::to_string(&result.fields)?.as_str(),
                time.as_str(),
                "",
            ])?,
            Err(e) => wtr.write_record([filename.as_str(), "error", "", "", time.as_str(), e.as_str()])?,
        }
    }

    wtr.flush()?;
    Ok(())
}
