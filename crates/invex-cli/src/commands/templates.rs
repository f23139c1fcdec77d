//! Templates command - inspect, validate and edit the template directory.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use tracing::info;

use invex_core::models::config::InvexConfig;
use invex_core::{FileSystemTemplateStore, StrategyRegistry, Template, TemplateStore};

use super::{build_processor, describe, file_name_of, load_config, with_templates_dir};

/// Arguments for the templates command.
#[derive(Args)]
pub struct TemplatesArgs {
    /// Template directory (overrides the config)
    #[arg(short, long, global = true)]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: TemplatesCommand,
}

#[derive(Subcommand)]
enum TemplatesCommand {
    /// List templates in matching order
    List,

    /// Print one template as JSON
    Show {
        /// Template name
        name: String,
    },

    /// Check every field's strategy and options
    Validate,

    /// Show which template a PDF matches
    Match {
        /// Input PDF file
        input: PathBuf,
    },

    /// Add or replace templates from a JSON file (one template or an array)
    Import {
        /// JSON file
        file: PathBuf,
    },

    /// Delete a template by name
    Delete {
        /// Template name
        name: String,
    },
}

pub async fn run(args: TemplatesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = with_templates_dir(load_config(config_path)?, args.templates.as_ref());

    match args.command {
        TemplatesCommand::List => list(&config),
        TemplatesCommand::Show { name } => show(&config, &name),
        TemplatesCommand::Validate => validate(&config),
        TemplatesCommand::Match { input } => match_file(&config, &input),
        TemplatesCommand::Import { file } => import(&config, &file),
        TemplatesCommand::Delete { name } => delete(&config, &name),
    }
}

fn open_store(config: &InvexConfig) -> anyhow::Result<FileSystemTemplateStore> {
    Ok(FileSystemTemplateStore::with_options(
        config.templates.path.clone(),
        config.templates.read_only,
    )?)
}

fn open_writable_store(config: &InvexConfig) -> anyhow::Result<FileSystemTemplateStore> {
    let store = open_store(config)?;
    if store.is_read_only() {
        anyhow::bail!(
            "Template directory {} is read-only (templates.read_only)",
            store.dir().display()
        );
    }
    Ok(store)
}

fn list(config: &InvexConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let snapshot = store.snapshot();

    if snapshot.is_empty() {
        println!("{} No templates in {}", style("ℹ").blue(), store.dir().display());
        return Ok(());
    }

    for template in snapshot.iter() {
        println!(
            "{}  identifiers: [{}]  fields: {}",
            style(&template.template_name).bold(),
            template.identifiers.join(", "),
            template.fields.len()
        );
    }
    Ok(())
}

fn show(config: &InvexConfig, name: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let template = store
        .get_by_name(name)
        .ok_or_else(|| anyhow::anyhow!("Template not found: {}", name))?;
    println!("{}", serde_json::to_string_pretty(&template)?);
    Ok(())
}

fn validate(config: &InvexConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let registry = StrategyRegistry::with_defaults();
    let snapshot = store.snapshot();

    let mut failures = 0;
    for template in snapshot.iter() {
        let problems = registry.validate_template(template);
        if problems.is_empty() {
            println!("{} {}", style("✓").green(), template.template_name);
            continue;
        }
        failures += problems.len();
        println!("{} {}", style("✗").red(), template.template_name);
        for problem in problems {
            println!("    - {}", problem);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} problem(s) found in {} template(s)", failures, snapshot.len());
    }
    Ok(())
}

fn match_file(config: &InvexConfig, input: &Path) -> anyhow::Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let processor = build_processor(config)?;
    let page = processor.decode(&fs::read(input)?).map_err(describe)?;
    let text = processor.page_text(&page);

    match processor.store().find_template_for(&text) {
        Some(template) => {
            println!("{}", template.template_name);
            Ok(())
        }
        None => anyhow::bail!("No template matched {}", file_name_of(input)),
    }
}

fn import(config: &InvexConfig, file: &Path) -> anyhow::Result<()> {
    let content = fs::read_to_string(file)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let templates: Vec<Template> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };

    let registry = StrategyRegistry::with_defaults();
    let store = open_writable_store(config)?;
    for template in templates {
        for problem in registry.validate_template(&template) {
            eprintln!(
                "{} {}: {}",
                style("⚠").yellow(),
                template.template_name,
                problem
            );
        }
        let name = template.template_name.clone();
        store.save(template)?;
        info!("Saved template '{}'", name);
        println!(
            "{} Saved {} to {}",
            style("✓").green(),
            name,
            store.path_for(&name).display()
        );
    }
    Ok(())
}

fn delete(config: &InvexConfig, name: &str) -> anyhow::Result<()> {
    let store = open_writable_store(config)?;
    if !store.delete(name)? {
        anyhow::bail!("Template not found: {}", name);
    }
    println!("{} Deleted {}", style("✓").green(), name);
    Ok(())
}
