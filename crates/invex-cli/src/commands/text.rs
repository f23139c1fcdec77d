//! Text command - show what the engine reads from a PDF.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use invex_core::{GlyphDecoder, InvexError, PdfGlyphDecoder};

use super::{describe, load_config};

/// Arguments for the text command.
#[derive(Args)]
pub struct TextArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Print each line with its baseline and height
    #[arg(long)]
    lines: bool,
}

pub async fn run(args: TextArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let data = fs::read(&args.input)?;
    let page = PdfGlyphDecoder::from_config(&config.pdf)
        .decode(&data)
        .map_err(|e| describe(InvexError::PdfParse(e)))?;
    let reconstructor = config.layout.reconstructor();

    if args.lines {
        println!(
            "{}",
            style(format!("Page {:.0}x{:.0}, {} glyphs", page.width, page.height, page.glyphs.len())).dim()
        );
        for line in reconstructor.lines(&page.glyphs) {
            println!("{:>8.1} {:>5.1}  {}", line.y, line.height, line.text);
        }
    } else {
        println!("{}", reconstructor.text(&page.glyphs));
    }

    Ok(())
}
