//! ebook-forge – lays out an ebook JSON document as PDF, DOCX, PPTX and HWPX.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use ebook_forge::assets::{LocalAssets, RetryingFetcher};
use ebook_forge::config::LayoutConstants;
use ebook_forge::fixtures::sample_document;
use ebook_forge::fonts::FontRegistry;
use ebook_forge::model::EbookDocument;
use ebook_forge::package::Format;
use ebook_forge::pipeline::{chapter_page_index, generate_all, RenderContext};

#[derive(Parser)]
#[command(name = "ebook-forge")]
#[command(version, about = "Ebook layout and multi-format packaging", long_about = None)]
#[command(after_help = "EXAMPLES:
    ebook-forge book.json                     Write all four formats
    ebook-forge book.json -f pdf -f hwpx      Only PDF and HWPX
    ebook-forge --sample --page-index         Show table-of-contents page numbers")]
struct Cli {
    /// Ebook document (JSON)
    #[arg(value_name = "INPUT", required_unless_present = "sample")]
    input: Option<PathBuf>,

    /// Use the built-in sample document instead of INPUT
    #[arg(long, conflicts_with = "input")]
    sample: bool,

    /// Layout configuration; missing file means defaults
    #[arg(short, long, default_value = "user_config.json")]
    config: PathBuf,

    /// Output directory (overrides the configuration's output_dir)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Format to produce; repeat for several (default: all)
    #[arg(short, long = "format", value_name = "FORMAT")]
    formats: Vec<Format>,

    /// Print the chapter page index per format instead of writing files
    #[arg(long)]
    page_index: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ebook_forge::Result<()> {
    let doc = match &cli.input {
        Some(path) if !cli.sample => EbookDocument::from_json(&fs::read_to_string(path)?)?,
        _ => sample_document(),
    };

    let mut constants = LayoutConstants::load(&cli.config)?;
    if let Some(dir) = cli.out_dir {
        constants.output_dir = dir;
    }

    let formats = if cli.formats.is_empty() {
        Format::ALL.to_vec()
    } else {
        cli.formats
    };

    let base_dir = cli
        .input
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let fonts = FontRegistry::discover(&constants);
    let assets = RetryingFetcher::new(LocalAssets::with_base_dir(base_dir));
    let ctx = RenderContext {
        doc: &doc,
        constants: &constants,
        fonts: &fonts,
        assets: &assets,
    };

    if cli.page_index {
        let mut indexes = BTreeMap::new();
        for format in formats {
            indexes.insert(format, chapter_page_index(format, ctx)?);
        }
        println!("{}", serde_json::to_string_pretty(&indexes)?);
        return Ok(());
    }

    let report = generate_all(&formats, ctx, &constants.output_dir)?;
    println!("{}", report.to_json());
    Ok(())
}
