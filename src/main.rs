use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::{path::PathBuf, time::Instant};

use imgdesc::{
    ContentProcessor, Settings,
    record::{default_output_path, graft, load_record, save_record, select},
    setup::{initialize_folder, initialize_logger},
};

#[derive(Parser)]
#[command(name = "imgdesc")]
#[command(about = "Replace image links in a JSON record with content descriptions")]
#[command(version)]
struct Cli {
    /// JSON document to process
    input: PathBuf,

    /// Where to write the result (defaults to `<input stem>_processed.json`)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// JSON pointer selecting the record inside the document, e.g. `/info/input`
    #[arg(long, short = 'p', default_value = "")]
    pointer: String,

    /// Keys whose subtrees are never touched (repeatable, overrides IMGDESC_EXCLUDED_KEYS)
    #[arg(long = "exclude", value_name = "KEY")]
    excluded_keys: Vec<String>,

    /// Regex an image link must match
    #[arg(long = "pattern", value_name = "REGEX")]
    link_pattern: Option<String>,

    #[arg(long)]
    max_depth: Option<usize>,

    #[arg(long)]
    min_size_kb: Option<u64>,

    /// Response field that must be true-like for a description to be used
    #[arg(long = "valid-key", value_name = "KEY")]
    valid_response_key: Option<String>,

    /// Save downloaded images into this folder
    #[arg(long)]
    image_dir: Option<PathBuf>,
}

impl Cli {
    /// Command line flags win over environment settings
    fn apply(&self, settings: &mut Settings) {
        if !self.excluded_keys.is_empty() {
            settings.excluded_keys = self.excluded_keys.clone();
        }
        if let Some(pattern) = &self.link_pattern {
            settings.link_pattern = Some(pattern.clone());
        }
        if let Some(depth) = self.max_depth {
            settings.max_depth = Some(depth);
        }
        if let Some(min) = self.min_size_kb {
            settings.min_size_kb = min;
        }
        if let Some(key) = &self.valid_response_key {
            settings.valid_response_key = Some(key.clone());
        }
        if let Some(dir) = &self.image_dir {
            settings.image_dir = Some(dir.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logger();
    let start = Instant::now();

    let mut settings = Settings::from_env()?;
    cli.apply(&mut settings);

    let processor = ContentProcessor::from_settings(&settings)
        .context("invalid configuration")?;
    initialize_folder(settings.image_dir.as_deref())?;

    let mut document = load_record(&cli.input)?;
    info!("Loaded {:?}", cli.input);
    let record = select(&document, &cli.pointer)?;

    let processed = processor.process(record);
    graft(&mut document, &cli.pointer, processed.record)?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    save_record(&output, &document)?;

    info!(
        duration = &*format!("{:?}", start.elapsed());
        "Wrote {:?} ({} of {} links replaced)",
        output,
        processed.report.replaced.len(),
        processed.report.validated
    );
    Ok(())
}
