//! The `extract` command: archived HTML → structured JSON.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Args;
use tracing::info;

use crate::archive;
use crate::config::Settings;
use crate::extract::extract_all;

#[derive(Args)]
pub struct ExtractArgs {
    /// Archive file to extract from (default: latest in <output_dir>/html)
    file: Option<PathBuf>,

    /// Output JSON path (default: <output_dir>/output/product_<ts>.json)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub fn run(settings: Settings, args: ExtractArgs) -> anyhow::Result<()> {
    let input = match args.file {
        Some(path) => path,
        None => latest_archive(&settings.output_dir.join("html"))
            .context("no archive files found; run `rhv scrape` first")?,
    };
    info!("extracting from {}", input.display());

    let pages = archive::load_pages(&input)
        .with_context(|| format!("loading archive {}", input.display()))?;
    println!("Loaded {} page(s) from {}", pages.len(), input.display());

    let record = extract_all(&pages);

    let output = args.output.unwrap_or_else(|| {
        settings.output_dir.join("output").join(format!(
            "product_{}.json",
            Local::now().format("%Y%m%d_%H%M%S")
        ))
    });
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&record)?;
    std::fs::write(&output, json)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("Title:   {}", record.product_title.as_deref().unwrap_or("<none>"));
    println!("Price:   {}", record.price.as_deref().unwrap_or("<none>"));
    println!("Bullets: {}", record.about_this_item.len());
    println!("Reviews: {}", record.reviews.len());
    println!("Output:  {}", output.display());
    Ok(())
}

/// Most recently named harvest archive in a directory.
fn latest_archive(dir: &std::path::Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("harvest_") && n.ends_with(".html"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    candidates.pop()
}
