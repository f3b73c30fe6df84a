//! CLI parser and command dispatch.

mod extract;
mod fingerprint;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "rhv")]
#[command(about = "E-commerce product and review acquisition with anti-detection browsing")]
#[command(version)]
pub struct Cli {
    /// Settings file path (defaults to ./reviewharvest.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a product page and its review pagination into an archive
    Scrape(scrape::ScrapeArgs),

    /// Extract structured product/review JSON from an archive file
    Extract(extract::ExtractArgs),

    /// Generate and print a browser fingerprint
    Fingerprint(fingerprint::FingerprintArgs),
}

/// Checked before the tracing subscriber exists, so it scans raw args.
pub fn is_verbose() -> bool {
    std::env::args().any(|a| a == "-v" || a == "--verbose")
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // The verbose flag itself is consumed before parsing, in
    // is_verbose(), because logging must exist before clap runs.
    let _ = cli.verbose;
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Scrape(args) => scrape::run(settings, args).await,
        Command::Extract(args) => extract::run(settings, args),
        Command::Fingerprint(args) => fingerprint::run(args),
    }
}
