//! The `scrape` command: drive a product page and its review
//! pagination into a raw-page archive.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Args;
use tracing::{info, warn};

use crate::archive::PageArchive;
use crate::browser::cdp::CdpLauncher;
use crate::config::Settings;
use crate::identity::ProxyPool;
use crate::paginate::{CrawlOutcome, ReviewCrawl};
use crate::session::ProtectedSession;
use crate::throttle::Throttle;

#[derive(Args)]
pub struct ScrapeArgs {
    /// Product page URL to start from
    url: String,

    /// Archive file to append to (default: <output_dir>/html/harvest_<ts>.html)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Proxy endpoint, host:port or host:port:user:pass (repeatable)
    #[arg(long = "proxy")]
    proxies: Vec<String>,

    /// File with one proxy endpoint per line
    #[arg(long)]
    proxy_file: Option<PathBuf>,

    /// Maximum review pages to visit
    #[arg(long)]
    max_pages: Option<u32>,

    /// Fixed fingerprint seed for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Run with a visible browser window (needed for manual captcha solving)
    #[arg(long)]
    headed: bool,
}

pub async fn run(mut settings: Settings, args: ScrapeArgs) -> anyhow::Result<()> {
    if args.headed {
        settings.browser.headless = false;
    }
    if let Some(seed) = args.seed {
        settings.crawl.fingerprint_seed = Some(seed);
    }
    if let Some(max) = args.max_pages {
        settings.crawl.max_review_pages = max;
    }

    let mut proxy_entries = settings.proxies.clone();
    proxy_entries.extend(args.proxies.iter().cloned());
    if let Some(ref path) = args.proxy_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading proxy file {}", path.display()))?;
        proxy_entries.extend(raw.lines().map(|l| l.to_string()));
    }
    let pool = ProxyPool::from_strings(&proxy_entries);
    info!("{} proxy endpoint(s) configured", pool.len());

    let archive_path = args.output.clone().unwrap_or_else(|| {
        settings
            .output_dir
            .join("html")
            .join(format!("harvest_{}.html", Local::now().format("%Y%m%d_%H%M%S")))
    });
    let archive = PageArchive::open(&archive_path)
        .with_context(|| format!("opening archive {}", archive_path.display()))?;

    let launcher = Box::new(CdpLauncher::new(settings.browser.clone()));
    let session = ProtectedSession::new(
        launcher,
        pool,
        Throttle::new(settings.throttle.to_config()),
        settings.crawl.to_session_config(),
    );
    let mut crawl = ReviewCrawl::new(session, archive, settings.crawl.to_crawl_config());

    info!("starting crawl of {}", args.url);

    // Ctrl-C unwinds cleanly: the in-flight future is dropped, the
    // browser is closed, and everything archived so far stays on disk.
    let result = tokio::select! {
        result = crawl.run(&args.url) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let report = match result {
        Some(Ok(report)) => report,
        Some(Err(e)) => {
            crawl.shutdown().await;
            return Err(e.into());
        }
        None => {
            warn!("interrupted, closing browser");
            crawl.shutdown().await;
            println!("Interrupted. Partial archive kept at {}", archive_path.display());
            return Ok(());
        }
    };

    crawl.shutdown().await;

    println!("Archive: {}", archive_path.display());
    println!(
        "Pages:   {} ({} bytes)",
        report.pages_saved, report.bytes_saved
    );
    match report.outcome {
        CrawlOutcome::Done => {
            println!("Status:  complete");
            Ok(())
        }
        CrawlOutcome::Aborted { reason } => {
            println!("Status:  aborted ({})", reason);
            anyhow::bail!("crawl aborted: {}", reason)
        }
    }
}
