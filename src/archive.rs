//! Append-only raw-page archive.
//!
//! Every page the traversal reaches is written immediately, so a run
//! that aborts midway still leaves usable output. Pages live in one
//! growing file, each introduced by a metadata header between two
//! 80-character rules:
//!
//! ```text
//! ================================================================================
//! PAGE: reviews_page_2
//! URL: https://...
//! TIMESTAMP: 2026-08-05 14:02:11
//! SIZE: 482133 bytes
//! ================================================================================
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Local;
use regex::Regex;
use tracing::{debug, info};

const RULE: &str = "================================================================================";

fn header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"={80}\nPAGE:\s*(.+?)\nURL:\s*(.*?)\nTIMESTAMP:\s*(.*?)\nSIZE:\s*(.*?)\n={80}")
            .expect("header pattern is valid")
    })
}

/// Writer half: appends labeled pages to a single archive file.
pub struct PageArchive {
    path: PathBuf,
    file: File,
    pages_written: u32,
    bytes_written: u64,
}

impl PageArchive {
    /// Open (or create) an archive for appending.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            pages_written: 0,
            bytes_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pages_written(&self) -> u32 {
        self.pages_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append one labeled page. The write is flushed before returning
    /// so a crash later in the run cannot lose this page.
    pub fn append(&mut self, label: &str, url: &str, content: &str) -> std::io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let header = format!(
            "{rule}\nPAGE: {label}\nURL: {url}\nTIMESTAMP: {timestamp}\nSIZE: {size} bytes\n{rule}\n\n",
            rule = RULE,
            label = label,
            url = url,
            timestamp = timestamp,
            size = content.len(),
        );

        self.file.write_all(header.as_bytes())?;
        self.file.write_all(content.as_bytes())?;
        self.file.write_all(b"\n\n")?;
        self.file.flush()?;

        self.pages_written += 1;
        self.bytes_written += content.len() as u64;

        info!(
            "archived {} ({} bytes) to {}",
            label,
            content.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// One page recovered from an archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedPage {
    pub label: String,
    pub url: String,
    pub timestamp: String,
    pub content: String,
}

/// Split archive content into its labeled pages.
///
/// Content with no delimiters at all is treated as a single page
/// labeled `full_file`, so plain saved HTML loads too.
pub fn split_pages(raw: &str) -> Vec<ArchivedPage> {
    let headers: Vec<_> = header_pattern().captures_iter(raw).collect();

    if headers.is_empty() {
        debug!("no page delimiters found, treating input as one page");
        return vec![ArchivedPage {
            label: "full_file".to_string(),
            url: String::new(),
            timestamp: String::new(),
            content: raw.to_string(),
        }];
    }

    let mut pages = Vec::with_capacity(headers.len());
    for (i, caps) in headers.iter().enumerate() {
        let whole = caps.get(0).expect("group 0 always present");
        let start = whole.end();
        let end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(raw.len());

        pages.push(ArchivedPage {
            label: caps[1].trim().to_string(),
            url: caps[2].trim().to_string(),
            timestamp: caps[3].trim().to_string(),
            content: raw[start..end].trim().to_string(),
        });
    }

    debug!("split archive into {} page(s)", pages.len());
    pages
}

/// Read an archive file and split it.
pub fn load_pages(path: impl AsRef<Path>) -> std::io::Result<Vec<ArchivedPage>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(split_pages(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multiple_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.html");

        let inputs = [
            ("product_page", "https://shop.example/dp/B000", "<html>product</html>"),
            ("reviews_page_1", "https://shop.example/reviews/1", "<html>reviews one</html>"),
            ("reviews_page_2", "https://shop.example/reviews/2", "<html>reviews two</html>"),
        ];

        {
            let mut archive = PageArchive::open(&path).unwrap();
            for (label, url, content) in &inputs {
                archive.append(label, url, content).unwrap();
            }
            assert_eq!(archive.pages_written(), 3);
        }

        let pages = load_pages(&path).unwrap();
        assert_eq!(pages.len(), 3);
        for (page, (label, url, content)) in pages.iter().zip(&inputs) {
            assert_eq!(page.label, *label);
            assert_eq!(page.url, *url);
            assert_eq!(page.content, *content);
            assert!(!page.timestamp.is_empty());
        }
    }

    #[test]
    fn no_delimiters_yields_single_full_file_page() {
        let raw = "<html><body>just a saved page</body></html>";
        let pages = split_pages(raw);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].label, "full_file");
        assert_eq!(pages[0].content, raw);
        assert!(pages[0].url.is_empty());
    }

    #[test]
    fn appending_to_existing_archive_extends_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.html");

        {
            let mut archive = PageArchive::open(&path).unwrap();
            archive.append("product_page", "u1", "first").unwrap();
        }
        {
            let mut archive = PageArchive::open(&path).unwrap();
            archive.append("reviews_page_1", "u2", "second").unwrap();
        }

        let pages = load_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].content, "first");
        assert_eq!(pages[1].content, "second");
    }

    #[test]
    fn byte_counter_tracks_content_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.html");
        let mut archive = PageArchive::open(&path).unwrap();
        archive.append("product_page", "u", "12345").unwrap();
        assert_eq!(archive.bytes_written(), 5);
    }

    #[test]
    fn content_containing_equals_lines_shorter_than_rule_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.html");
        let tricky = "before\n==========\nafter";

        let mut archive = PageArchive::open(&path).unwrap();
        archive.append("product_page", "u", tricky).unwrap();
        drop(archive);

        let pages = load_pages(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].content, tricky);
    }
}
