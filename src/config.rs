//! Settings file handling.
//!
//! Configuration comes from an optional TOML file plus CLI overrides.
//! Every field has a sensible default so the tool runs with no config
//! at all.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::browser::interact::ScrollOptions;
use crate::browser::BrowserConfig;
use crate::paginate::CrawlConfig;
use crate::session::SessionConfig;
use crate::throttle::ThrottleConfig;

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "reviewharvest.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base directory for archives and extracted output.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub throttle: ThrottleSettings,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub crawl: CrawlSettings,

    /// Proxy endpoints, `host:port` or `host:port:user:pass`.
    #[serde(default)]
    pub proxies: Vec<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            throttle: ThrottleSettings::default(),
            browser: BrowserConfig::default(),
            crawl: CrawlSettings::default(),
            proxies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleSettings {
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: u32,
}

fn default_min_delay() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    5.0
}

fn default_burst_threshold() -> u32 {
    10
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            burst_threshold: default_burst_threshold(),
        }
    }
}

impl ThrottleSettings {
    pub fn to_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            min_delay: Duration::from_secs_f64(self.min_delay_secs),
            max_delay: Duration::from_secs_f64(self.max_delay_secs.max(self.min_delay_secs)),
            burst_threshold: self.burst_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    #[serde(default = "default_max_review_pages")]
    pub max_review_pages: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_solve_timeout")]
    pub solve_timeout_secs: u64,
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
    #[serde(default = "default_scroll_step")]
    pub scroll_step_px: u32,
    /// Fixed fingerprint seed for reproducible sessions.
    #[serde(default)]
    pub fingerprint_seed: Option<u64>,
}

fn default_max_review_pages() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_solve_timeout() -> u64 {
    300
}

fn default_load_timeout() -> u64 {
    15
}

fn default_scroll_step() -> u32 {
    300
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_review_pages: default_max_review_pages(),
            max_retries: default_max_retries(),
            solve_timeout_secs: default_solve_timeout(),
            load_timeout_secs: default_load_timeout(),
            scroll_step_px: default_scroll_step(),
            fingerprint_seed: None,
        }
    }
}

impl CrawlSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            max_retries: self.max_retries,
            load_timeout: Duration::from_secs(self.load_timeout_secs),
            solve_timeout: Duration::from_secs(self.solve_timeout_secs),
            fingerprint_seed: self.fingerprint_seed,
            ..SessionConfig::default()
        }
    }

    pub fn to_crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            max_review_pages: self.max_review_pages,
            max_retries: self.max_retries,
            scroll: ScrollOptions {
                step_px: self.scroll_step_px,
                ..ScrollOptions::default()
            },
            ..CrawlConfig::default()
        }
    }
}

impl Settings {
    /// Load settings from an explicit path, or the default file if it
    /// exists, or built-in defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if !default.exists() {
                    debug!("no settings file, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        debug!("settings loaded from {}", path.display());
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.throttle.burst_threshold, 10);
        assert_eq!(settings.crawl.max_review_pages, 50);
        assert!(settings.browser.headless);
        assert!(settings.proxies.is_empty());
    }

    #[test]
    fn partial_sections_fill_in() {
        let settings: Settings = toml::from_str(
            r#"
            proxies = ["10.0.0.1:8080"]

            [throttle]
            min_delay_secs = 1.0

            [crawl]
            max_review_pages = 5
            fingerprint_seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(settings.throttle.min_delay_secs, 1.0);
        assert_eq!(settings.throttle.max_delay_secs, 5.0);
        assert_eq!(settings.crawl.max_review_pages, 5);
        assert_eq!(settings.crawl.fingerprint_seed, Some(42));
        assert_eq!(settings.proxies.len(), 1);
    }

    #[test]
    fn max_delay_never_below_min() {
        let settings = ThrottleSettings {
            min_delay_secs: 10.0,
            max_delay_secs: 1.0,
            burst_threshold: 10,
        };
        let config = settings.to_config();
        assert!(config.max_delay >= config.min_delay);
    }
}
