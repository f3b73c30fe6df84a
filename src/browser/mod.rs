//! The opaque browser capability.
//!
//! Everything above this module talks to a narrow [`BrowserSession`]
//! trait (navigate / evaluate / locate / click / read state), so the
//! detection and pagination logic runs unchanged against a fake session
//! in tests. The real implementation drives Chromium over CDP and lives
//! in [`cdp`], behind the default `browser` feature.

pub mod cdp;
pub mod interact;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::identity::Identity;

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true).
    /// Set to false for debugging or when a captcha needs a human.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Explicit Chrome executable path; otherwise common locations and
    /// PATH are searched.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
}

pub(crate) fn default_headless() -> bool {
    true
}

pub(crate) fn default_timeout() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            remote_url: None,
            chrome_path: None,
        }
    }
}

/// One live, remote-controlled browser page.
///
/// Implementations are expected to be cheap to drop; rotation discards
/// a session and launches a new one freely.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the page to a URL.
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Evaluate a script in the page, returning its JSON value
    /// (null when the expression yields undefined).
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, SessionError>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String, SessionError>;

    /// Current document title.
    async fn title(&self) -> Result<String, SessionError>;

    /// Full rendered page source.
    async fn content(&self) -> Result<String, SessionError>;

    /// Number of elements matching a CSS selector.
    async fn query_count(&self, selector: &str) -> Result<usize, SessionError>;

    /// Dispatch a trusted click on the first element matching the
    /// selector. Errors if the element is missing or unclickable.
    async fn click(&self, selector: &str) -> Result<(), SessionError>;

    /// Read an attribute off the first element matching the selector.
    async fn attribute(&self, selector: &str, name: &str)
        -> Result<Option<String>, SessionError>;

    /// Install a script that runs before any page script on every
    /// subsequent navigation.
    async fn install_on_new_document(&self, script: &str) -> Result<(), SessionError>;

    /// Tear the session down. Idempotent best-effort.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Launches browser sessions bound to an identity.
///
/// The session controller goes through this seam for every rotation,
/// which is also where tests inject a scripted fake.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, identity: &Identity) -> Result<Box<dyn BrowserSession>, SessionError>;
}
