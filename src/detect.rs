//! Block and CAPTCHA classification of live page state.
//!
//! Checks run in a fixed priority order, cheapest and least
//! false-positive-prone first: URL, then title, then visible marker
//! elements, and only then full-text scans. Classification itself is a
//! pure function over a captured snapshot so it can be tested without a
//! browser.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::error::{ScrapeError, SessionError};

/// URL substrings that indicate a challenge interstitial.
const CAPTCHA_URL_PATTERNS: &[&str] = &[
    "/captcha/",
    "/validatecaptcha",
    "/errors/validatecaptcha",
    "captcha",
];

/// DOM markers for challenge widgets, checked for visibility.
const CAPTCHA_MARKER_SELECTORS: &[&str] = &[
    "img[src*='captcha']",
    "form[action*='captcha']",
    "[id*='captcha']",
    "iframe[src*='recaptcha']",
    "div.g-recaptcha",
    "#px-captcha",
    "#captchacharacters",
];

/// Phrases that essentially only appear on challenge pages.
const STRONG_CAPTCHA_PHRASES: &[&str] = &[
    "enter the characters you see below",
    "type the characters you see in this image",
    "sorry, we just need to make sure you're not a robot",
    "to continue, please type the characters below",
    "please enable cookies to continue",
    "access to this page has been denied",
];

/// Generic denial/rate-limit wording, matched in title and content head.
const BLOCK_INDICATORS: &[&str] = &[
    "access denied",
    "blocked",
    "forbidden",
    "banned",
    "too many requests",
    "rate limit",
    "service unavailable",
    "please try again later",
    "automated access",
    "suspicious activity",
];

/// Page smaller than this with captcha wording is a challenge page.
const SMALL_PAGE_BYTES: usize = 10_000;
/// Page smaller than this is a soft block regardless of wording.
const TINY_PAGE_BYTES: usize = 1_000;
/// Only this much of the content is scanned for block wording.
const BLOCK_SCAN_BYTES: usize = 5_000;

const SOLVE_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Which check tripped the captcha classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaKind {
    Url,
    Title,
    Element,
    TextPattern,
    SmallPage,
}

impl fmt::Display for CaptchaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptchaKind::Url => "url",
            CaptchaKind::Title => "title",
            CaptchaKind::Element => "element",
            CaptchaKind::TextPattern => "text_pattern",
            CaptchaKind::SmallPage => "small_page",
        };
        f.write_str(s)
    }
}

/// Result of classifying a page snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageVerdict {
    Clean,
    Blocked { reason: String },
    Captcha { kind: CaptchaKind },
}

impl PageVerdict {
    pub fn is_clean(&self) -> bool {
        matches!(self, PageVerdict::Clean)
    }
}

/// Everything classification needs, read once from the live session.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub content: String,
    pub captcha_marker_visible: bool,
}

impl PageSnapshot {
    /// Capture current session state. The marker-visibility probe runs
    /// inside the page so hidden template elements don't false-positive.
    pub async fn capture(session: &dyn BrowserSession) -> Result<Self, SessionError> {
        let url = session.current_url().await?;
        let title = session.title().await?;
        let content = session.content().await?;

        let mut captcha_marker_visible = false;
        for selector in CAPTCHA_MARKER_SELECTORS {
            if marker_visible(session, selector).await.unwrap_or(false) {
                captcha_marker_visible = true;
                break;
            }
        }

        Ok(Self {
            url,
            title,
            content,
            captcha_marker_visible,
        })
    }
}

async fn marker_visible(
    session: &dyn BrowserSession,
    selector: &str,
) -> Result<bool, SessionError> {
    let script = format!(
        "(() => {{ const el = document.querySelector({}); return !!el && el.offsetParent !== null; }})()",
        serde_json::to_string(selector).unwrap_or_default()
    );
    Ok(session.evaluate(&script).await?.as_bool().unwrap_or(false))
}

/// Classify without logging. Used by polling loops to avoid log spam.
pub fn classify_quiet(snapshot: &PageSnapshot) -> PageVerdict {
    let url = snapshot.url.to_lowercase();
    for pattern in CAPTCHA_URL_PATTERNS {
        if url.contains(pattern) {
            return PageVerdict::Captcha {
                kind: CaptchaKind::Url,
            };
        }
    }

    let title = snapshot.title.to_lowercase();
    if title.contains("robot") || title.contains("captcha") {
        return PageVerdict::Captcha {
            kind: CaptchaKind::Title,
        };
    }

    if snapshot.captcha_marker_visible {
        return PageVerdict::Captcha {
            kind: CaptchaKind::Element,
        };
    }

    let content = snapshot.content.to_lowercase();
    for phrase in STRONG_CAPTCHA_PHRASES {
        if content.contains(phrase) {
            return PageVerdict::Captcha {
                kind: CaptchaKind::TextPattern,
            };
        }
    }

    if snapshot.content.len() < SMALL_PAGE_BYTES
        && (content.contains("captcha") || content.contains("robot check"))
    {
        return PageVerdict::Captcha {
            kind: CaptchaKind::SmallPage,
        };
    }

    for indicator in BLOCK_INDICATORS {
        if title.contains(indicator) {
            return PageVerdict::Blocked {
                reason: format!("title contains: {}", indicator),
            };
        }
    }

    let head_end = content
        .char_indices()
        .nth(BLOCK_SCAN_BYTES)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    let head = &content[..head_end];
    for indicator in BLOCK_INDICATORS {
        if head.contains(indicator) {
            return PageVerdict::Blocked {
                reason: format!("page contains: {}", indicator),
            };
        }
    }

    if snapshot.content.len() < TINY_PAGE_BYTES {
        return PageVerdict::Blocked {
            reason: "page suspiciously small".to_string(),
        };
    }

    PageVerdict::Clean
}

/// Classify and log what tripped.
pub fn classify(snapshot: &PageSnapshot) -> PageVerdict {
    let verdict = classify_quiet(snapshot);
    match &verdict {
        PageVerdict::Clean => debug!("page classified clean: {}", snapshot.url),
        PageVerdict::Blocked { reason } => warn!("block detected: {}", reason),
        PageVerdict::Captcha { kind } => warn!("captcha detected ({})", kind),
    }
    verdict
}

/// Whether the session has been bounced to a sign-in page.
pub fn is_login_redirect(url: &str) -> bool {
    let url = url.to_lowercase();
    url.contains("/ap/signin") || url.contains("/ap/cvf")
}

/// Wait for a human to clear the challenge in the (headed) browser.
///
/// Polls the quiet classifier every few seconds; returns as soon as the
/// page classifies clean, or `ManualSolveTimeout` once the budget is
/// spent. Timing goes through tokio so paused-clock tests advance
/// instantly.
pub async fn wait_for_resolution(
    session: &dyn BrowserSession,
    timeout: Duration,
) -> Result<(), ScrapeError> {
    info!(
        "captcha detected; waiting up to {}s for manual solve",
        timeout.as_secs()
    );

    let started = tokio::time::Instant::now();
    let mut checks = 0u32;

    while started.elapsed() < timeout {
        let snapshot = PageSnapshot::capture(session).await?;
        if classify_quiet(&snapshot).is_clean() {
            info!("captcha appears solved, continuing");
            tokio::time::sleep(Duration::from_secs(2)).await;
            return Ok(());
        }

        checks += 1;
        if checks % 10 == 0 {
            info!(
                "still waiting for captcha solve ({}s elapsed)",
                started.elapsed().as_secs()
            );
        }

        tokio::time::sleep(SOLVE_POLL_INTERVAL).await;
    }

    warn!("timed out waiting for captcha to be solved");
    Err(ScrapeError::ManualSolveTimeout)
}
