//! Error taxonomy for the scraping pipeline.
//!
//! Recoverable conditions (blocks, captchas, stalled pagination) are
//! handled inside the session controller and pagination engine via
//! retry-with-rotation; they only surface to callers once retries are
//! exhausted, and then as values rather than panics.

use std::time::Duration;

use thiserror::Error;

use crate::detect::CaptchaKind;

/// Errors from the opaque browser capability.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("no live browser session")]
    Closed,
}

/// Errors surfaced by the protected session and pagination engine.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("session blocked: {0}")]
    Blocked(String),

    #[error("captcha challenge ({0})")]
    Captcha(CaptchaKind),

    #[error("manual captcha solve timed out")]
    ManualSolveTimeout,

    #[error("all proxies failed within the retry budget")]
    IdentityExhausted,

    #[error("pagination stalled: url did not change after interaction")]
    PaginationStalled,

    #[error("navigation failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("archive write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Whether this error is expected and recoverable through
    /// retry-with-rotation, as opposed to a fault in the capability
    /// or the output sink.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ScrapeError::Session(_) | ScrapeError::Io(_))
    }
}
