//! Human-like scrolling and interaction.
//!
//! Pages lazy-load content as they scroll, so the loop re-reads the page
//! height on every iteration instead of caching it. A target counts as
//! found only when it is inside the current viewport, not merely present
//! in the DOM; clicking an off-screen element is unreliable.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::error::SessionError;

/// Chance per iteration of a brief upward scroll, mimicking re-reading.
const REREAD_PROBABILITY: f64 = 0.1;

/// Pacing and step sizing for the scroll loop.
#[derive(Debug, Clone)]
pub struct ScrollOptions {
    /// Base scroll increment in pixels; each step is randomized within
    /// 0.7-1.3x of this.
    pub step_px: u32,
    pub min_pause: Duration,
    pub max_pause: Duration,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            step_px: 300,
            min_pause: Duration::from_millis(1_000),
            max_pause: Duration::from_millis(3_000),
        }
    }
}

/// What the scroll loop ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocateOutcome {
    /// Target was visible in the viewport at some point.
    pub found: bool,
    /// Target was successfully clicked (native or script click).
    pub clicked: bool,
}

impl LocateOutcome {
    fn not_found() -> Self {
        Self {
            found: false,
            clicked: false,
        }
    }
}

async fn page_height(session: &dyn BrowserSession) -> Result<f64, SessionError> {
    Ok(session
        .evaluate("document.body.scrollHeight")
        .await?
        .as_f64()
        .unwrap_or(0.0))
}

async fn scroll_offset(session: &dyn BrowserSession) -> Result<f64, SessionError> {
    Ok(session
        .evaluate("window.pageYOffset")
        .await?
        .as_f64()
        .unwrap_or(0.0))
}

async fn viewport_height(session: &dyn BrowserSession) -> Result<f64, SessionError> {
    Ok(session
        .evaluate("window.innerHeight")
        .await?
        .as_f64()
        .unwrap_or(0.0))
}

async fn smooth_scroll_to(session: &dyn BrowserSession, top: f64) -> Result<(), SessionError> {
    let script = format!(
        "window.scrollTo({{ top: {}, behavior: 'smooth' }});",
        top as i64
    );
    session.evaluate(&script).await?;
    Ok(())
}

fn quoted(selector: &str) -> String {
    serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
}

/// Whether the first match for `selector` is inside the viewport.
pub async fn in_viewport(
    session: &dyn BrowserSession,
    selector: &str,
) -> Result<bool, SessionError> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({});
            if (!el) return false;
            const rect = el.getBoundingClientRect();
            const windowHeight = window.innerHeight || document.documentElement.clientHeight;
            const windowWidth = window.innerWidth || document.documentElement.clientWidth;
            const vertInView = (rect.top <= windowHeight) && ((rect.top + rect.height) >= 0);
            const horInView = (rect.left <= windowWidth) && ((rect.left + rect.width) >= 0);
            return vertInView && horInView;
        }})()"#,
        quoted(selector)
    );
    Ok(session.evaluate(&script).await?.as_bool().unwrap_or(false))
}

/// Center an element in the viewport with a smooth scroll.
pub async fn center_element(
    session: &dyn BrowserSession,
    selector: &str,
) -> Result<(), SessionError> {
    let script = format!(
        "(() => {{ const el = document.querySelector({}); if (el) el.scrollIntoView({{ behavior: 'smooth', block: 'center' }}); }})()",
        quoted(selector)
    );
    session.evaluate(&script).await?;
    Ok(())
}

/// Script-driven click fallback. Returns whether the element existed.
pub async fn script_click(
    session: &dyn BrowserSession,
    selector: &str,
) -> Result<bool, SessionError> {
    let script = format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
        quoted(selector)
    );
    Ok(session.evaluate(&script).await?.as_bool().unwrap_or(false))
}

async fn random_pause(min: Duration, max: Duration) {
    let (lo, hi) = (min.as_secs_f64(), max.as_secs_f64());
    let secs = if hi > lo {
        rand::rng().random_range(lo..hi)
    } else {
        lo
    };
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

/// Scroll down the page in randomized human-paced steps, optionally
/// hunting for a target element, and click it once it is visible.
///
/// Terminates when the target enters the viewport (clicking it with
/// native-then-script fallbacks), or when the bottom is reached and a
/// height re-check shows the page has stopped growing.
pub async fn scroll_and_locate(
    session: &dyn BrowserSession,
    target: Option<&str>,
    opts: &ScrollOptions,
) -> Result<LocateOutcome, SessionError> {
    match target {
        Some(sel) => debug!("scrolling in search of {}", sel),
        None => debug!("scrolling to end of page"),
    }

    let mut last_height = page_height(session).await?;
    let mut position = 0.0f64;
    let mut steps = 0u32;

    loop {
        let step = {
            let base = opts.step_px as f64;
            rand::rng().random_range(base * 0.7..base * 1.3)
        };
        position += step;

        smooth_scroll_to(session, position).await?;
        random_pause(opts.min_pause, opts.max_pause).await;
        steps += 1;

        // Occasional short scroll-back, like a reader double-checking
        // something above the fold.
        if rand::rng().random_bool(REREAD_PROBABILITY) && position > step {
            position -= step * 0.5;
            smooth_scroll_to(session, position).await?;
            random_pause(opts.min_pause / 2, opts.max_pause / 2).await;
        }

        let actual = scroll_offset(session).await?;
        let height = page_height(session).await?;
        debug!(
            "scroll step {}: {:.0}px / {:.0}px",
            steps, actual, height
        );

        if let Some(sel) = target {
            if in_viewport(session, sel).await? {
                info!("target visible in viewport after {} steps", steps);
                return click_target(session, sel).await;
            }
        }

        let viewport = viewport_height(session).await?;
        if actual + viewport >= height {
            // Give lazy-loaded tails a moment to arrive.
            random_pause(Duration::from_secs(2), Duration::from_secs(3)).await;

            if let Some(sel) = target {
                if in_viewport(session, sel).await? {
                    info!("target visible at page bottom");
                    return click_target(session, sel).await;
                }
            }

            let new_height = page_height(session).await?;
            if (new_height - last_height).abs() < f64::EPSILON && new_height <= height {
                debug!("page height settled at {:.0}px after {} steps", height, steps);
                return Ok(LocateOutcome::not_found());
            }
            debug!(
                "new content loaded: {:.0}px -> {:.0}px",
                last_height, new_height
            );
            last_height = new_height;
        }
    }
}

/// Pause, center, and click a located target; falls back to a script
/// click. Both failing is reported as found-but-unclicked and the
/// caller decides how to proceed.
async fn click_target(
    session: &dyn BrowserSession,
    selector: &str,
) -> Result<LocateOutcome, SessionError> {
    random_pause(Duration::from_secs(1), Duration::from_secs(2)).await;
    center_element(session, selector).await?;
    random_pause(Duration::from_secs(1), Duration::from_secs(2)).await;

    match session.click(selector).await {
        Ok(()) => {
            debug!("clicked {}", selector);
            random_pause(Duration::from_secs(2), Duration::from_secs(3)).await;
            return Ok(LocateOutcome {
                found: true,
                clicked: true,
            });
        }
        Err(e) => warn!("native click failed on {}: {}", selector, e),
    }

    match script_click(session, selector).await {
        Ok(true) => {
            debug!("script click succeeded on {}", selector);
            random_pause(Duration::from_secs(2), Duration::from_secs(3)).await;
            Ok(LocateOutcome {
                found: true,
                clicked: true,
            })
        }
        _ => {
            warn!("script click also failed on {}", selector);
            Ok(LocateOutcome {
                found: true,
                clicked: false,
            })
        }
    }
}
