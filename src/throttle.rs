//! Adaptive pacing between navigation actions.
//!
//! Delays are randomized within a configured band and scaled by a backoff
//! multiplier that grows with sustained bursts and with errors, keyed to
//! why the failure happened. Successes decay the multiplier back toward
//! 1.0 so long legitimate sessions recover from transient hiccups.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Why an action failed, for backoff purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleErrorKind {
    /// Explicit rate limiting detected.
    RateLimit,
    /// Session-level block.
    Block,
    /// Anything else; upstream retry logic reacts, pacing does not.
    Generic,
}

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Every this-many `wait` calls, the multiplier steps up.
    pub burst_threshold: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            burst_threshold: 10,
        }
    }
}

const BURST_STEP: f64 = 1.5;
const BURST_CAP: f64 = 3.0;
const RATE_LIMIT_STEP: f64 = 2.0;
const RATE_LIMIT_CAP: f64 = 5.0;
const BLOCK_STEP: f64 = 3.0;
const BLOCK_CAP: f64 = 10.0;
const RECOVERY_STEP: f64 = 0.9;

/// Paces one logical flow of outbound actions.
#[derive(Debug)]
pub struct Throttle {
    config: ThrottleConfig,
    request_count: u64,
    last_request: Option<Instant>,
    multiplier: f64,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            request_count: 0,
            last_request: None,
            multiplier: 1.0,
        }
    }

    /// Current backoff multiplier (1.0 when unthrottled).
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Block until enough time has passed since the previous call.
    ///
    /// The randomized delay only tops up whatever has already elapsed;
    /// if the caller was slow on its own, no extra sleep happens.
    pub async fn wait(&mut self) {
        self.request_count += 1;

        if self.config.burst_threshold > 0
            && self.request_count % self.config.burst_threshold as u64 == 0
        {
            self.multiplier = (self.multiplier * BURST_STEP).min(BURST_CAP);
            info!(
                "burst threshold reached, increasing delay (multiplier {:.1}x)",
                self.multiplier
            );
        }

        let base = rand::rng().random_range(
            self.config.min_delay.as_secs_f64()..=self.config.max_delay.as_secs_f64(),
        );
        let target = Duration::from_secs_f64(base * self.multiplier);

        // The first action has nothing to pace against.
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < target {
                let sleep_for = target - elapsed;
                debug!("throttling: waiting {:.1}s", sleep_for.as_secs_f64());
                tokio::time::sleep(sleep_for).await;
            }
        }

        self.last_request = Some(Instant::now());
    }

    /// A successful action decays the multiplier toward the 1.0 floor.
    pub fn report_success(&mut self) {
        if self.multiplier > 1.0 {
            self.multiplier = (self.multiplier * RECOVERY_STEP).max(1.0);
        }
    }

    /// A failed action raises the multiplier according to its kind.
    pub fn report_error(&mut self, kind: ThrottleErrorKind) {
        match kind {
            ThrottleErrorKind::RateLimit => {
                self.multiplier = (self.multiplier * RATE_LIMIT_STEP).min(RATE_LIMIT_CAP);
                warn!(
                    "rate limit reported, backing off (multiplier {:.1}x)",
                    self.multiplier
                );
            }
            ThrottleErrorKind::Block => {
                self.multiplier = (self.multiplier * BLOCK_STEP).min(BLOCK_CAP);
                warn!(
                    "block reported, major backoff (multiplier {:.1}x)",
                    self.multiplier
                );
            }
            ThrottleErrorKind::Generic => {}
        }
    }

    /// Reset counters and pacing to the initial state.
    pub fn reset(&mut self) {
        self.request_count = 0;
        self.multiplier = 1.0;
        self.last_request = None;
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}
