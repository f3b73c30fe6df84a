//! The protected browsing session controller.
//!
//! Owns one live browser session at a time, together with the identity
//! (fingerprint + proxy) it was launched under. Navigation goes through
//! `navigate_with_protection`, which paces itself, classifies the
//! landing page, and recovers from blocks and captchas by rotating the
//! egress identity. By default a rotation keeps the fingerprint: same
//! device, different network path.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, SessionLauncher};
use crate::detect::{self, PageSnapshot, PageVerdict};
use crate::error::{ScrapeError, SessionError};
use crate::fingerprint::{Fingerprint, FingerprintCatalog};
use crate::identity::{Identity, ProxyEndpoint, ProxyPool};
use crate::throttle::{Throttle, ThrottleErrorKind};

/// Tuning for the protected session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default attempt budget for `navigate_with_protection`.
    pub max_retries: u32,
    /// Coarse upper bound on the page load signal.
    pub load_timeout: Duration,
    /// Budget for a human to clear a captcha.
    pub solve_timeout: Duration,
    /// Cooldown band slept between closing a session and relaunching.
    pub rotation_cooldown: (Duration, Duration),
    /// Fixed fingerprint seed; None derives one per identity.
    pub fingerprint_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            load_timeout: Duration::from_secs(15),
            solve_timeout: Duration::from_secs(300),
            rotation_cooldown: (Duration::from_secs(2), Duration::from_secs(5)),
            fingerprint_seed: None,
        }
    }
}

enum AttemptOutcome {
    Success,
    Blocked(String),
    CaptchaUnsolved,
    Failed(SessionError),
}

/// A browser session wrapped in anti-blocking protections.
pub struct ProtectedSession {
    launcher: Box<dyn SessionLauncher>,
    proxies: ProxyPool,
    throttle: Throttle,
    catalog: FingerprintCatalog,
    config: SessionConfig,
    fingerprint: Option<Fingerprint>,
    current_proxy: Option<ProxyEndpoint>,
    session: Option<Box<dyn BrowserSession>>,
    rotations: u32,
}

impl ProtectedSession {
    pub fn new(
        launcher: Box<dyn SessionLauncher>,
        proxies: ProxyPool,
        throttle: Throttle,
        config: SessionConfig,
    ) -> Self {
        Self {
            launcher,
            proxies,
            throttle,
            catalog: FingerprintCatalog::builtin(),
            config,
            fingerprint: None,
            current_proxy: None,
            session: None,
            rotations: 0,
        }
    }

    /// The live session, if any. The pagination engine uses this for
    /// scrolling and content reads between protected navigations.
    pub fn session(&self) -> Option<&dyn BrowserSession> {
        self.session.as_deref()
    }

    /// Identity rotations performed so far.
    pub fn rotation_count(&self) -> u32 {
        self.rotations
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn throttle_mut(&mut self) -> &mut Throttle {
        &mut self.throttle
    }

    /// Navigate with throttling, block/captcha classification, and
    /// identity rotation. Exhausting the attempt budget is returned as
    /// `RetriesExhausted`, never raised as a fault.
    pub async fn navigate_with_protection(
        &mut self,
        url: &str,
        max_retries: u32,
    ) -> Result<(), ScrapeError> {
        let attempts = max_retries.max(1);

        for attempt in 1..=attempts {
            self.throttle.wait().await;

            info!("attempt {}/{}: navigating to {}", attempt, attempts, url);

            match self.attempt_navigation(url).await {
                AttemptOutcome::Success => {
                    self.throttle.report_success();
                    debug!("navigation successful");
                    return Ok(());
                }
                AttemptOutcome::Blocked(reason) => {
                    warn!("blocked during navigation: {}", reason);
                    self.throttle.report_error(ThrottleErrorKind::Block);
                    if attempt < attempts {
                        self.rotate_identity(false).await?;
                    }
                }
                AttemptOutcome::CaptchaUnsolved => {
                    warn!("captcha was not solved in time");
                    if attempt < attempts {
                        self.rotate_identity(false).await?;
                    }
                }
                AttemptOutcome::Failed(e) => {
                    warn!("navigation error: {}", e);
                    self.throttle.report_error(ThrottleErrorKind::Generic);
                    if attempt < attempts {
                        self.rotate_identity(false).await?;
                    }
                }
            }
        }

        warn!("all {} navigation attempts failed for {}", attempts, url);
        Err(ScrapeError::RetriesExhausted { attempts })
    }

    async fn attempt_navigation(&mut self, url: &str) -> AttemptOutcome {
        if let Err(e) = self.ensure_session().await {
            return AttemptOutcome::Failed(e);
        }
        let session = self.session.as_deref().expect("session just ensured");

        if let Err(e) = session.navigate(url).await {
            return AttemptOutcome::Failed(e);
        }
        if let Err(e) = self.wait_for_load().await {
            return AttemptOutcome::Failed(e);
        }

        let session = self.session.as_deref().expect("session is live");
        let snapshot = match PageSnapshot::capture(session).await {
            Ok(s) => s,
            Err(e) => return AttemptOutcome::Failed(e),
        };

        match detect::classify(&snapshot) {
            PageVerdict::Clean => AttemptOutcome::Success,
            PageVerdict::Blocked { reason } => AttemptOutcome::Blocked(reason),
            PageVerdict::Captcha { kind } => {
                info!("captcha challenge ({}), deferring to manual solve", kind);
                match detect::wait_for_resolution(session, self.config.solve_timeout).await {
                    Ok(()) => AttemptOutcome::Success,
                    Err(ScrapeError::ManualSolveTimeout) => AttemptOutcome::CaptchaUnsolved,
                    Err(ScrapeError::Session(e)) => AttemptOutcome::Failed(e),
                    Err(_) => AttemptOutcome::CaptchaUnsolved,
                }
            }
        }
    }

    /// Launch a session bound to the current identity if none is live.
    pub async fn ensure_session(&mut self) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Ok(());
        }

        if self.fingerprint.is_none() {
            let fp = Fingerprint::generate(&self.catalog, self.config.fingerprint_seed);
            fp.log_summary();
            self.fingerprint = Some(fp);
        }
        if self.current_proxy.is_none() {
            self.current_proxy = self.proxies.next();
        }

        let identity = Identity {
            fingerprint: self.fingerprint.clone().expect("fingerprint just set"),
            proxy: self.current_proxy.clone(),
        };

        let session = self.launcher.launch(&identity).await?;
        identity.fingerprint.apply_to(session.as_ref()).await?;
        self.session = Some(session);

        Ok(())
    }

    /// Wait for a minimal load signal: document.readyState reaching
    /// interactive/complete, bounded by the configured load timeout,
    /// plus a short randomized settle pause for late scripts.
    pub async fn wait_for_load(&self) -> Result<(), SessionError> {
        let session = self.session.as_deref().ok_or(SessionError::Closed)?;

        let wait_script = r#"
            new Promise((resolve) => {
                if (document.readyState === 'complete' || document.readyState === 'interactive') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    setTimeout(() => resolve('timeout'), 10000);
                }
            })
        "#;

        match tokio::time::timeout(self.config.load_timeout, session.evaluate(wait_script)).await {
            Ok(Ok(state)) => debug!("page ready state: {}", state),
            Ok(Err(e)) => debug!("could not check ready state: {}", e),
            Err(_) => warn!("timeout waiting for page ready state"),
        }

        let settle = rand::rng().random_range(1.0..3.0);
        tokio::time::sleep(Duration::from_secs_f64(settle)).await;
        Ok(())
    }

    /// Discard the live session and come back with a different egress.
    /// The fingerprint is kept unless `new_fingerprint` is set, so a
    /// rotation looks like the same device on a new network path.
    pub async fn rotate_identity(&mut self, new_fingerprint: bool) -> Result<(), ScrapeError> {
        info!(
            "rotating identity ({})",
            if new_fingerprint {
                "new fingerprint"
            } else {
                "keeping fingerprint"
            }
        );

        if let Some(proxy) = self.current_proxy.take() {
            self.proxies.mark_failed(&proxy);
        }
        self.close_session().await;

        if new_fingerprint {
            let fp = Fingerprint::generate(&self.catalog, self.config.fingerprint_seed);
            fp.log_summary();
            self.fingerprint = Some(fp);
        }

        let (lo, hi) = self.config.rotation_cooldown;
        let cooldown = rand::rng().random_range(lo.as_secs_f64()..=hi.as_secs_f64());
        tokio::time::sleep(Duration::from_secs_f64(cooldown)).await;

        self.current_proxy = self.proxies.next();
        self.rotations += 1;

        self.ensure_session().await?;
        Ok(())
    }

    /// Force a completely fresh identity: new fingerprint and new egress.
    pub async fn new_identity(&mut self) -> Result<(), ScrapeError> {
        self.rotate_identity(true).await
    }

    /// Close the live browser session, if any. Keeps identity state.
    pub async fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                debug!("session close failed: {}", e);
            }
        }
    }

    /// Tear everything down and discard the fingerprint.
    pub async fn shutdown(&mut self) {
        self.close_session().await;
        self.fingerprint = None;
        self.current_proxy = None;
        info!("session shut down, fingerprint discarded");
    }
}
