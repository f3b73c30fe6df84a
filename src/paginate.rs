//! The product → reviews → next-page traversal state machine.
//!
//! Each page the crawl reaches is archived before the next step runs,
//! so an aborted run still leaves everything collected so far. Aborts
//! are reported as a value in the crawl report, not as errors; only
//! capability and sink faults propagate.

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::archive::PageArchive;
use crate::browser::interact::{self, ScrollOptions};
use crate::browser::BrowserSession;
use crate::detect::{self, PageSnapshot};
use crate::error::{ScrapeError, SessionError};
use crate::session::ProtectedSession;

/// Wording that marks an empty or exhausted review listing.
const NO_REVIEWS_MARKERS: &[&str] = &["no reviews", "there are no customer reviews"];

/// Title wording for a dead pagination target.
const NOT_FOUND_TITLE_MARKERS: &[&str] = &["page not found", "404"];

/// Tuning for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Hard cap on review pages visited after the product page.
    pub max_review_pages: u32,
    /// Attempt budget per protected navigation.
    pub max_retries: u32,
    /// Selectors for the "see all reviews" affordance, tried in order.
    pub reviews_link_selectors: Vec<String>,
    /// Selectors for the "next page" affordance: primary first, then
    /// fallbacks tried in order.
    pub next_page_selectors: Vec<String>,
    pub scroll: ScrollOptions,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_review_pages: 50,
            max_retries: 3,
            reviews_link_selectors: vec![
                "a[data-hook='see-all-reviews-link-foot']".to_string(),
                "a[data-hook='see-all-reviews-link']".to_string(),
            ],
            next_page_selectors: vec![
                "li.a-last a".to_string(),
                "ul.a-pagination li.a-last a".to_string(),
                "a[data-hook='pagination-bar-next']".to_string(),
            ],
            scroll: ScrollOptions::default(),
        }
    }
}

/// How a crawl ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Pagination exhausted naturally.
    Done,
    /// An unrecovered block/captcha/timeout stopped the crawl. Pages
    /// already archived remain valid.
    Aborted { reason: String },
}

/// Final accounting for a crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub outcome: CrawlOutcome,
    pub pages_saved: u32,
    pub bytes_saved: u64,
}

impl CrawlReport {
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, CrawlOutcome::Done)
    }
}

/// Drives the traversal over a protected session, archiving raw pages.
pub struct ReviewCrawl {
    session: ProtectedSession,
    archive: PageArchive,
    config: CrawlConfig,
}

impl ReviewCrawl {
    pub fn new(session: ProtectedSession, archive: PageArchive, config: CrawlConfig) -> Self {
        Self {
            session,
            archive,
            config,
        }
    }

    pub fn session_mut(&mut self) -> &mut ProtectedSession {
        &mut self.session
    }

    /// Run the full traversal starting from a product URL.
    pub async fn run(&mut self, product_url: &str) -> Result<CrawlReport, ScrapeError> {
        let outcome = self.traverse(product_url).await?;
        match &outcome {
            CrawlOutcome::Done => info!(
                "crawl done: {} pages, {} bytes",
                self.archive.pages_written(),
                self.archive.bytes_written()
            ),
            CrawlOutcome::Aborted { reason } => warn!(
                "crawl aborted ({}); {} pages already archived remain valid",
                reason,
                self.archive.pages_written()
            ),
        }
        Ok(self.report(outcome))
    }

    /// Close the browser, keeping everything archived so far.
    pub async fn shutdown(&mut self) {
        self.session.shutdown().await;
    }

    fn report(&self, outcome: CrawlOutcome) -> CrawlReport {
        CrawlReport {
            outcome,
            pages_saved: self.archive.pages_written(),
            bytes_saved: self.archive.bytes_written(),
        }
    }

    async fn traverse(&mut self, product_url: &str) -> Result<CrawlOutcome, ScrapeError> {
        // Product page. A block here fails the whole run.
        if let Err(e) = self
            .session
            .navigate_with_protection(product_url, self.config.max_retries)
            .await
        {
            if e.is_recoverable() {
                return Ok(CrawlOutcome::Aborted {
                    reason: format!("product page unreachable: {}", e),
                });
            }
            return Err(e);
        }
        self.persist("product_page").await?;

        // Hunt for the "see all reviews" affordance.
        let reviews_url = match self.locate_reviews_url(product_url).await? {
            Some(url) => url,
            None => {
                return Ok(CrawlOutcome::Aborted {
                    reason: "see-all-reviews affordance not found".to_string(),
                })
            }
        };

        info!("reviews listing at {}", reviews_url);
        if let Err(e) = self
            .session
            .navigate_with_protection(&reviews_url, self.config.max_retries)
            .await
        {
            if e.is_recoverable() {
                return Ok(CrawlOutcome::Aborted {
                    reason: format!("reviews listing unreachable: {}", e),
                });
            }
            return Err(e);
        }
        self.persist("reviews_page_1").await?;

        self.paginate_reviews().await
    }

    /// Scroll the product page looking for the reviews link, falling
    /// back to one direct DOM lookup, and resolve its destination URL.
    async fn locate_reviews_url(
        &mut self,
        product_url: &str,
    ) -> Result<Option<String>, ScrapeError> {
        let primary = match self.config.reviews_link_selectors.first() {
            Some(sel) => sel.clone(),
            None => return Ok(None),
        };
        let session = self.live_session()?;

        let outcome =
            interact::scroll_and_locate(session, Some(primary.as_str()), &self.config.scroll)
                .await?;

        if outcome.found {
            // The driver may have click-navigated already; if the
            // affordance is gone from the DOM, the session is sitting
            // on the destination.
            if let Some(href) = session.attribute(&primary, "href").await? {
                return Ok(Some(absolutize(product_url, &href)));
            }
            let here = session.current_url().await?;
            if here != product_url {
                return Ok(Some(here));
            }
        }

        // One direct lookup pass over all selectors, viewport ignored.
        for selector in &self.config.reviews_link_selectors {
            if session.query_count(selector).await? > 0 {
                if let Some(href) = session.attribute(selector, "href").await? {
                    debug!("reviews link found by direct lookup: {}", selector);
                    return Ok(Some(absolutize(product_url, &href)));
                }
            }
        }

        Ok(None)
    }

    /// The reviews_page_2.. loop: scroll, find the next affordance,
    /// click through, and archive each page until pagination runs out.
    async fn paginate_reviews(&mut self) -> Result<CrawlOutcome, ScrapeError> {
        let mut page_index: u32 = 1;

        while page_index < self.config.max_review_pages {
            // Surface lazy-loaded reviews before looking for controls.
            {
                let session = self.live_session()?;
                interact::scroll_and_locate(session, None, &self.config.scroll).await?;
            }

            // Re-check session health before acting on this page.
            if let Some(reason) = self.page_trouble().await? {
                return Ok(CrawlOutcome::Aborted { reason });
            }

            let next_selector = match self.find_next_affordance().await? {
                Some(sel) => sel,
                None => {
                    info!("no next-page affordance, pagination complete");
                    return Ok(CrawlOutcome::Done);
                }
            };

            let session = self.live_session()?;
            let pre_click_url = session.current_url().await?;

            self.advance(&next_selector, &pre_click_url).await?;
            self.session.wait_for_load().await?;

            let session = self.live_session()?;
            let mut landed_url = session.current_url().await?;
            if landed_url == pre_click_url {
                // Navigation may just be slow; give it one more wait
                // before calling this the last page.
                debug!("url unchanged after click, confirming");
                tokio::time::sleep(Duration::from_secs(2)).await;
                self.session.wait_for_load().await?;
                let session = self.live_session()?;
                landed_url = session.current_url().await?;
                if landed_url == pre_click_url {
                    info!("url stable after confirmation wait, treating as last page");
                    return Ok(CrawlOutcome::Done);
                }
            }

            if self.reached_listing_end().await? {
                info!("listing end marker on landed page, pagination complete");
                return Ok(CrawlOutcome::Done);
            }

            page_index += 1;
            self.persist(&format!("reviews_page_{}", page_index)).await?;
        }

        info!(
            "review page cap ({}) reached, stopping",
            self.config.max_review_pages
        );
        Ok(CrawlOutcome::Done)
    }

    /// Try the next-page selectors in order for a visible affordance.
    async fn find_next_affordance(&mut self) -> Result<Option<String>, ScrapeError> {
        let session = self.live_session()?;
        for selector in &self.config.next_page_selectors {
            if session.query_count(selector).await? == 0 {
                continue;
            }
            if interact::in_viewport(session, selector).await? {
                return Ok(Some(selector.clone()));
            }
            debug!("next affordance {} present but not visible", selector);
        }
        Ok(None)
    }

    /// Click through to the next page: native click, then script click,
    /// then direct navigation to the affordance's href.
    async fn advance(&mut self, selector: &str, base_url: &str) -> Result<(), ScrapeError> {
        let session = self.live_session()?;

        interact::center_element(session, selector).await?;
        tokio::time::sleep(Duration::from_millis(800)).await;

        if session.click(selector).await.is_ok() {
            return Ok(());
        }
        warn!("native click failed on {}, trying script click", selector);

        if interact::script_click(session, selector).await? {
            return Ok(());
        }
        warn!("script click failed on {}, navigating to href", selector);

        match session.attribute(selector, "href").await? {
            Some(href) => {
                let destination = absolutize(base_url, &href);
                session.navigate(&destination).await?;
                Ok(())
            }
            None => Err(ScrapeError::ElementNotFound(selector.to_string())),
        }
    }

    /// Quiet health check: block, challenge, or login bounce.
    async fn page_trouble(&mut self) -> Result<Option<String>, ScrapeError> {
        let session = self.live_session()?;
        let snapshot = PageSnapshot::capture(session).await?;

        if detect::is_login_redirect(&snapshot.url) {
            return Ok(Some("redirected to login page".to_string()));
        }

        match detect::classify_quiet(&snapshot) {
            detect::PageVerdict::Clean => Ok(None),
            detect::PageVerdict::Blocked { reason } => Ok(Some(format!("blocked: {}", reason))),
            detect::PageVerdict::Captcha { kind } => Ok(Some(format!("captcha ({})", kind))),
        }
    }

    /// Secondary last-page signals on the landed page.
    async fn reached_listing_end(&mut self) -> Result<bool, ScrapeError> {
        let session = self.live_session()?;
        let title = session.title().await?.to_lowercase();
        if NOT_FOUND_TITLE_MARKERS.iter().any(|m| title.contains(m)) {
            return Ok(true);
        }

        let content = session.content().await?.to_lowercase();
        Ok(NO_REVIEWS_MARKERS.iter().any(|m| content.contains(m)))
    }

    /// Archive the current page under a label.
    async fn persist(&mut self, label: &str) -> Result<(), ScrapeError> {
        let session = self.live_session()?;
        let url = session.current_url().await?;
        let content = session.content().await?;
        self.archive.append(label, &url, &content)?;
        Ok(())
    }

    fn live_session(&self) -> Result<&dyn BrowserSession, ScrapeError> {
        self.session
            .session()
            .ok_or(ScrapeError::Session(SessionError::Closed))
    }
}

/// Rewrite a possibly site-relative href to an absolute URL.
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}
