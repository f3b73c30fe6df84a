//! End-to-end pagination scenarios over a scripted fake browser.
//!
//! The fake serves a small site: one product page whose "see all
//! reviews" link leads into a review listing with a next-page control
//! on some pages. Time is paused, so throttle delays and scroll pauses
//! advance instantly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use reviewharvest::archive::{load_pages, PageArchive};
use reviewharvest::browser::interact::ScrollOptions;
use reviewharvest::browser::{BrowserSession, SessionLauncher};
use reviewharvest::error::SessionError;
use reviewharvest::identity::{Identity, ProxyPool};
use reviewharvest::paginate::{CrawlConfig, CrawlOutcome, ReviewCrawl};
use reviewharvest::session::{ProtectedSession, SessionConfig};
use reviewharvest::throttle::{Throttle, ThrottleConfig};

const PRODUCT_URL: &str = "https://shop.example/dp/B000TEST";
const REVIEWS_LINK: &str = "a[data-hook='see-all-reviews-link-foot']";
const NEXT_LINK: &str = "li.a-last a";

fn reviews_url(page: u32) -> String {
    format!("https://shop.example/product-reviews/B000TEST?page={}", page)
}

/// Padded, indicator-free page body that classifies clean.
fn clean_content(marker: &str) -> String {
    format!("<html><body>{}{}</body></html>", marker, "x".repeat(2_000))
}

fn block_content() -> String {
    format!(
        "<html><body>too many requests from your network{}</body></html>",
        "x".repeat(2_000)
    )
}

#[derive(Clone, Default)]
struct FakeLink {
    href: Option<String>,
    click_to: Option<String>,
}

#[derive(Clone, Default)]
struct FakePage {
    title: String,
    content: String,
    links: HashMap<String, FakeLink>,
}

impl FakePage {
    fn clean(title: &str, marker: &str) -> Self {
        Self {
            title: title.to_string(),
            content: clean_content(marker),
            links: HashMap::new(),
        }
    }

    fn with_link(mut self, selector: &str, href: Option<&str>, click_to: Option<&str>) -> Self {
        self.links.insert(
            selector.to_string(),
            FakeLink {
                href: href.map(str::to_string),
                click_to: click_to.map(str::to_string),
            },
        );
        self
    }
}

#[derive(Default)]
struct FakeWorld {
    pages: HashMap<String, FakePage>,
    current_url: String,
    scroll_pos: f64,
    launches: u32,
    closes: u32,
    navigations: Vec<String>,
}

impl FakeWorld {
    fn current_page(&self) -> FakePage {
        self.pages.get(&self.current_url).cloned().unwrap_or_default()
    }
}

#[derive(Clone)]
struct FakeSession {
    world: Arc<Mutex<FakeWorld>>,
}

impl FakeSession {
    /// The selector a page script refers to, identified by its
    /// JSON-quoted form embedded in the script text.
    fn selector_in_script(&self, script: &str) -> Option<(String, FakeLink)> {
        let world = self.world.lock().unwrap();
        let page = world.current_page();
        for (selector, link) in &page.links {
            let quoted = serde_json::to_string(selector).unwrap();
            if script.contains(&quoted) {
                return Some((selector.clone(), link.clone()));
            }
        }
        None
    }

    fn go(&self, url: &str) {
        let mut world = self.world.lock().unwrap();
        world.current_url = url.to_string();
        world.scroll_pos = 0.0;
        world.navigations.push(url.to_string());
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.go(url);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, SessionError> {
        if script.contains("getBoundingClientRect") {
            // Viewport test: present links count as visible.
            return Ok(json!(self.selector_in_script(script).is_some()));
        }
        if script.contains("offsetParent") {
            // Captcha marker probe; nothing in these scenarios has one.
            return Ok(json!(self.selector_in_script(script).is_some()));
        }
        if script.contains("el.click()") {
            match self.selector_in_script(script) {
                Some((_, link)) => {
                    if let Some(dest) = link.click_to {
                        self.go(&dest);
                    }
                    return Ok(json!(true));
                }
                None => return Ok(json!(false)),
            }
        }
        if script.contains("scrollIntoView") {
            return Ok(Value::Null);
        }
        if script.contains("scrollTo") {
            self.world.lock().unwrap().scroll_pos = 1_200.0;
            return Ok(Value::Null);
        }
        if script.contains("querySelectorAll") {
            let count = if self.selector_in_script(script).is_some() { 1 } else { 0 };
            return Ok(json!(count));
        }
        if script.contains("getAttribute") {
            return Ok(match self.selector_in_script(script) {
                Some((_, link)) => link.href.map(Value::String).unwrap_or(Value::Null),
                None => Value::Null,
            });
        }
        if script.contains("document.body.scrollHeight") {
            return Ok(json!(2_000.0));
        }
        if script.contains("window.pageYOffset") {
            return Ok(json!(self.world.lock().unwrap().scroll_pos));
        }
        if script.contains("window.innerHeight") {
            return Ok(json!(800.0));
        }
        if script.contains("readyState") {
            return Ok(json!("complete"));
        }
        if script == "document.title" {
            return Ok(json!(self.world.lock().unwrap().current_page().title));
        }
        Ok(Value::Null)
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.world.lock().unwrap().current_url.clone())
    }

    async fn title(&self) -> Result<String, SessionError> {
        Ok(self.world.lock().unwrap().current_page().title)
    }

    async fn content(&self) -> Result<String, SessionError> {
        Ok(self.world.lock().unwrap().current_page().content)
    }

    async fn query_count(&self, selector: &str) -> Result<usize, SessionError> {
        let world = self.world.lock().unwrap();
        Ok(world.current_page().links.contains_key(selector) as usize)
    }

    async fn click(&self, selector: &str) -> Result<(), SessionError> {
        let link = {
            let world = self.world.lock().unwrap();
            world.current_page().links.get(selector).cloned()
        };
        match link {
            Some(link) => {
                if let Some(dest) = link.click_to {
                    self.go(&dest);
                }
                Ok(())
            }
            None => Err(SessionError::Protocol(format!("no element {}", selector))),
        }
    }

    async fn attribute(
        &self,
        selector: &str,
        _name: &str,
    ) -> Result<Option<String>, SessionError> {
        let world = self.world.lock().unwrap();
        Ok(world
            .current_page()
            .links
            .get(selector)
            .and_then(|link| link.href.clone()))
    }

    async fn install_on_new_document(&self, _script: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.world.lock().unwrap().closes += 1;
        Ok(())
    }
}

struct FakeLauncher {
    world: Arc<Mutex<FakeWorld>>,
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self, _identity: &Identity) -> Result<Box<dyn BrowserSession>, SessionError> {
        self.world.lock().unwrap().launches += 1;
        Ok(Box::new(FakeSession {
            world: self.world.clone(),
        }))
    }
}

fn fast_scroll() -> ScrollOptions {
    ScrollOptions {
        step_px: 300,
        min_pause: std::time::Duration::from_millis(10),
        max_pause: std::time::Duration::from_millis(30),
    }
}

fn crawl_over(world: Arc<Mutex<FakeWorld>>, archive: PageArchive, max_retries: u32) -> ReviewCrawl {
    let launcher = Box::new(FakeLauncher { world });
    let session = ProtectedSession::new(
        launcher,
        ProxyPool::default(),
        Throttle::new(ThrottleConfig {
            min_delay: std::time::Duration::from_millis(10),
            max_delay: std::time::Duration::from_millis(30),
            burst_threshold: 100,
        }),
        SessionConfig {
            max_retries,
            fingerprint_seed: Some(7),
            ..SessionConfig::default()
        },
    );
    ReviewCrawl::new(
        session,
        archive,
        CrawlConfig {
            max_review_pages: 10,
            max_retries,
            scroll: fast_scroll(),
            ..CrawlConfig::default()
        },
    )
}

/// Product page plus a 4-page review listing; pages 1-3 carry a next
/// control, page 4 does not.
fn listing_world() -> Arc<Mutex<FakeWorld>> {
    let mut pages = HashMap::new();

    pages.insert(
        PRODUCT_URL.to_string(),
        FakePage::clean("Acme Anvil", "product detail").with_link(
            REVIEWS_LINK,
            Some("/product-reviews/B000TEST?page=1"),
            Some(&reviews_url(1)),
        ),
    );

    for page in 1..=4u32 {
        let mut fake = FakePage::clean(
            &format!("Customer feedback: page {}", page),
            &format!("review listing {}", page),
        );
        if page < 4 {
            fake = fake.with_link(
                NEXT_LINK,
                Some(&format!("/product-reviews/B000TEST?page={}", page + 1)),
                Some(&reviews_url(page + 1)),
            );
        }
        pages.insert(reviews_url(page), fake);
    }

    Arc::new(Mutex::new(FakeWorld {
        pages,
        current_url: "about:blank".to_string(),
        ..FakeWorld::default()
    }))
}

#[tokio::test(start_paused = true)]
async fn full_listing_crawl_archives_five_pages_and_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.html");
    let world = listing_world();

    let mut crawl = crawl_over(world.clone(), PageArchive::open(&path).unwrap(), 3);
    let report = crawl.run(PRODUCT_URL).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Done);
    assert_eq!(report.pages_saved, 5);

    let pages = load_pages(&path).unwrap();
    let labels: Vec<&str> = pages.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "product_page",
            "reviews_page_1",
            "reviews_page_2",
            "reviews_page_3",
            "reviews_page_4"
        ]
    );
    assert_eq!(pages[0].url, PRODUCT_URL);
    assert!(pages[1].url.contains("page=1"));
    assert!(pages[4].url.contains("page=4"));
}

#[tokio::test(start_paused = true)]
async fn stalled_next_link_terminates_after_one_confirmation_wait() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.html");

    let mut pages = HashMap::new();
    pages.insert(
        PRODUCT_URL.to_string(),
        FakePage::clean("Acme Anvil", "product detail").with_link(
            REVIEWS_LINK,
            Some("/product-reviews/B000TEST?page=1"),
            Some(&reviews_url(1)),
        ),
    );
    // The next control exists but clicking it goes nowhere.
    pages.insert(
        reviews_url(1),
        FakePage::clean("Customer feedback: page 1", "review listing 1").with_link(
            NEXT_LINK,
            Some("/product-reviews/B000TEST?page=1"),
            Some(&reviews_url(1)),
        ),
    );
    let world = Arc::new(Mutex::new(FakeWorld {
        pages,
        current_url: "about:blank".to_string(),
        ..FakeWorld::default()
    }));

    let mut crawl = crawl_over(world, PageArchive::open(&path).unwrap(), 3);
    let report = crawl.run(PRODUCT_URL).await.unwrap();

    // Ends as last-page, not as an error or endless loop.
    assert_eq!(report.outcome, CrawlOutcome::Done);
    assert_eq!(report.pages_saved, 2);

    let labels: Vec<String> = load_pages(&path)
        .unwrap()
        .into_iter()
        .map(|p| p.label)
        .collect();
    assert_eq!(labels, vec!["product_page", "reviews_page_1"]);
}

#[tokio::test(start_paused = true)]
async fn blocked_product_page_exhausts_retries_with_rotations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.html");

    let mut pages = HashMap::new();
    pages.insert(
        PRODUCT_URL.to_string(),
        FakePage {
            title: "Acme Anvil".to_string(),
            content: block_content(),
            links: HashMap::new(),
        },
    );
    let world = Arc::new(Mutex::new(FakeWorld {
        pages,
        current_url: "about:blank".to_string(),
        ..FakeWorld::default()
    }));

    let max_retries = 3;
    let mut crawl = crawl_over(world.clone(), PageArchive::open(&path).unwrap(), max_retries);
    let report = crawl.run(PRODUCT_URL).await.unwrap();

    // A clean failure value, with nothing archived.
    assert!(matches!(report.outcome, CrawlOutcome::Aborted { .. }));
    assert_eq!(report.pages_saved, 0);

    // One rotation per failed attempt except the last.
    assert_eq!(crawl.session_mut().rotation_count(), max_retries - 1);

    let world = world.lock().unwrap();
    assert_eq!(world.launches, max_retries);
    assert_eq!(world.navigations.len(), max_retries as usize);
    // Each rotation closed the session it was replacing.
    assert_eq!(world.closes, max_retries - 1);
}

#[tokio::test(start_paused = true)]
async fn missing_reviews_affordance_aborts_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.html");

    let mut pages = HashMap::new();
    pages.insert(
        PRODUCT_URL.to_string(),
        FakePage::clean("Acme Anvil", "product without reviews link"),
    );
    let world = Arc::new(Mutex::new(FakeWorld {
        pages,
        current_url: "about:blank".to_string(),
        ..FakeWorld::default()
    }));

    let mut crawl = crawl_over(world, PageArchive::open(&path).unwrap(), 3);
    let report = crawl.run(PRODUCT_URL).await.unwrap();

    match report.outcome {
        CrawlOutcome::Aborted { ref reason } => assert!(reason.contains("affordance")),
        ref other => panic!("expected abort, got {:?}", other),
    }
    // The product page itself was still archived before the abort.
    assert_eq!(report.pages_saved, 1);
}
