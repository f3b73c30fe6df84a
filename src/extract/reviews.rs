//! Review extractors.
//!
//! Each review sits inside `<li data-hook="review">` (or, on some
//! layouts, `<div id="customer_review-...">`). We pull profile name,
//! numeric rating, title, date string, and body text.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::product::collect_text;

/// One extracted review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub profile_name: String,
    pub rating: Option<f32>,
    pub review_tag: String,
    pub review_date: String,
    pub review_text: String,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn rating_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([\d.]+)\s*out of").expect("rating pattern is valid"))
}

/// Extract all reviews from a parsed page.
pub fn reviews(doc: &Html) -> Vec<ReviewRecord> {
    let li_sel = selector("li[data-hook='review']");
    let mut blocks: Vec<ElementRef<'_>> = doc.select(&li_sel).collect();

    if blocks.is_empty() {
        let div_sel = selector("div[id^='customer_review-']");
        blocks = doc.select(&div_sel).collect();
    }

    blocks.into_iter().map(parse_review).collect()
}

fn parse_review(block: ElementRef<'_>) -> ReviewRecord {
    let profile_sel = selector("span.a-profile-name");
    let profile_name = block
        .select(&profile_sel)
        .next()
        .map(collect_text)
        .unwrap_or_default();

    let date_sel = selector("span[data-hook='review-date']");
    let review_date = block
        .select(&date_sel)
        .next()
        .map(collect_text)
        .unwrap_or_default();

    ReviewRecord {
        profile_name,
        rating: extract_rating(block),
        review_tag: extract_review_tag(block),
        review_date,
        review_text: extract_review_text(block),
    }
}

/// Numeric rating from the star icon's alt text ("4.0 out of 5 stars").
fn extract_rating(block: ElementRef<'_>) -> Option<f32> {
    let star_sel = selector("i[data-hook='review-star-rating'] span.a-icon-alt");
    let text = block.select(&star_sel).next().map(collect_text)?;

    rating_pattern()
        .captures(&text)
        .and_then(|caps| caps[1].parse().ok())
        .or_else(|| text.parse().ok())
}

/// The bold headline. The title link also nests the star-rating span,
/// which has to be skipped.
fn extract_review_tag(block: ElementRef<'_>) -> String {
    let title_sel = selector("a[data-hook='review-title']");
    let span_sel = selector("span");

    if let Some(link) = block.select(&title_sel).next() {
        for span in link.select(&span_sel) {
            let classes = span.value().attr("class").unwrap_or_default();
            if classes.contains("a-icon-alt") {
                continue;
            }
            let text = collect_text(span);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

fn extract_review_text(block: ElementRef<'_>) -> String {
    let inner_sel = selector("span[data-hook='review-body'] div.review-text-content");
    if let Some(inner) = block.select(&inner_sel).next() {
        return collect_text(inner);
    }

    let body_sel = selector("span[data-hook='review-body']");
    block
        .select(&body_sel)
        .next()
        .map(collect_text)
        .unwrap_or_default()
}
