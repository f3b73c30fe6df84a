//! HTML-to-structured-data extraction.
//!
//! Pure, stateless tree queries over archived pages: product details
//! come from the product page, reviews are collected from every page
//! and deduplicated by (profile name, title).

mod product;
mod reviews;

use std::collections::HashSet;

use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::archive::ArchivedPage;

pub use product::{about_items, price, product_title};
pub use reviews::{reviews, ReviewRecord};

/// The combined extraction result for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_title: Option<String>,
    pub price: Option<String>,
    pub about_this_item: Vec<String>,
    pub reviews: Vec<ReviewRecord>,
}

/// Run the full extraction over a set of archived pages.
pub fn extract_all(pages: &[ArchivedPage]) -> ProductRecord {
    let mut record = ProductRecord {
        product_title: None,
        price: None,
        about_this_item: Vec::new(),
        reviews: Vec::new(),
    };

    // Product info comes from the product page (or a plain saved file).
    for page in pages {
        if page.label == "product_page" || page.label == "full_file" {
            let doc = Html::parse_document(&page.content);
            record.product_title = product_title(&doc);
            record.price = price(&doc);
            record.about_this_item = about_items(&doc);
            info!(
                title = record.product_title.as_deref().unwrap_or("<none>"),
                bullets = record.about_this_item.len(),
                "product page extracted"
            );
            break;
        }
    }

    // Reviews come from every page that carries them.
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for page in pages {
        let doc = Html::parse_document(&page.content);
        let found = reviews(&doc);
        debug!("{}: {} review(s)", page.label, found.len());
        for review in found {
            let key = (review.profile_name.clone(), review.review_tag.clone());
            if seen.insert(key) {
                record.reviews.push(review);
            }
        }
    }

    info!("{} unique review(s) extracted", record.reviews.len());
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(label: &str, content: &str) -> ArchivedPage {
        ArchivedPage {
            label: label.to_string(),
            url: String::new(),
            timestamp: String::new(),
            content: content.to_string(),
        }
    }

    fn review_html(name: &str, tag: &str) -> String {
        format!(
            r#"<li data-hook="review">
                <span class="a-profile-name">{name}</span>
                <a data-hook="review-title"><span>{tag}</span></a>
                <span data-hook="review-body">body</span>
            </li>"#
        )
    }

    #[test]
    fn deduplicates_reviews_across_pages() {
        let pages = vec![
            page(
                "product_page",
                r#"<span id="productTitle">Anvil</span>"#,
            ),
            page(
                "reviews_page_1",
                &format!("{}{}", review_html("Asha", "Great"), review_html("Bram", "Meh")),
            ),
            // Page 2 repeats Asha's review, as overlapping pagination does.
            page(
                "reviews_page_2",
                &format!("{}{}", review_html("Asha", "Great"), review_html("Cleo", "Fine")),
            ),
        ];

        let record = extract_all(&pages);
        assert_eq!(record.product_title.as_deref(), Some("Anvil"));
        assert_eq!(record.reviews.len(), 3);
    }

    #[test]
    fn full_file_serves_as_product_page() {
        let pages = vec![page(
            "full_file",
            r#"<span id="productTitle">Anvil</span><span class="a-price-whole">9</span>"#,
        )];
        let record = extract_all(&pages);
        assert_eq!(record.price.as_deref(), Some("9"));
    }
}
