//! Product-level extractors: title, price, about-this-item bullets.

use scraper::{Html, Selector};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// Product title from `<span id="productTitle">`.
pub fn product_title(doc: &Html) -> Option<String> {
    let sel = selector("span#productTitle");
    doc.select(&sel).next().map(collect_text)
}

/// Price from `<span class="a-price-whole">`, with the trailing dot
/// some listings append stripped off.
pub fn price(doc: &Html) -> Option<String> {
    let sel = selector("span.a-price-whole");
    doc.select(&sel)
        .next()
        .map(|el| collect_text(el).trim_end_matches('.').to_string())
}

/// The "About this item" bullet points.
///
/// Tries the feature-bullets container first, then the bare
/// unordered-list class some layouts use instead.
pub fn about_items(doc: &Html) -> Vec<String> {
    let containers = [
        "div#feature-bullets ul li span.a-list-item",
        "ul.a-unordered-list.a-vertical.a-spacing-small li span.a-list-item",
    ];

    for css in containers {
        let sel = selector(css);
        let bullets: Vec<String> = doc
            .select(&sel)
            .map(collect_text)
            .filter(|t| !t.is_empty())
            .collect();
        if !bullets.is_empty() {
            return bullets;
        }
    }

    Vec::new()
}

pub(crate) fn collect_text(element: scraper::ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_HTML: &str = r#"
        <html><body>
            <span id="productTitle">  Acme Anvil, 50kg  </span>
            <span class="a-price-whole">1,299.</span>
            <div id="feature-bullets">
                <ul>
                    <li><span class="a-list-item">Drop forged steel</span></li>
                    <li><span class="a-list-item">Flat working face</span></li>
                    <li><span class="a-list-item"> </span></li>
                </ul>
            </div>
        </body></html>
    "#;

    #[test]
    fn extracts_title_trimmed() {
        let doc = Html::parse_document(PRODUCT_HTML);
        assert_eq!(product_title(&doc).as_deref(), Some("Acme Anvil, 50kg"));
    }

    #[test]
    fn extracts_price_without_trailing_dot() {
        let doc = Html::parse_document(PRODUCT_HTML);
        assert_eq!(price(&doc).as_deref(), Some("1,299"));
    }

    #[test]
    fn extracts_bullets_skipping_empties() {
        let doc = Html::parse_document(PRODUCT_HTML);
        let bullets = about_items(&doc);
        assert_eq!(bullets, vec!["Drop forged steel", "Flat working face"]);
    }

    #[test]
    fn falls_back_to_bare_list_class() {
        let html = r#"
            <ul class="a-unordered-list a-vertical a-spacing-small">
                <li><span class="a-list-item">Only bullet</span></li>
            </ul>
        "#;
        let doc = Html::parse_document(html);
        assert_eq!(about_items(&doc), vec!["Only bullet"]);
    }

    #[test]
    fn missing_fields_yield_none() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert!(product_title(&doc).is_none());
        assert!(price(&doc).is_none());
        assert!(about_items(&doc).is_empty());
    }
}
