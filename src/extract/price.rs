//! Asking price extraction.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

use super::strategy::first_valid;
use super::text::{body_text, element_text, select_all, truncate_chars};
use crate::models::UNKNOWN;

/// A currency marker followed by a (possibly grouped) amount.
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bCA\$|\bC\$|\bCAD\b|\$)\s*(?:\d{1,3}(?:[,\s]\d{3})+|\d+)(?:\.\d{1,2})?")
        .unwrap()
});

const NEAR_TITLE_ELEMENTS: usize = 80;
const MAX_CANDIDATE_CHARS: usize = 200;
const BODY_SCAN_CHARS: usize = 10_000;

/// First currency amount in `text`, with internal whitespace removed.
pub fn find_price(text: &str) -> Option<String> {
    PRICE_RE
        .find(text)
        .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
}

/// Price closest to the title, else anywhere on the page, else `N/A`.
pub fn extract_price(document: &Html) -> String {
    let near_title = || price_after_heading(document);
    let any_span = || {
        select_all(document, "span")
            .into_iter()
            .map(element_text)
            .filter(|t| t.chars().count() <= MAX_CANDIDATE_CHARS)
            .find_map(|t| find_price(&t))
    };
    let whole_page = || find_price(truncate_chars(&body_text(document), BODY_SCAN_CHARS));

    first_valid(&[&near_title, &any_span, &whole_page], |_| true)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Scan the short text elements that follow the first heading in document order.
fn price_after_heading(document: &Html) -> Option<String> {
    let heading = select_all(document, "h1").into_iter().next()?;
    let heading_id = heading.id();

    document
        .root_element()
        .descendants()
        .skip_while(|node| node.id() != heading_id)
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "span" | "div" | "strong"))
        .filter(|el| !el.ancestors().any(|a| a.id() == heading_id))
        .take(NEAR_TITLE_ELEMENTS)
        .map(element_text)
        .filter(|t| t.chars().count() <= MAX_CANDIDATE_CHARS)
        .find_map(|t| find_price(&t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_price_variants() {
        assert_eq!(find_price("Price: $9,500").as_deref(), Some("$9,500"));
        assert_eq!(find_price("CA$ 12 500").as_deref(), Some("CA$12500"));
        assert_eq!(find_price("cad 7000").as_deref(), Some("cad7000"));
        assert_eq!(find_price("$15000.99 obo").as_deref(), Some("$15000.99"));
        assert_eq!(find_price("no currency 9500"), None);
    }

    #[test]
    fn test_prefers_price_near_title() {
        let doc = Html::parse_document(
            "<body><div><span>Sponsored $1</span></div>\
             <h1><span dir='auto'>2014 Honda Civic</span></h1>\
             <div><span>$8,900</span></div>\
             <div><span>Similar: $4,000</span></div></body>",
        );
        assert_eq!(extract_price(&doc), "$8,900");
    }

    #[test]
    fn test_falls_back_to_any_element() {
        let doc = Html::parse_document("<body><span>Asking $3,200 firm</span></body>");
        assert_eq!(extract_price(&doc), "$3,200");
    }

    #[test]
    fn test_falls_back_to_body_text() {
        let doc = Html::parse_document("<body><p>Only C$450 today</p></body>");
        assert_eq!(extract_price(&doc), "C$450");
    }

    #[test]
    fn test_unknown_when_absent() {
        let doc = Html::parse_document("<body><h1>Car</h1><p>Make an offer</p></body>");
        assert_eq!(extract_price(&doc), UNKNOWN);
    }
}
