//! Seller name extraction.

use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::text::{element_text, select_all};
use crate::models::UNKNOWN;

/// Anchors pointing at a user profile, most specific first.
const PROFILE_SELECTORS: &[&str] = &[
    "a[href*='/marketplace/profile/'] span[dir='auto']",
    "a[href*='/profile.php'] span[dir='auto']",
    "a[href*='/people/'] span[dir='auto']",
    "a[href*='/marketplace/profile/'] span",
    "a[href*='/profile.php'] span",
    "a[href*='/people/'] span",
];

const PER_SELECTOR_LIMIT: usize = 10;
const FALLBACK_SPAN_LIMIT: usize = 180;
const MAX_NAME_CHARS: usize = 40;
const MAX_NAME_WORDS: usize = 4;

/// Labels that sit next to the seller name but are not names.
const BAD_SELLER_TEXTS: &[&str] = &[
    "seller details",
    "seller",
    "marketplace",
    "facebook",
    "message",
    "send message",
    "follow",
    "see more",
    "see less",
    "view profile",
    "notifications",
    "home",
    "report",
    "share",
    "create new listing",
    "listing",
    "listings",
    "active listing",
    "active listings",
];

static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(just now|yesterday|\d+\s*(minute|hour|day)s?)\b").unwrap()
});

/// Whether `text` is a UI label or timestamp rather than a person's name.
pub fn is_bad_seller_text(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower.chars().count() < 3
        || BAD_SELLER_TEXTS.iter().any(|bad| lower.contains(bad))
        || RELATIVE_TIME_RE.is_match(&lower)
}

/// One to four words and short enough to be a display name.
pub fn looks_like_name(text: &str) -> bool {
    let words = text.split_whitespace().count();
    (1..=MAX_NAME_WORDS).contains(&words) && text.chars().count() <= MAX_NAME_CHARS
}

fn accept(text: &str) -> bool {
    !is_bad_seller_text(text) && looks_like_name(text)
}

/// Seller name from a profile link, else the most name-like inline text, else `N/A`.
pub fn extract_seller(document: &Html) -> String {
    for css in PROFILE_SELECTORS {
        let found = select_all(document, css)
            .into_iter()
            .take(PER_SELECTOR_LIMIT)
            .map(element_text)
            .find(|t| accept(t));
        if let Some(name) = found {
            return name;
        }
    }

    fallback_name(document).unwrap_or_else(|| UNKNOWN.to_string())
}

/// Rank generic spans by closeness to a two-word, sixteen-character name.
fn fallback_name(document: &Html) -> Option<String> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<String> = select_all(document, "span[dir='auto']")
        .into_iter()
        .take(FALLBACK_SPAN_LIMIT)
        .map(element_text)
        .filter(|t| accept(t))
        .filter(|t| seen.insert(t.clone()))
        .collect();

    candidates.sort_by_key(|t| {
        let words = t.split_whitespace().count();
        let len = t.chars().count();
        (words.abs_diff(2), len.abs_diff(16))
    });
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_anchor() {
        let doc = Html::parse_document(
            "<a href='/marketplace/profile/123/'><span dir='auto'>Seller details</span></a>\
             <a href='/marketplace/profile/123/'><span dir='auto'>Marie Tremblay</span></a>",
        );
        assert_eq!(extract_seller(&doc), "Marie Tremblay");
    }

    #[test]
    fn test_profile_labels_are_skipped() {
        let doc = Html::parse_document(
            "<a href='/marketplace/profile/9/'><span>Message seller</span></a>\
             <a href='/marketplace/profile/9/'><span>View seller profile</span></a>\
             <a href='/marketplace/profile/9/'><span>Marc Tremblay</span></a>",
        );
        assert_eq!(extract_seller(&doc), "Marc Tremblay");
    }

    #[test]
    fn test_fallback_skips_labels_containing_chrome_phrases() {
        let doc = Html::parse_document(
            "<span dir='auto'>Message seller</span>\
             <span dir='auto'>Seller information</span>\
             <span dir='auto'>Nadia Haddad</span>",
        );
        assert_eq!(extract_seller(&doc), "Nadia Haddad");
    }

    #[test]
    fn test_anchor_without_dir_attribute() {
        let doc = Html::parse_document("<a href='/people/jd/55'><span>John Doe</span></a>");
        assert_eq!(extract_seller(&doc), "John Doe");
    }

    #[test]
    fn test_relative_times_are_not_names() {
        assert!(is_bad_seller_text("3 hours"));
        assert!(is_bad_seller_text("Just now"));
        assert!(is_bad_seller_text("Send message"));
        assert!(is_bad_seller_text("Al"));
        assert!(is_bad_seller_text("Message seller"));
        assert!(!is_bad_seller_text("Alex Martin"));
    }

    #[test]
    fn test_looks_like_name() {
        assert!(looks_like_name("Jean"));
        assert!(looks_like_name("Jean Luc De Silva"));
        assert!(!looks_like_name("this is far too many words for a name"));
    }

    #[test]
    fn test_fallback_prefers_two_word_names() {
        let doc = Html::parse_document(
            "<span dir='auto'>Toyota</span>\
             <span dir='auto'>Sam Okafor</span>\
             <span dir='auto'>Clean title no accidents</span>",
        );
        assert_eq!(extract_seller(&doc), "Sam Okafor");
    }

    #[test]
    fn test_unknown_seller() {
        let doc = Html::parse_document("<span dir='auto'>Share</span>");
        assert_eq!(extract_seller(&doc), UNKNOWN);
    }
}
