//! Listing title extraction.

use scraper::Html;

use super::strategy::first_valid;
use super::text::{element_text, select_all};
use crate::models::UNKNOWN;

const MAX_TITLE_CHARS: usize = 160;

/// UI chrome that ends up in the heading when the listing did not render.
const BAD_TITLE_WORDS: &[&str] = &[
    "chats",
    "chat",
    "messages",
    "messenger",
    "inbox",
    "notifications",
    "home",
    "marketplace",
    "facebook",
    "log in",
    "login",
    "sign up",
    "create new listing",
    "seller details",
    "send message",
    "follow",
    "share",
    "report",
    "see more",
    "see less",
];

/// Title from the primary heading, or `N/A`.
pub fn extract_title(document: &Html) -> String {
    let nested = || heading_text(document, "h1 span[dir='auto']");
    let heading = || heading_text(document, "h1");

    first_valid(
        &[&nested, &heading],
        |title| {
            let len = title.chars().count();
            (1..=MAX_TITLE_CHARS).contains(&len)
        },
    )
    .unwrap_or_else(|| UNKNOWN.to_string())
}

fn heading_text(document: &Html, css: &str) -> Option<String> {
    select_all(document, css)
        .into_iter()
        .next()
        .map(element_text)
}

/// Flags titles that are navigation labels or too short to be a listing.
pub fn is_bad_title(title: &str) -> bool {
    let title = title.trim().to_lowercase();
    if title.is_empty() || title == UNKNOWN.to_lowercase() || title.chars().count() < 3 {
        return true;
    }
    BAD_TITLE_WORDS.iter().any(|w| title.contains(w))
}
