//! Locating the "Listed ... ago" text on a listing page.

use chrono::{DateTime, TimeZone};
use scraper::Html;
use std::collections::HashSet;

use super::text::texts_of;
use crate::services::relative_time::parse_relative_time;

/// Element kinds scanned for a posting time, in order.
const TIME_CARRIERS: &[&str] = &["span", "div", "strong"];
const PER_KIND_LIMIT: usize = 400;

/// A posting time together with the text it was parsed from.
#[derive(Debug, Clone)]
pub struct PostedTime<Tz: TimeZone> {
    pub at: DateTime<Tz>,
    pub raw_text: String,
}

// Derived equality would require `Tz: PartialEq`, which `Local` lacks.
impl<Tz: TimeZone> PartialEq for PostedTime<Tz> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.raw_text == other.raw_text
    }
}

/// First element text that parses as a relative time.
pub fn find_posted_time<Tz: TimeZone>(document: &Html, now: DateTime<Tz>) -> Option<PostedTime<Tz>> {
    let mut tried = HashSet::new();

    for kind in TIME_CARRIERS {
        for text in texts_of(document, kind, PER_KIND_LIMIT) {
            if text.is_empty() || !tried.insert(text.clone()) {
                continue;
            }
            if let Some(at) = parse_relative_time(&text, now.clone()) {
                return Some(PostedTime { at, raw_text: text });
            }
        }
    }

    None
}
