//! Odometer reading extraction.

use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

use super::text::{body_text, element_text, rendered_text, select_all, truncate_chars};
use crate::models::UNKNOWN;

/// A grouped or plain number directly followed by a distance unit.
static DISTANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,3}(?:[ \u{a0}\u{202f}.,]\d{3})+|\d{4,7})\s*(kms?|kilometers?|kilometres?|kilomètres?|mi|miles?)\b",
    )
    .unwrap()
});

pub const MIN_ODOMETER: u64 = 1_000;
pub const MAX_ODOMETER: u64 = 1_000_000;

const BODY_SCAN_CHARS: usize = 15_000;

/// Distance units as written into the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Km,
    Mi,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Km => "km",
            Self::Mi => "mi",
        }
    }

    fn from_token(token: &str) -> Self {
        if token.to_lowercase().starts_with('m') {
            Self::Mi
        } else {
            Self::Km
        }
    }
}

/// A plausible odometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub value: u64,
    pub unit: DistanceUnit,
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit.as_str())
    }
}

/// Largest plausible reading in `text`, ignoring fuel-consumption lines.
pub fn find_odometer(text: &str) -> Option<Reading> {
    text.lines()
        .filter(|line| !line.to_lowercase().contains("l/100"))
        .flat_map(|line| DISTANCE_RE.captures_iter(line).collect::<Vec<_>>())
        .filter_map(|caps| {
            let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
            let value: u64 = digits.parse().ok()?;
            (MIN_ODOMETER..=MAX_ODOMETER).contains(&value).then(|| Reading {
                value,
                unit: DistanceUnit::from_token(&caps[2]),
            })
        })
        .max_by_key(|reading| reading.value)
}

/// Odometer from the "Driven ..." line, the description block, or the page text.
pub fn extract_odometer(document: &Html) -> String {
    let driven = || {
        select_all(document, "span[dir='auto']")
            .into_iter()
            .map(element_text)
            .filter(|t| t.to_lowercase().starts_with("driven"))
            .find_map(|t| find_odometer(&t))
    };
    let description = || {
        select_all(document, "div[data-ad-preview='message']")
            .into_iter()
            .find_map(|el| find_odometer(&rendered_text(el)))
    };
    let whole_page = || find_odometer(truncate_chars(&body_text(document), BODY_SCAN_CHARS));

    driven()
        .or_else(description)
        .or_else(whole_page)
        .map(|r| r.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(text: &str) -> Option<String> {
        find_odometer(text).map(|r| r.to_string())
    }

    #[test]
    fn test_grouping_separators() {
        assert_eq!(reading("134 000 km").as_deref(), Some("134000 km"));
        assert_eq!(reading("134,000 km").as_deref(), Some("134000 km"));
        assert_eq!(reading("134.000 kilometres").as_deref(), Some("134000 km"));
        assert_eq!(reading("98000 miles").as_deref(), Some("98000 mi"));
    }

    #[test]
    fn test_fuel_consumption_lines_are_ignored() {
        let text = "Fuel economy 8.3 L/100km, 9000 km highway\nOdometer: 134 000 km";
        assert_eq!(reading(text).as_deref(), Some("134000 km"));
    }

    #[test]
    fn test_out_of_range_values_are_dropped() {
        assert_eq!(reading("only 500 km on new tires"), None);
        assert_eq!(reading("2000000 km"), None);
    }

    #[test]
    fn test_largest_candidate_wins() {
        let text = "new tires at 5,000 km, now at 187,500 km";
        assert_eq!(reading(text).as_deref(), Some("187500 km"));
    }

    #[test]
    fn test_driven_line_has_priority() {
        let doc = Html::parse_document(
            "<body><span dir='auto'>Driven 88,000 km</span>\
             <div data-ad-preview='message'>Engine swapped at 150,000 km</div></body>",
        );
        assert_eq!(extract_odometer(&doc), "88000 km");
    }

    #[test]
    fn test_description_block_then_body() {
        let doc = Html::parse_document(
            "<body><div data-ad-preview='message'>Runs great, 210 000 km</div></body>",
        );
        assert_eq!(extract_odometer(&doc), "210000 km");

        let doc = Html::parse_document("<body><p>Mileage 64000 mi</p></body>");
        assert_eq!(extract_odometer(&doc), "64000 mi");
    }

    #[test]
    fn test_unknown() {
        let doc = Html::parse_document("<body><p>Great car</p></body>");
        assert_eq!(extract_odometer(&doc), UNKNOWN);
    }
}
