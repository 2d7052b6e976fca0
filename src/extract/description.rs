//! Seller description extraction.
//!
//! Truncated descriptions must be expanded on the live page before the
//! snapshot is taken; see [`crate::scrapers::marketplace::selectors::SEE_MORE_TEXT`].

use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::checkpoint::is_checkpoint;
use super::text::{body_text, collapse_whitespace, element_text, rendered_text, select_all};

const MIN_DESCRIPTION_CHARS: usize = 50;
const MAX_DESCRIPTION_CHARS: usize = 2000;
const MIN_SPAN_CHARS: usize = 30;

/// Terms that show up in vehicle descriptions and rarely anywhere else on the page.
const CAR_KEYWORDS: &[&str] = &[
    "km", "mi", "miles", "kilometers", "engine", "transmission", "automatic", "manual", "clean",
    "maintained", "maintenance", "roof", "interior", "exterior", "tires", "wheels", "option",
    "optional", "feature", "condition", "service", "oil", "brakes", "tire", "wheel", "mileage",
    "odometer", "runs", "drives", "vehicle", "car", "truck", "suv", "van", "sedan", "coupe",
    "hatchback", "accident", "damage",
];

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = CAR_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
});

static EXPANDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsee (?:more|less)\b").unwrap());

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

/// Result of description extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    Found(String),
    /// The page content is a security challenge; the listing must be treated as blocked.
    SecurityCheckRequired,
    Unknown,
}

impl Description {
    /// Value stored in the record's `Description` field.
    pub fn into_field(self) -> String {
        match self {
            Self::Found(text) => text,
            Self::SecurityCheckRequired => "SECURITY_CHECK_REQUIRED".to_string(),
            Self::Unknown => crate::models::UNKNOWN.to_string(),
        }
    }
}

/// Number of vehicle keywords occurring in `text`.
pub fn keyword_count(text: &str) -> usize {
    KEYWORD_RE.find_iter(text).count()
}

/// Plausible listing description: bounded length, mentions the vehicle, not a challenge.
pub fn is_car_description(text: &str) -> bool {
    let len = text.chars().count();
    (MIN_DESCRIPTION_CHARS..MAX_DESCRIPTION_CHARS).contains(&len)
        && !is_checkpoint(text)
        && keyword_count(text) >= 1
}

fn strip_expanders(text: &str) -> String {
    collapse_whitespace(&EXPANDER_RE.replace_all(text, " "))
}

/// Description from the dedicated container, else the best keyword-bearing span.
pub fn extract_description(document: &Html) -> Description {
    if is_checkpoint(&body_text(document)) {
        return Description::SecurityCheckRequired;
    }

    let container = select_all(document, "div[data-ad-preview='message']")
        .into_iter()
        .map(|el| strip_expanders(&rendered_text(el)))
        .find(|t| is_car_description(t));
    if let Some(text) = container {
        return Description::Found(text);
    }

    let mut seen = HashSet::new();
    let mut candidates: Vec<String> = select_all(document, "span[dir='auto']")
        .into_iter()
        .map(element_text)
        .filter(|t| t.chars().count() >= MIN_SPAN_CHARS)
        .map(|t| strip_expanders(&t))
        .filter(|t| is_car_description(t))
        .filter(|t| seen.insert(NON_WORD_RE.replace_all(&t.to_lowercase(), "").into_owned()))
        .collect();

    candidates.sort_by_key(|t| std::cmp::Reverse((keyword_count(t), t.chars().count())));

    match candidates.into_iter().next() {
        Some(text) => Description::Found(text),
        None => Description::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = "Well maintained sedan, automatic transmission, new tires \
        and brakes, clean interior, no accident. Oil change every 5000 km.";

    #[test]
    fn test_container_is_preferred() {
        let html = format!(
            "<body><div data-ad-preview='message'>{DESCRIPTION} <span>See more</span></div>\
             <span dir='auto'>A completely different car description with engine and wheels noted</span></body>"
        );
        let doc = Html::parse_document(&html);
        assert_eq!(extract_description(&doc), Description::Found(DESCRIPTION.to_string()));
    }

    #[test]
    fn test_span_ranking_by_keyword_density() {
        let doc = Html::parse_document(
            "<body>\
             <span dir='auto'>Picked up this car last spring and it has been lovely to own</span>\
             <span dir='auto'>Engine and transmission rebuilt, new tires, brakes, clean interior</span>\
             </body>",
        );
        let got = extract_description(&doc).into_field();
        assert!(got.starts_with("Engine and transmission"));
    }

    #[test]
    fn test_near_duplicates_collapse() {
        let doc = Html::parse_document(
            "<body>\
             <span dir='auto'>Runs great, clean title, winter tires included with the car!</span>\
             <span dir='auto'>runs great clean title winter tires included with the car</span>\
             </body>",
        );
        assert!(matches!(extract_description(&doc), Description::Found(_)));
    }

    #[test]
    fn test_security_check_short_circuits() {
        let html = format!(
            "<body><div>Please verify your account</div>\
             <div data-ad-preview='message'>{DESCRIPTION}</div></body>"
        );
        let doc = Html::parse_document(&html);
        assert_eq!(extract_description(&doc), Description::SecurityCheckRequired);
        assert_eq!(
            extract_description(&doc).into_field(),
            "SECURITY_CHECK_REQUIRED"
        );
    }

    #[test]
    fn test_scripts_do_not_trigger_security_check() {
        let html = format!(
            "<body><script>{{\"checkpoint\":null}}</script>\
             <div data-ad-preview='message'>{DESCRIPTION}</div></body>"
        );
        let doc = Html::parse_document(&html);
        assert!(matches!(extract_description(&doc), Description::Found(_)));
    }

    #[test]
    fn test_validation_bounds() {
        assert!(!is_car_description("clean car"));
        assert!(!is_car_description(&"clean car ".repeat(300)));
        assert!(!is_car_description(
            "This is a long sentence about nothing in particular at all, really."
        ));
        assert!(is_car_description(DESCRIPTION));
    }

    #[test]
    fn test_unknown() {
        let doc = Html::parse_document("<body><span dir='auto'>Short</span></body>");
        assert_eq!(extract_description(&doc), Description::Unknown);
    }
}
