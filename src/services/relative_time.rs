//! Relative posting-time parsing.
//!
//! Listing pages only say how long ago an ad was posted ("Listed 3 hours ago",
//! "il y a 2 jours", "منذ 5 دقائق"). These helpers turn such phrases into an
//! offset and then into an absolute timestamp relative to a supplied `now`.
//!
//! Patterns are tried in a fixed order and the first match wins:
//! 1. `listed <N> <unit> ago`
//! 2. `<N> <unit> ago`
//! 3. bare shorthand such as `5 min`, `2h`, `3 d`
//! 4. French `il y a <N> <unit>`
//! 5. Arabic `منذ <N> <unit>`
//! 6. `just now`
//! 7. `yesterday`

use chrono::{DateTime, Duration, TimeZone};
use regex::Regex;
use std::sync::LazyLock;

/// Normalized unit of a relative-time phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Map any English, French or Arabic unit token onto a unit.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.to_lowercase();
        match token.as_str() {
            "m" | "min" | "mins" | "minute" | "minutes" => Some(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" | "heure" | "heures" => Some(Self::Hours),
            "d" | "day" | "days" | "j" | "jour" | "jours" => Some(Self::Days),
            "دقيقة" | "دقائق" | "دقيقه" => Some(Self::Minutes),
            "ساعة" | "ساعات" => Some(Self::Hours),
            "يوم" | "أيام" => Some(Self::Days),
            _ => None,
        }
    }

    fn minutes(&self) -> i64 {
        match self {
            Self::Minutes => 1,
            Self::Hours => 60,
            Self::Days => 24 * 60,
        }
    }
}

/// How a pattern's unit is determined: from the second capture group, or fixed.
#[derive(Clone, Copy)]
enum UnitSource {
    Captured,
    Fixed(TimeUnit),
}

/// Ordered phrase patterns. Group 1 is always the count.
static RELATIVE_PATTERNS: LazyLock<Vec<(Regex, UnitSource)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)listed\s+(\d+)\s+(minutes|minute|mins|min|hours|hour|hrs|hr|days|day)\s+ago")
                .unwrap(),
            UnitSource::Captured,
        ),
        (
            Regex::new(r"(?i)(\d+)\s+(minutes|minute|mins|min|hours|hour|hrs|hr|days|day)\s+ago").unwrap(),
            UnitSource::Captured,
        ),
        (
            Regex::new(r"(?i)(\d+)\s*(?:minutes|minute|mins|min|m)\b").unwrap(),
            UnitSource::Fixed(TimeUnit::Minutes),
        ),
        (
            Regex::new(r"(?i)(\d+)\s*(?:hours|hour|hrs|hr|h)\b").unwrap(),
            UnitSource::Fixed(TimeUnit::Hours),
        ),
        (
            Regex::new(r"(?i)(\d+)\s*(?:days|day|d)\b").unwrap(),
            UnitSource::Fixed(TimeUnit::Days),
        ),
        (
            Regex::new(r"(?i)il y a\s+(\d+)\s*(minutes|minute|mins|min|heures|heure|h|jours|jour|j)").unwrap(),
            UnitSource::Captured,
        ),
        (
            Regex::new(r"منذ\s+(\d+)\s*(دقيقة|دقائق|دقيقه|ساعة|ساعات|يوم|أيام)").unwrap(),
            UnitSource::Captured,
        ),
    ]
});

/// Parse the age described by `text`, if any phrase is recognized.
pub fn parse_relative_offset(text: &str) -> Option<Duration> {
    for (pattern, unit_source) in RELATIVE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let count: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = match unit_source {
            UnitSource::Fixed(unit) => *unit,
            UnitSource::Captured => TimeUnit::from_token(caps.get(2)?.as_str())?,
        };
        return Duration::try_minutes(count.checked_mul(unit.minutes())?);
    }

    let lower = text.to_lowercase();
    if lower.contains("just now") {
        return Some(Duration::zero());
    }
    if lower.contains("yesterday") {
        return Some(Duration::days(1));
    }

    None
}

/// Resolve `text` into the absolute time it describes, relative to `now`.
pub fn parse_relative_time<Tz: TimeZone>(text: &str, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let offset = parse_relative_offset(text)?;
    now.checked_sub_signed(offset)
}
