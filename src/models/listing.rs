//! Processed listing records as written to the durable stores.

use chrono::{DateTime, Local};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Sentinel stored for any field the extractors could not determine.
pub const UNKNOWN: &str = "N/A";

/// Format used for `CreationTime` in the stores.
pub const CREATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Where a listing's creation time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CreationTimeSource {
    Parsed,
    #[default]
    Unknown,
}

impl CreationTimeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome of processing a single listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    /// Fields were extracted; the record may be persisted.
    Ok,
    /// The page was replaced by a security challenge.
    Checkpoint,
    /// Retries were exhausted. The record must not be persisted.
    Error,
}

impl AdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Checkpoint => "checkpoint",
            Self::Error => "error",
        }
    }
}

/// One processed ad.
///
/// Field names match the line-delimited JSON stores so existing files stay
/// readable. `age_minutes` is set exactly when `creation_time` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "TitleLooksBad", default)]
    pub title_looks_bad: bool,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Odometer")]
    pub odometer: String,
    #[serde(rename = "Seller")]
    pub seller: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "CreationTime", with = "creation_time_format", default)]
    pub creation_time: Option<DateTime<Local>>,
    #[serde(rename = "CreationTimeSource", default)]
    pub creation_time_source: CreationTimeSource,
    #[serde(rename = "RawTimeText", default)]
    pub raw_time_text: Option<String>,
    #[serde(rename = "AgeMinutes", default)]
    pub age_minutes: Option<f64>,
    #[serde(rename = "Link")]
    pub link: String,
    #[serde(rename = "_key", default)]
    pub key: String,
}

impl ListingRecord {
    /// Create an empty record for a link, every field at its sentinel.
    pub fn new(city: &str, link: &str) -> Self {
        Self {
            city: city.to_string(),
            title: UNKNOWN.to_string(),
            title_looks_bad: false,
            price: UNKNOWN.to_string(),
            odometer: UNKNOWN.to_string(),
            seller: UNKNOWN.to_string(),
            description: UNKNOWN.to_string(),
            creation_time: None,
            creation_time_source: CreationTimeSource::Unknown,
            raw_time_text: None,
            age_minutes: None,
            link: link.to_string(),
            key: link_key(link),
        }
    }

    /// Record the parsed creation time and the age it implies at `now`.
    pub fn set_creation_time(&mut self, created: DateTime<Local>, now: DateTime<Local>) {
        let age = (now - created).num_milliseconds() as f64 / 60_000.0;
        self.creation_time = Some(created);
        self.creation_time_source = CreationTimeSource::Parsed;
        self.age_minutes = Some(age);
    }

    /// Whether the listing is fresh enough to be a lead. The boundary is inclusive.
    pub fn is_lead(&self, max_age_minutes: f64) -> bool {
        matches!(self.age_minutes, Some(age) if age <= max_age_minutes)
    }

    /// Truncated title for log lines.
    pub fn short_title(&self, max_chars: usize) -> String {
        self.title.chars().take(max_chars).collect()
    }
}

/// Stable key for a link: lowercase hex MD5.
pub fn link_key(link: &str) -> String {
    hex::encode(Md5::digest(link.as_bytes()))
}

mod creation_time_format {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::CREATION_TIME_FORMAT;

    pub fn serialize<S>(value: &Option<DateTime<Local>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(CREATION_TIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Local>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Older stores wrote "N/A" for unknown times.
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.and_then(|s| {
            NaiveDateTime::parse_from_str(&s, CREATION_TIME_FORMAT)
                .ok()
                .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        }))
    }
}
