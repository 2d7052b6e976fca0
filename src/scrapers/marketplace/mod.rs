//! Marketplace feed crawler.
//!
//! [`MarketplaceCrawler::crawl_city`] runs the per-city pagination state
//! machine and hands every new listing to [`MarketplaceCrawler::process_ad`].

mod ad;
mod feed;
pub mod pacing;
pub mod selectors;

pub use ad::AdOutcome;
pub use feed::CityState;
pub use pacing::Pacing;

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::scrapers::browser::BrowserSession;
use crate::services::webhook::LeadSink;
use crate::storage::LeadLedger;

/// Thresholds governing one city pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlLimits {
    /// Listings at most this old (inclusive) are leads.
    pub lead_max_age_minutes: f64,
    /// Range the random minimum-price filter is drawn from.
    pub min_price_range: RangeInclusive<u32>,
    /// Consecutive non-leads that mark a page boundary.
    pub non_lead_streak: u32,
    /// Price-filter mutations allowed per city.
    pub max_price_mutations: u32,
    /// Consecutive passes without a newly extracted listing before giving up.
    pub max_no_progress: u32,
    /// Challenges tolerated per link before it is skipped for good.
    pub security_max_hits: u32,
    /// Feed links considered per pass.
    pub feed_limit: usize,
    pub navigation_timeout: Duration,
    pub heading_timeout: Duration,
    /// Attempts per listing, including the first.
    pub ad_attempts: u32,
    /// Leading characters of the page text checked for a challenge.
    pub checkpoint_scan_chars: usize,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            lead_max_age_minutes: 60.0,
            min_price_range: 1..=50,
            non_lead_streak: 3,
            max_price_mutations: 2,
            max_no_progress: 4,
            security_max_hits: 1,
            feed_limit: 140,
            navigation_timeout: Duration::from_secs(60),
            heading_timeout: Duration::from_secs(20),
            ad_attempts: 2,
            checkpoint_scan_chars: 2500,
        }
    }
}

/// Why a city pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// The feed itself was a security challenge.
    FeedCheckpoint,
    /// The feed page could not be opened.
    FeedUnavailable(String),
    /// Too many consecutive passes without new work.
    NoProgress,
    /// The price filter was mutated the maximum number of times.
    MutationCeiling,
    /// The price filter input could not be changed.
    MutationFailed,
    /// Unexpected browser failure outside a single listing.
    Failed(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeedCheckpoint => write!(f, "feed checkpoint"),
            Self::FeedUnavailable(e) => write!(f, "feed unavailable: {}", e),
            Self::NoProgress => write!(f, "no progress"),
            Self::MutationCeiling => write!(f, "price mutation ceiling reached"),
            Self::MutationFailed => write!(f, "price filter change failed"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Counters for one city pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityReport {
    pub city: String,
    pub stop_reason: Option<StopReason>,
    pub ads_processed: u32,
    pub leads_found: u32,
    pub leads_delivered: u32,
    pub checkpoints: u32,
    pub errors: u32,
    pub price_mutations: u32,
}

impl CityReport {
    pub fn new(city: &str) -> Self {
        Self {
            city: city.to_string(),
            stop_reason: None,
            ads_processed: 0,
            leads_found: 0,
            leads_delivered: 0,
            checkpoints: 0,
            errors: 0,
            price_mutations: 0,
        }
    }
}

/// Canonical form of a feed item link: absolute, without query or fragment.
pub fn canonical_item_link(href: &str) -> Option<String> {
    let base = Url::parse(selectors::MARKETPLACE_ORIGIN).ok()?;
    let mut url = base.join(href.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Everything a city pass needs besides the per-run mutable state.
pub struct MarketplaceCrawler<'a> {
    pub session: &'a dyn BrowserSession,
    pub ledger: &'a LeadLedger,
    pub sink: &'a dyn LeadSink,
    pub limits: CrawlLimits,
    pub pacing: Pacing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_item_link() {
        assert_eq!(
            canonical_item_link("/marketplace/item/123456/?ref=search&referral_code=x").as_deref(),
            Some("https://www.facebook.com/marketplace/item/123456/")
        );
        assert_eq!(
            canonical_item_link("https://www.facebook.com/marketplace/item/9/#top").as_deref(),
            Some("https://www.facebook.com/marketplace/item/9/")
        );
        assert_eq!(canonical_item_link("javascript:void(0)"), None);
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::NoProgress.to_string(), "no progress");
        assert_eq!(
            serde_json::to_value(StopReason::MutationCeiling).unwrap(),
            serde_json::json!({"reason": "mutation_ceiling"})
        );
    }
}
