//! Browser-driven scraping of marketplace feeds.

pub mod browser;
pub mod marketplace;

pub use browser::{BrowserEngineConfig, BrowserLauncher, BrowserSession, ChromeLauncher, PageHandle};
pub use marketplace::{CityReport, CrawlLimits, MarketplaceCrawler, StopReason};
