//! In-memory browser and lead sinks for driving the crawler in tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;

use marketlead::extract::text::body_text;
use marketlead::models::{CityTarget, ListingRecord};
use marketlead::scrapers::browser::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, PageHandle,
};
use marketlead::scrapers::marketplace::selectors::MIN_PRICE_INPUTS;
use marketlead::services::webhook::{DeliveryError, LeadSink};

pub fn item(id: u32) -> String {
    format!("https://www.facebook.com/marketplace/item/{}/", id)
}

/// Feed hrefs look like the relative, tracked links the real feed renders.
fn feed_href(id: u32) -> String {
    format!("/marketplace/item/{}/?ref=marketplace_vehicles&referral_code=null", id)
}

pub fn city(name: &str) -> CityTarget {
    CityTarget::new(name, format!("https://feed.test/{}/vehicles", name))
}

/// A listing page posted `posted` ago, e.g. "10 minutes" or "8 hours".
pub fn listing_html(title: &str, posted: &str) -> String {
    format!(
        r#"<html><body>
        <div role="navigation"><span dir="auto">Marketplace</span></div>
        <h1><span dir="auto">{title}</span></h1>
        <div><span dir="auto">$9,800</span></div>
        <div><span dir="auto">Listed {posted} ago in Sudbury, ON</span></div>
        <span dir="auto">Driven 143,000 km</span>
        <div data-ad-preview="message">Runs and drives great, automatic transmission,
            new brakes and tires last fall. Clean title, no rust on the frame.</div>
        <a href="/marketplace/profile/77/"><span dir="auto">Marc Tremblay</span></a>
        </body></html>"#
    )
}

pub fn lead_html(title: &str) -> String {
    listing_html(title, "10 minutes")
}

pub fn stale_html(title: &str) -> String {
    listing_html(title, "8 hours")
}

/// A real listing whose challenge banner sits far below the leading page text.
pub fn late_checkpoint_html(title: &str) -> String {
    let filler = "<span>Sponsored dealer inventory nearby</span>".repeat(120);
    let listing = lead_html(title);
    listing.replace(
        "</body>",
        &format!("{filler}<p>Please verify your account to continue.</p></body>"),
    )
}

pub fn checkpoint_html() -> String {
    r#"<html><body><h1>Security check</h1>
    <p>Please verify your account to continue.</p></body></html>"#
        .to_string()
}

#[derive(Default)]
struct WebState {
    ads: HashMap<String, String>,
    /// Feed link lists per city URL; each Enter on the price filter moves
    /// to the next list.
    feeds: HashMap<String, Vec<Vec<u32>>>,
    checkpoint_feeds: HashSet<String>,
    no_price_input: bool,
    close_on_goto: HashSet<String>,
    visits: Vec<String>,
    typed_prices: Vec<String>,
}

/// Shared fake web the pages navigate.
#[derive(Clone, Default)]
pub struct FakeWeb {
    state: Arc<Mutex<WebState>>,
    pages_opened: Arc<AtomicUsize>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ad(&self, id: u32, html: String) -> &Self {
        self.state.lock().unwrap().ads.insert(item(id), html);
        self
    }

    pub fn feed(&self, city: &CityTarget, lists: Vec<Vec<u32>>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .feeds
            .insert(city.url.clone(), lists);
        self
    }

    pub fn checkpoint_feed(&self, city: &CityTarget) -> &Self {
        let mut state = self.state.lock().unwrap();
        state.checkpoint_feeds.insert(city.url.clone());
        state.feeds.entry(city.url.clone()).or_default();
        drop(state);
        self
    }

    pub fn without_price_input(&self) -> &Self {
        self.state.lock().unwrap().no_price_input = true;
        self
    }

    /// The tab dies the next time it navigates to `id`.
    pub fn close_tab_on(&self, id: u32) -> &Self {
        self.state.lock().unwrap().close_on_goto.insert(item(id));
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn visit_count(&self, url: &str) -> usize {
        self.visits().iter().filter(|v| *v == url).count()
    }

    pub fn typed_prices(&self) -> Vec<String> {
        self.state.lock().unwrap().typed_prices.clone()
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> FakeSession {
        FakeSession { web: self.clone() }
    }

    pub fn launcher(&self) -> Arc<dyn BrowserLauncher> {
        Arc::new(FakeLauncher { web: self.clone() })
    }
}

pub struct FakeLauncher {
    web: FakeWeb,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn open(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
        Ok(Box::new(self.web.session()))
    }
}

pub struct FakeSession {
    web: FakeWeb,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&self) -> BrowserResult<Box<dyn PageHandle>> {
        self.web.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            web: self.web.clone(),
            current: Mutex::new(None),
            feed_index: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct FakePage {
    web: FakeWeb,
    current: Mutex<Option<String>>,
    feed_index: AtomicUsize,
    closed: AtomicBool,
}

impl FakePage {
    fn check_open(&self) -> BrowserResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::PageClosed)
        } else {
            Ok(())
        }
    }

    fn current_url(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    fn current_html(&self) -> Option<String> {
        let url = self.current_url()?;
        self.web.state.lock().unwrap().ads.get(&url).cloned()
    }

    fn is_feed(&self) -> bool {
        self.current_url()
            .is_some_and(|url| self.web.state.lock().unwrap().feeds.contains_key(&url))
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.check_open()?;
        let mut state = self.web.state.lock().unwrap();
        state.visits.push(url.to_string());

        if state.close_on_goto.remove(url) {
            self.closed.store(true, Ordering::SeqCst);
            return Err(BrowserError::PageClosed);
        }
        if !state.ads.contains_key(url) && !state.feeds.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        drop(state);

        *self.current.lock().unwrap() = Some(url.to_string());
        self.feed_index.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn hard_refresh(&self, _timeout: Duration) -> BrowserResult<()> {
        self.check_open()
    }

    async fn wait_attached(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        self.check_open()?;
        match self.current_html() {
            Some(html) if html.contains(&format!("<{}", selector)) => Ok(()),
            _ => Err(BrowserError::Timeout(timeout, selector.to_string())),
        }
    }

    async fn inner_text(&self, _selector: &str) -> BrowserResult<String> {
        self.check_open()?;
        if self.is_feed() {
            let url = self.current_url().unwrap_or_default();
            let blocked = self.web.state.lock().unwrap().checkpoint_feeds.contains(&url);
            return Ok(if blocked {
                "Security check. Please verify your account.".to_string()
            } else {
                "Marketplace Vehicles Filters Minimum price".to_string()
            });
        }
        Ok(self
            .current_html()
            .map(|html| body_text(&Html::parse_document(&html)))
            .unwrap_or_default())
    }

    async fn html(&self) -> BrowserResult<String> {
        self.check_open()?;
        Ok(self.current_html().unwrap_or_default())
    }

    async fn attribute_all(&self, _selector: &str, _attr: &str) -> BrowserResult<Vec<String>> {
        self.check_open()?;
        let Some(url) = self.current_url() else {
            return Ok(Vec::new());
        };
        let state = self.web.state.lock().unwrap();
        let lists = state.feeds.get(&url).cloned().unwrap_or_default();
        let idx = self.feed_index.load(Ordering::SeqCst);
        let ids = lists
            .get(idx.min(lists.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default();
        Ok(ids.into_iter().map(feed_href).collect())
    }

    async fn click_by_text(&self, _selector: &str, _text: &str, _limit: usize) -> BrowserResult<usize> {
        self.check_open()?;
        Ok(0)
    }

    async fn is_visible(&self, selector: &str) -> BrowserResult<bool> {
        self.check_open()?;
        let has_input = !self.web.state.lock().unwrap().no_price_input;
        Ok(self.is_feed() && has_input && selector == MIN_PRICE_INPUTS[1])
    }

    async fn click(&self, _selector: &str) -> BrowserResult<()> {
        self.check_open()
    }

    async fn clear_input(&self, _selector: &str) -> BrowserResult<()> {
        self.check_open()
    }

    async fn type_text(&self, _selector: &str, text: &str) -> BrowserResult<()> {
        self.check_open()?;
        self.web
            .state
            .lock()
            .unwrap()
            .typed_prices
            .push(text.to_string());
        Ok(())
    }

    async fn press_key(&self, _selector: &str, key: &str) -> BrowserResult<()> {
        self.check_open()?;
        if key == "Enter" {
            self.feed_index.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn scroll_to_top(&self) -> BrowserResult<()> {
        self.check_open()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> BrowserResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Accepts every lead and remembers it.
#[derive(Clone, Default)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<ListingRecord>>>,
}

impl RecordingSink {
    pub fn links(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.link.clone())
            .collect()
    }
}

#[async_trait]
impl LeadSink for RecordingSink {
    async fn deliver(&self, record: &ListingRecord) -> Result<(), DeliveryError> {
        self.delivered.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Rejects every lead as a webhook answering 503 would.
#[derive(Clone, Default)]
pub struct FailingSink {
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeadSink for FailingSink {
    async fn deliver(&self, _record: &ListingRecord) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Status(503))
    }
}
