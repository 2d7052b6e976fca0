//! Browser session abstraction.
//!
//! The crawler drives pages through [`BrowserSession`] and [`PageHandle`]
//! so the feed and ad state machines can run against Chrome (via
//! chromiumoxide, behind the `browser` feature) or an in-memory fake in tests.

mod config;
mod cookies;

#[cfg(feature = "browser")]
mod chromium;

pub use config::BrowserEngineConfig;
pub use cookies::{load_storage_state, StorageCookie};

#[cfg(feature = "browser")]
pub use chromium::ChromeSession;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(Duration, String),
    #[error("Target page has been closed")]
    PageClosed,
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("Browser launch failed: {0}")]
    Launch(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    /// Whether the page handle itself is gone and must be replaced.
    pub fn is_page_closed(&self) -> bool {
        match self {
            Self::PageClosed => true,
            other => {
                let msg = other.to_string().to_lowercase();
                msg.contains("has been closed") || msg.contains("target closed")
            }
        }
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// One browser tab.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate and wait for the document to become interactive.
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()>;

    /// Reload the current page bypassing the cache.
    async fn hard_refresh(&self, timeout: Duration) -> BrowserResult<()>;

    /// Wait until an element matching `selector` is attached to the DOM.
    async fn wait_attached(&self, selector: &str, timeout: Duration) -> BrowserResult<()>;

    /// Rendered text of the first element matching `selector`, empty if none.
    async fn inner_text(&self, selector: &str) -> BrowserResult<String>;

    /// Serialized HTML of the current document.
    async fn html(&self) -> BrowserResult<String>;

    /// Values of `attr` on every element matching `selector`, in DOM order.
    async fn attribute_all(&self, selector: &str, attr: &str) -> BrowserResult<Vec<String>>;

    /// Click up to `limit` visible elements matching `selector` whose text
    /// equals `text` (case-insensitive). Returns how many were clicked.
    async fn click_by_text(&self, selector: &str, text: &str, limit: usize) -> BrowserResult<usize>;

    async fn is_visible(&self, selector: &str) -> BrowserResult<bool>;

    async fn click(&self, selector: &str) -> BrowserResult<()>;

    /// Empty a text input as select-all followed by delete would.
    async fn clear_input(&self, selector: &str) -> BrowserResult<()>;

    async fn type_text(&self, selector: &str, text: &str) -> BrowserResult<()>;

    async fn press_key(&self, selector: &str, key: &str) -> BrowserResult<()>;

    async fn scroll_to_top(&self) -> BrowserResult<()>;

    fn is_closed(&self) -> bool;

    async fn close(&self) -> BrowserResult<()>;
}

/// A running browser able to open tabs.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> BrowserResult<Box<dyn PageHandle>>;
}

/// Opens a browser session at the start of each run.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self) -> anyhow::Result<Box<dyn BrowserSession>>;
}

/// Launches Chrome or connects to a remote one, depending on its config.
pub struct ChromeLauncher {
    config: BrowserEngineConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn open(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
        Ok(Box::new(ChromeSession::start(self.config.clone()).await?))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn open(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
        tracing::debug!("Cannot launch browser (remote_url={:?})", self.config.remote_url);
        Err(anyhow::anyhow!(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
        ))
    }
}
