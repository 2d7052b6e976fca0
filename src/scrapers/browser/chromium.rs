//! Chrome-backed browser session using chromiumoxide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, SetBlockedUrLsParams, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cookies::{load_storage_state, StorageCookie};
use super::{BrowserEngineConfig, BrowserError, BrowserResult, BrowserSession, PageHandle};

/// Sub-resources skipped when media blocking is on.
const BLOCKED_MEDIA_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.mp4", "*.webm", "*.m4a",
    "*.mp3", "*.woff", "*.woff2", "*.ttf", "*.otf",
];

const POLL_INTERVAL: Duration = Duration::from_millis(250);

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        let msg = e.to_string();
        if msg.to_lowercase().contains("closed") {
            BrowserError::PageClosed
        } else {
            BrowserError::Protocol(msg)
        }
    }
}

/// Encode a string as a JavaScript literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// A launched or remote Chrome instance.
pub struct ChromeSession {
    config: BrowserEngineConfig,
    browser: Arc<Mutex<Browser>>,
    cookies: Vec<StorageCookie>,
}

impl ChromeSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Launch a local browser or connect to `config.remote_url`.
    pub async fn start(config: BrowserEngineConfig) -> Result<Self> {
        let cookies = match &config.cookies_file {
            Some(path) if path.exists() => load_storage_state(path)?,
            Some(path) => {
                warn!("Cookies file {} not found, continuing without it", path.display());
                Vec::new()
            }
            None => Vec::new(),
        };

        let browser = match config.remote_url.clone() {
            Some(url) => Self::connect_remote(&url, config.timeout).await?,
            None => Self::launch(&config).await?,
        };

        Ok(Self {
            config,
            browser: Arc::new(Mutex::new(browser)),
            cookies,
        })
    }

    fn find_chrome() -> Result<std::path::PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or set browser.remote_url"
        ))
    }

    async fn launch(config: &BrowserEngineConfig) -> Result<Browser> {
        info!("Launching browser (headless={})", config.headless);

        let mut builder = BrowserConfig::builder()
            .chrome_executable(Self::find_chrome()?)
            .request_timeout(Duration::from_secs(config.timeout));

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn connect_remote(url: &str, timeout: u64) -> Result<Browser> {
        info!("Connecting to remote browser at {} (timeout: {}s)", url, timeout);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(Duration::from_secs(timeout))
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(timeout),
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn prepare_page(&self, page: &Page) -> BrowserResult<()> {
        if self.config.block_media {
            let patterns = BLOCKED_MEDIA_PATTERNS.iter().map(|p| p.to_string()).collect();
            page.execute(SetBlockedUrLsParams::new(patterns)).await?;
        }

        for cookie in &self.cookies {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone().unwrap_or_else(|| "/".to_string()))
                .secure(cookie.secure)
                .http_only(cookie.http_only);
            if let Some(expires) = cookie.expires {
                builder = builder.expires(TimeSinceEpoch::new(expires));
            }

            match builder.build() {
                Ok(param) => {
                    if let Err(e) = page.set_cookie(param).await {
                        warn!("Failed to set cookie {}: {}", cookie.name, e);
                    }
                }
                Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
            }
        }
        debug!("Injected {} cookies", self.cookies.len());
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&self) -> BrowserResult<Box<dyn PageHandle>> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?
        };
        self.prepare_page(&page).await?;
        Ok(Box::new(ChromePage {
            page,
            closed: AtomicBool::new(false),
        }))
    }
}

/// One Chrome tab.
pub struct ChromePage {
    page: Page,
    closed: AtomicBool,
}

impl ChromePage {
    /// Remember that the tab is gone when an error says so.
    fn track<T>(&self, result: BrowserResult<T>) -> BrowserResult<T> {
        if let Err(e) = &result {
            if e.is_page_closed() {
                self.closed.store(true, Ordering::SeqCst);
            }
        }
        result
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> BrowserResult<T> {
        let result = match self.page.evaluate(script).await {
            Ok(value) => value
                .into_value::<T>()
                .map_err(|e| BrowserError::Script(e.to_string())),
            Err(e) => Err(e.into()),
        };
        self.track(result)
    }

    async fn element(&self, selector: &str) -> BrowserResult<chromiumoxide::Element> {
        let result = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| match BrowserError::from(e) {
                BrowserError::PageClosed => BrowserError::PageClosed,
                _ => BrowserError::ElementNotFound(selector.to_string()),
            });
        self.track(result)
    }

    async fn wait_ready(&self, url: &str, timeout: Duration) -> BrowserResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state: String = self
                .eval("document.readyState".to_string())
                .await
                .unwrap_or_default();
            if state == "interactive" || state == "complete" {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(timeout, format!("DOM of {}", url)));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()> {
        let nav = tokio::time::timeout(timeout, self.page.goto(url)).await;
        let result = match nav {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => match BrowserError::from(e) {
                BrowserError::PageClosed => Err(BrowserError::PageClosed),
                other => Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: other.to_string(),
                }),
            },
            Err(_) => Err(BrowserError::Timeout(timeout, format!("navigation to {}", url))),
        };
        self.track(result)?;
        self.wait_ready(url, timeout).await
    }

    async fn hard_refresh(&self, timeout: Duration) -> BrowserResult<()> {
        let params = ReloadParams::builder().ignore_cache(true).build();
        let result = self.page.execute(params).await.map_err(BrowserError::from);
        self.track(result)?;
        self.wait_ready("reload", timeout).await
    }

    async fn wait_attached(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.element(selector).await {
                Ok(_) => return Ok(()),
                Err(BrowserError::PageClosed) => return Err(BrowserError::PageClosed),
                Err(_) => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(timeout, selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn inner_text(&self, selector: &str) -> BrowserResult<String> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerText : ''; }})()",
            js_str(selector)
        ))
        .await
    }

    async fn html(&self) -> BrowserResult<String> {
        let result = self.page.content().await.map_err(BrowserError::from);
        self.track(result)
    }

    async fn attribute_all(&self, selector: &str, attr: &str) -> BrowserResult<Vec<String>> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).map(e => e.getAttribute({})).filter(Boolean)",
            js_str(selector),
            js_str(attr)
        ))
        .await
    }

    async fn click_by_text(&self, selector: &str, text: &str, limit: usize) -> BrowserResult<usize> {
        self.eval(format!(
            r#"(() => {{
                const want = {text}.toLowerCase();
                let clicked = 0;
                for (const el of document.querySelectorAll({sel})) {{
                    if (clicked >= {limit}) break;
                    if (el.offsetParent === null) continue;
                    if ((el.innerText || '').trim().toLowerCase() !== want) continue;
                    try {{ el.click(); clicked++; }} catch (e) {{}}
                }}
                return clicked;
            }})()"#,
            text = js_str(text),
            sel = js_str(selector),
            limit = limit
        ))
        .await
    }

    async fn is_visible(&self, selector: &str) -> BrowserResult<bool> {
        self.eval(format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const r = el.getBoundingClientRect();
                return r.width > 0 && r.height > 0 && getComputedStyle(el).visibility !== 'hidden';
            }})()"#,
            js_str(selector)
        ))
        .await
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        let el = self.element(selector).await?;
        let result = el.click().await.map(|_| ()).map_err(BrowserError::from);
        self.track(result)
    }

    async fn clear_input(&self, selector: &str) -> BrowserResult<()> {
        let cleared: bool = self
            .eval(format!(
                r#"(() => {{
                    const el = document.querySelector({});
                    if (!el) return false;
                    el.focus();
                    el.select();
                    const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set;
                    setter.call(el, '');
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return true;
                }})()"#,
                js_str(selector)
            ))
            .await?;
        if cleared {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(selector.to_string()))
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> BrowserResult<()> {
        let el = self.element(selector).await?;
        let result = el.type_str(text).await.map(|_| ()).map_err(BrowserError::from);
        self.track(result)
    }

    async fn press_key(&self, selector: &str, key: &str) -> BrowserResult<()> {
        let el = self.element(selector).await?;
        let result = el.press_key(key).await.map(|_| ()).map_err(BrowserError::from);
        self.track(result)
    }

    async fn scroll_to_top(&self) -> BrowserResult<()> {
        let _: bool = self
            .eval("(() => { window.scrollTo(0, 0); return true; })()".to_string())
            .await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> BrowserResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.page.clone().close().await.map_err(BrowserError::from)
    }
}
