//! Configuration management for marketlead using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::CityTarget;
use crate::scrapers::browser::BrowserEngineConfig;
use crate::scrapers::marketplace::{CrawlLimits, Pacing};
use crate::storage::LeadLedger;

/// Environment variable overriding the webhook URL.
pub const WEBHOOK_URL_ENV: &str = "MARKETLEAD_WEBHOOK_URL";
/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "MARKETLEAD_DATA_DIR";
/// Environment variable pointing at a remote Chrome DevTools endpoint.
pub const REMOTE_BROWSER_ENV: &str = "MARKETLEAD_REMOTE_BROWSER";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the listing logs and skip table.
    pub data_dir: PathBuf,
    /// Where leads are posted. `None` keeps them on disk only.
    pub webhook_url: Option<String>,
    /// Webhook request timeout in seconds.
    pub webhook_timeout: u64,
    /// Seconds between scheduled runs.
    pub scrape_interval: u64,
    /// Multiplier on randomized delays; 0 disables them.
    pub pacing_scale: f64,
    /// Address the HTTP service binds to.
    pub bind: String,
    pub cities: Vec<CityTarget>,
    pub browser: BrowserEngineConfig,
    pub limits: CrawlLimits,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("marketlead");

        Self {
            data_dir,
            webhook_url: None,
            webhook_timeout: 100,
            scrape_interval: 60,
            pacing_scale: 1.0,
            bind: "127.0.0.1:8000".to_string(),
            cities: CityTarget::defaults(),
            browser: BrowserEngineConfig::default(),
            limits: CrawlLimits::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    pub fn ledger(&self) -> LeadLedger {
        LeadLedger::in_dir(&self.data_dir)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::new(self.pacing_scale)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout)
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval.max(1))
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var(WEBHOOK_URL_ENV) {
            tracing::debug!("Using {} from environment", WEBHOOK_URL_ENV);
            self.webhook_url = Some(url);
        }
        if let Some(dir) = var(DATA_DIR_ENV) {
            tracing::debug!("Using {} from environment: {}", DATA_DIR_ENV, dir);
            self.data_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }
        if let Some(remote) = var(REMOTE_BROWSER_ENV) {
            tracing::debug!("Using {} from environment: {}", REMOTE_BROWSER_ENV, remote);
            self.browser.remote_url = Some(remote);
        }
    }
}

/// Crawl thresholds as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_max_age_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price_low: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price_high: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_lead_streak: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price_mutations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_no_progress: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_max_hits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_limit: Option<usize>,
    /// Navigation timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_timeout: Option<u64>,
    /// Listing heading wait in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_timeout: Option<u64>,
}

impl CrawlConfig {
    fn apply(&self, limits: &mut CrawlLimits) {
        if let Some(v) = self.lead_max_age_minutes {
            limits.lead_max_age_minutes = v;
        }
        let low = self.min_price_low.unwrap_or(*limits.min_price_range.start());
        let high = self.min_price_high.unwrap_or(*limits.min_price_range.end());
        limits.min_price_range = low.min(high)..=low.max(high);
        if let Some(v) = self.non_lead_streak {
            limits.non_lead_streak = v.max(1);
        }
        if let Some(v) = self.max_price_mutations {
            limits.max_price_mutations = v;
        }
        if let Some(v) = self.max_no_progress {
            limits.max_no_progress = v.max(1);
        }
        if let Some(v) = self.security_max_hits {
            limits.security_max_hits = v.max(1);
        }
        if let Some(v) = self.feed_limit {
            limits.feed_limit = v;
        }
        if let Some(v) = self.navigation_timeout {
            limits.navigation_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.heading_timeout {
            limits.heading_timeout = Duration::from_secs(v);
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Webhook timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_timeout: Option<u64>,
    /// Seconds between scheduled runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// City feeds, replacing the built-in list when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cities: Vec<CityTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    #[serde(default)]
    pub crawl: CrawlConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers marketlead config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("marketlead").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if it came from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// Paths starting with ~ are expanded.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref url) = self.webhook_url {
            settings.webhook_url = Some(url.clone());
        }
        if let Some(timeout) = self.webhook_timeout {
            settings.webhook_timeout = timeout;
        }
        if let Some(interval) = self.scrape_interval {
            settings.scrape_interval = interval;
        }
        if let Some(scale) = self.pacing_scale {
            settings.pacing_scale = scale;
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        if !self.cities.is_empty() {
            settings.cities = self.cities.clone();
        }
        if let Some(ref browser) = self.browser {
            let mut browser = browser.clone();
            if let Some(ref cookies) = browser.cookies_file {
                browser.cookies_file =
                    Some(self.resolve_path(&cookies.to_string_lossy(), base_dir));
            }
            settings.browser = browser;
        }
        self.crawl.apply(&mut settings.limits);
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

/// Load settings: defaults, then config file, then environment, then flags.
pub async fn load_settings(options: LoadOptions) -> anyhow::Result<(Settings, Config)> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?,
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env_overrides(|name| std::env::var(name).ok());

    if let Some(data_dir) = options.data_dir {
        settings.data_dir = data_dir;
    }

    Ok((settings, config))
}
