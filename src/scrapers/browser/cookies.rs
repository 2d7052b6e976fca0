//! Session cookies loaded from a storage-state file.
//!
//! Accepts either a Playwright-style storage state (`{"cookies": [...]}`) or a
//! bare array of cookie objects. Cookies without a positive `expires` are
//! treated as session cookies.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// A cookie ready to inject into a browser page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageCookie {
    #[serde(alias = "key")]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default, alias = "httpOnly")]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StorageFile {
    State { cookies: Vec<StorageCookie> },
    Bare(Vec<StorageCookie>),
}

/// Parse storage-state JSON into injectable cookies.
pub fn parse_storage_state(json: &str) -> Result<Vec<StorageCookie>> {
    let file: StorageFile = serde_json::from_str(json).context("Invalid storage state")?;
    let cookies = match file {
        StorageFile::State { cookies } | StorageFile::Bare(cookies) => cookies,
    };

    Ok(cookies
        .into_iter()
        .filter(|c| !c.name.is_empty() && !c.domain.is_empty())
        .map(|mut c| {
            if !matches!(c.expires, Some(e) if e > 0.0) {
                c.expires = None;
            }
            c
        })
        .collect())
}

/// Read and sanitise a storage-state file.
pub fn load_storage_state(path: &Path) -> Result<Vec<StorageCookie>> {
    debug!("Loading cookies from {:?}", path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cookies file {}", path.display()))?;
    parse_storage_state(&content)
}
