//! Shared helper functions for CLI commands.

use std::sync::Arc;

use crate::config::Settings;
use crate::scrapers::browser::ChromeLauncher;
use crate::services::orchestrator::Engine;
use crate::services::webhook::lead_sink;

/// Build the run engine from resolved settings.
pub fn build_engine(settings: &Settings) -> anyhow::Result<Arc<Engine>> {
    let sink = lead_sink(settings.webhook_url.as_deref(), settings.webhook_timeout())?;
    let launcher = ChromeLauncher::new(settings.browser.clone());
    Ok(Arc::new(Engine::new(
        settings.clone(),
        Arc::new(launcher),
        Arc::from(sink),
    )))
}

/// Truncate a string to `max_len` characters, ending with "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
