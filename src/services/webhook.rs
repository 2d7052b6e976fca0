//! Lead delivery.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::ListingRecord;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Webhook returned status {0}")]
    Status(u16),
    #[error("No webhook URL configured")]
    NotConfigured,
}

/// Destination for qualifying leads.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Deliver one lead. A single attempt; callers do not retry.
    async fn deliver(&self, record: &ListingRecord) -> Result<(), DeliveryError>;
}

/// Posts each lead as JSON to a webhook.
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: Option<&str>, timeout: Duration) -> Result<Self, DeliveryError> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(DeliveryError::NotConfigured)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl LeadSink for WebhookClient {
    async fn deliver(&self, record: &ListingRecord) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.url).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Webhook rejected {} with {}", record.link, status);
            return Err(DeliveryError::Status(status.as_u16()));
        }
        info!("Webhook accepted {}", record.link);
        Ok(())
    }
}

/// Sink used when no webhook is configured: leads are only kept in the lead store.
pub struct LogOnlySink;

#[async_trait]
impl LeadSink for LogOnlySink {
    async fn deliver(&self, record: &ListingRecord) -> Result<(), DeliveryError> {
        debug!("No webhook configured; lead {} kept in the lead store only", record.link);
        Ok(())
    }
}

/// Webhook sink for `url`, falling back to [`LogOnlySink`] when unset.
pub fn lead_sink(url: Option<&str>, timeout: Duration) -> anyhow::Result<Box<dyn LeadSink>> {
    match WebhookClient::new(url, timeout) {
        Ok(client) => Ok(Box::new(client)),
        Err(DeliveryError::NotConfigured) => {
            warn!("No webhook URL configured; leads will only be written to disk");
            Ok(Box::new(LogOnlySink))
        }
        Err(e) => Err(e.into()),
    }
}
