//! Processing of a single listing page.

use chrono::Local;
use tracing::{debug, info, warn};

use super::pacing::{AFTER_AD_NAVIGATION, BEFORE_RETRY};
use super::selectors::{BODY, LISTING_HEADING, SEE_MORE_CONTROLS, SEE_MORE_MAX_CLICKS, SEE_MORE_TEXT};
use super::MarketplaceCrawler;
use crate::extract::text::truncate_chars;
use crate::extract::{extract_listing, is_checkpoint, Extraction};
use crate::models::{AdStatus, ListingRecord};
use crate::scrapers::browser::{BrowserError, BrowserResult, PageHandle};

/// Result of processing one listing. `Error` records must not be persisted.
#[derive(Debug, Clone)]
pub struct AdOutcome {
    pub status: AdStatus,
    pub record: ListingRecord,
}

impl<'a> MarketplaceCrawler<'a> {
    /// Open `link` on `page` and extract its fields.
    ///
    /// Transient failures are retried; when the tab itself was destroyed a
    /// fresh one replaces `page` before the next attempt.
    pub async fn process_ad(
        &self,
        page: &mut Box<dyn PageHandle>,
        city: &str,
        link: &str,
    ) -> AdOutcome {
        let attempts = self.limits.ad_attempts.max(1);

        for attempt in 1..=attempts {
            if page.is_closed() {
                if let Err(e) = self.replace_page(page).await {
                    warn!("Could not reopen listing tab: {}", e);
                }
            }

            match self.try_ad(page.as_ref(), city, link).await {
                Ok(outcome) => return outcome,
                Err(e) => {
                    warn!("Attempt {}/{} failed for {}: {}", attempt, attempts, link, e);
                    if e.is_page_closed() {
                        if let Err(e) = self.replace_page(page).await {
                            warn!("Could not reopen listing tab: {}", e);
                        }
                    }
                    if attempt < attempts {
                        self.pacing.pause(BEFORE_RETRY).await;
                    }
                }
            }
        }

        AdOutcome {
            status: AdStatus::Error,
            record: ListingRecord::new(city, link),
        }
    }

    async fn replace_page(&self, page: &mut Box<dyn PageHandle>) -> BrowserResult<()> {
        let _ = page.close().await;
        *page = self.session.new_page().await?;
        debug!("Opened a fresh listing tab");
        Ok(())
    }

    async fn page_is_checkpoint(&self, page: &dyn PageHandle) -> BrowserResult<bool> {
        let text = page.inner_text(BODY).await?;
        Ok(is_checkpoint(truncate_chars(
            &text,
            self.limits.checkpoint_scan_chars,
        )))
    }

    async fn try_ad(
        &self,
        page: &dyn PageHandle,
        city: &str,
        link: &str,
    ) -> BrowserResult<AdOutcome> {
        let checkpoint = || AdOutcome {
            status: AdStatus::Checkpoint,
            record: ListingRecord::new(city, link),
        };

        page.goto(link, self.limits.navigation_timeout).await?;
        self.pacing.pause(AFTER_AD_NAVIGATION).await;

        if let Err(e) = page
            .wait_attached(LISTING_HEADING, self.limits.heading_timeout)
            .await
        {
            // Challenge pages usually have no heading at all.
            if matches!(e, BrowserError::Timeout(..)) && self.page_is_checkpoint(page).await? {
                info!("Checkpoint on {}", link);
                return Ok(checkpoint());
            }
            return Err(e);
        }

        if self.page_is_checkpoint(page).await? {
            info!("Checkpoint on {}", link);
            return Ok(checkpoint());
        }

        match page
            .click_by_text(SEE_MORE_CONTROLS, SEE_MORE_TEXT, SEE_MORE_MAX_CLICKS)
            .await
        {
            Ok(n) if n > 0 => debug!("Expanded {} truncated sections", n),
            Ok(_) => {}
            Err(e) if e.is_page_closed() => return Err(e),
            Err(e) => debug!("Could not expand description: {}", e),
        }

        let html = page.html().await?;
        let now = Local::now();
        let mut record = ListingRecord::new(city, link);

        match extract_listing(&html, now) {
            Extraction::Blocked => {
                info!("Security check embedded in {}", link);
                Ok(checkpoint())
            }
            Extraction::Fields(fields) => {
                fields.apply_to(&mut record, now);
                debug!(
                    "Extracted '{}' price={} odometer={} age={:?}",
                    record.short_title(60),
                    record.price,
                    record.odometer,
                    record.age_minutes
                );
                Ok(AdOutcome {
                    status: AdStatus::Ok,
                    record,
                })
            }
        }
    }
}
