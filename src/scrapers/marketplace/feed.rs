//! Per-city feed pagination.
//!
//! The feed has no "next page" control. Once a run of stale listings shows
//! the scan has left the freshness window, the minimum-price filter is set
//! to a new random value, which reshuffles the feed, and scanning restarts
//! from the top.

use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, error, info, warn};

use super::pacing::{
    AFTER_FEED_LOAD, AFTER_FILTER_CHANGE, BETWEEN_ADS, BETWEEN_PASSES, FILTER_INPUT,
};
use super::selectors::{BODY, FEED_ITEM_LINKS, MIN_PRICE_INPUTS};
use super::{canonical_item_link, CityReport, MarketplaceCrawler, StopReason};
use crate::extract::is_checkpoint;
use crate::extract::text::truncate_chars;
use crate::models::{AdStatus, CityTarget, ListingRecord};
use crate::scrapers::browser::{BrowserResult, PageHandle};
use crate::storage::{SecuritySkipTable, SeenLeads};

/// States of a city pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CityState {
    LoadingFeed,
    Scanning,
    Mutating,
    Stopped(StopReason),
}

/// Transient counters, discarded when the city pass ends.
#[derive(Debug, Default)]
struct CityScrapeState {
    min_price: Option<u32>,
    non_lead_streak: u32,
    price_mutations: u32,
    no_progress: u32,
    /// Links extracted at least once during this city pass.
    extracted: HashSet<String>,
    /// Leads whose delivery failed; not reopened until the next run.
    undelivered: HashSet<String>,
}

/// What one scan over the current feed ended with.
enum ScanEnd {
    /// Every link was visited; `progress` tells whether any link was
    /// extracted for the first time.
    Exhausted { progress: bool },
    /// Too many stale listings in a row.
    PageBoundary,
}

impl<'a> MarketplaceCrawler<'a> {
    /// Crawl one city feed until a stop condition is reached.
    pub async fn crawl_city(
        &self,
        city: &CityTarget,
        feed_page: &dyn PageHandle,
        ad_page: &mut Box<dyn PageHandle>,
        seen: &mut SeenLeads,
        skips: &mut SecuritySkipTable,
    ) -> CityReport {
        let mut report = CityReport::new(&city.name);
        let mut st = CityScrapeState::default();
        let mut state = CityState::LoadingFeed;

        info!("Starting city {}", city.name);

        let reason = loop {
            state = match state {
                CityState::LoadingFeed => match self.load_feed(city, feed_page).await {
                    Ok(next) => next,
                    Err(e) => CityState::Stopped(StopReason::FeedUnavailable(e.to_string())),
                },
                CityState::Scanning => {
                    match self
                        .scan(city, feed_page, ad_page, seen, skips, &mut st, &mut report)
                        .await
                    {
                        Ok(None) => CityState::Mutating,
                        Ok(Some(next)) => next,
                        Err(e) => CityState::Stopped(StopReason::Failed(e.to_string())),
                    }
                }
                CityState::Mutating => self.mutate(city, feed_page, &mut st, &mut report).await,
                CityState::Stopped(reason) => break reason,
            };
        };

        info!(
            "City {} stopped ({}): {} processed, {} leads, {} checkpoints, {} errors, {} mutations",
            city.name,
            reason,
            report.ads_processed,
            report.leads_found,
            report.checkpoints,
            report.errors,
            report.price_mutations
        );
        report.stop_reason = Some(reason);
        report
    }

    async fn load_feed(&self, city: &CityTarget, page: &dyn PageHandle) -> BrowserResult<CityState> {
        page.goto(&city.url, self.limits.navigation_timeout).await?;
        self.pacing.pause(AFTER_FEED_LOAD).await;
        page.hard_refresh(self.limits.navigation_timeout).await?;
        self.pacing.pause(AFTER_FEED_LOAD).await;

        if self.feed_is_checkpoint(page).await? {
            warn!("Feed for {} is a security checkpoint", city.name);
            return Ok(CityState::Stopped(StopReason::FeedCheckpoint));
        }
        Ok(CityState::Scanning)
    }

    async fn feed_is_checkpoint(&self, page: &dyn PageHandle) -> BrowserResult<bool> {
        let text = page.inner_text(BODY).await?;
        Ok(is_checkpoint(truncate_chars(
            &text,
            self.limits.checkpoint_scan_chars,
        )))
    }

    /// Item links currently rendered, canonical, deduplicated and capped.
    async fn collect_links(&self, page: &dyn PageHandle) -> BrowserResult<Vec<String>> {
        let hrefs = page.attribute_all(FEED_ITEM_LINKS, "href").await?;
        let mut seen = HashSet::new();
        let links: Vec<String> = hrefs
            .iter()
            .filter_map(|href| canonical_item_link(href))
            .filter(|link| seen.insert(link.clone()))
            .take(self.limits.feed_limit)
            .collect();

        page.scroll_to_top().await?;
        Ok(links)
    }

    /// One pass over the current feed.
    ///
    /// Returns `Ok(None)` at a page boundary, `Ok(Some(state))` otherwise.
    #[allow(clippy::too_many_arguments)]
    async fn scan(
        &self,
        city: &CityTarget,
        feed_page: &dyn PageHandle,
        ad_page: &mut Box<dyn PageHandle>,
        seen: &mut SeenLeads,
        skips: &mut SecuritySkipTable,
        st: &mut CityScrapeState,
        report: &mut CityReport,
    ) -> BrowserResult<Option<CityState>> {
        if self.feed_is_checkpoint(feed_page).await? {
            warn!("Feed for {} turned into a security checkpoint", city.name);
            return Ok(Some(CityState::Stopped(StopReason::FeedCheckpoint)));
        }

        let links = self.collect_links(feed_page).await?;
        if links.is_empty() {
            st.no_progress += 1;
            warn!(
                "No feed links for {} ({}/{})",
                city.name, st.no_progress, self.limits.max_no_progress
            );
            return Ok(Some(self.after_pass(st)));
        }
        debug!(
            "{} feed links for {} (min price {:?})",
            links.len(),
            city.name,
            st.min_price
        );

        match self
            .scan_links(city, &links, ad_page, seen, skips, st, report)
            .await
        {
            ScanEnd::PageBoundary => {
                st.no_progress = 0;
                Ok(None)
            }
            ScanEnd::Exhausted { progress } => {
                if progress {
                    st.no_progress = 0;
                } else {
                    st.no_progress += 1;
                    debug!(
                        "No progress for {} ({}/{})",
                        city.name, st.no_progress, self.limits.max_no_progress
                    );
                }
                Ok(Some(self.after_pass(st)))
            }
        }
    }

    fn after_pass(&self, st: &CityScrapeState) -> CityState {
        if st.no_progress >= self.limits.max_no_progress {
            CityState::Stopped(StopReason::NoProgress)
        } else {
            CityState::Scanning
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn scan_links(
        &self,
        city: &CityTarget,
        links: &[String],
        ad_page: &mut Box<dyn PageHandle>,
        seen: &mut SeenLeads,
        skips: &mut SecuritySkipTable,
        st: &mut CityScrapeState,
        report: &mut CityReport,
    ) -> ScanEnd {
        let mut progress = false;
        st.non_lead_streak = 0;

        for link in links {
            if seen.contains(link) || st.undelivered.contains(link) {
                continue;
            }
            if skips.is_skipped(link, self.limits.security_max_hits) {
                debug!("Skipping {} after {} checkpoints", link, skips.hits(link));
                continue;
            }

            let outcome = self.process_ad(ad_page, &city.name, link).await;
            match outcome.status {
                AdStatus::Checkpoint => {
                    report.checkpoints += 1;
                    let hits = skips.record_hit(link);
                    warn!("Checkpoint on {} (hit {})", link, hits);
                    if let Err(e) = skips.save() {
                        error!("Failed to save skip table: {}", e);
                    }
                }
                AdStatus::Error => {
                    report.errors += 1;
                }
                AdStatus::Ok => {
                    report.ads_processed += 1;
                    if st.extracted.insert(link.clone()) {
                        progress = true;
                    }

                    if let Err(e) = self.ledger.all_listings.append(&outcome.record) {
                        error!("Failed to record listing {}: {}", link, e);
                    }

                    if outcome.record.is_lead(self.limits.lead_max_age_minutes) {
                        if !self.handle_lead(&outcome.record, seen, report).await {
                            st.undelivered.insert(link.clone());
                        }
                        st.non_lead_streak = 0;
                    } else {
                        st.non_lead_streak += 1;
                        debug!(
                            "Not a lead (age {:?}); streak {}/{}",
                            outcome.record.age_minutes,
                            st.non_lead_streak,
                            self.limits.non_lead_streak
                        );
                        if st.non_lead_streak >= self.limits.non_lead_streak {
                            info!("Page boundary reached for {}", city.name);
                            return ScanEnd::PageBoundary;
                        }
                    }
                }
            }

            self.pacing.pause(BETWEEN_ADS).await;
        }

        self.pacing.pause(BETWEEN_PASSES).await;
        ScanEnd::Exhausted { progress }
    }

    /// Store and deliver a lead. Returns whether delivery succeeded.
    async fn handle_lead(
        &self,
        record: &ListingRecord,
        seen: &mut SeenLeads,
        report: &mut CityReport,
    ) -> bool {
        report.leads_found += 1;
        info!(
            "Lead: {} | {} | {} | {:.0} min | {}",
            record.short_title(80),
            record.price,
            record.odometer,
            record.age_minutes.unwrap_or_default(),
            record.link
        );

        if let Err(e) = self.ledger.leads.append(record) {
            error!("Failed to record lead {}: {}", record.link, e);
        }

        match self.sink.deliver(record).await {
            Ok(()) => {
                seen.insert(record.link.clone());
                report.leads_delivered += 1;
                true
            }
            Err(e) => {
                warn!("Lead delivery failed for {}: {}", record.link, e);
                false
            }
        }
    }

    /// Apply a new random minimum price, or stop the city.
    async fn mutate(
        &self,
        city: &CityTarget,
        page: &dyn PageHandle,
        st: &mut CityScrapeState,
        report: &mut CityReport,
    ) -> CityState {
        if st.price_mutations >= self.limits.max_price_mutations {
            info!(
                "Price mutation ceiling ({}) reached for {}",
                self.limits.max_price_mutations, city.name
            );
            return CityState::Stopped(StopReason::MutationCeiling);
        }
        st.price_mutations += 1;
        report.price_mutations = st.price_mutations;

        let price = rand::thread_rng().gen_range(self.limits.min_price_range.clone());
        info!(
            "Setting minimum price to {} for {} (mutation {}/{})",
            price, city.name, st.price_mutations, self.limits.max_price_mutations
        );

        match self.change_min_price(page, price).await {
            Ok(true) => {
                st.min_price = Some(price);
                st.non_lead_streak = 0;
                self.pacing.pause(AFTER_FILTER_CHANGE).await;
                CityState::Scanning
            }
            Ok(false) => {
                warn!("No minimum price input found for {}", city.name);
                CityState::Stopped(StopReason::MutationFailed)
            }
            Err(e) => {
                warn!("Changing minimum price failed for {}: {}", city.name, e);
                CityState::Stopped(StopReason::MutationFailed)
            }
        }
    }

    /// Type `price` into the first visible minimum-price input and submit it.
    async fn change_min_price(&self, page: &dyn PageHandle, price: u32) -> BrowserResult<bool> {
        page.scroll_to_top().await?;
        self.pacing.pause(FILTER_INPUT).await;

        let mut input = None;
        for selector in MIN_PRICE_INPUTS {
            if page.is_visible(selector).await? {
                input = Some(*selector);
                break;
            }
        }
        let Some(selector) = input else {
            return Ok(false);
        };

        page.click(selector).await?;
        self.pacing.pause(FILTER_INPUT).await;
        page.clear_input(selector).await?;
        page.type_text(selector, &price.to_string()).await?;
        self.pacing.pause(FILTER_INPUT).await;
        page.press_key(selector, "Enter").await?;
        Ok(true)
    }
}
