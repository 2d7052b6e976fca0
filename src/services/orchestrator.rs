//! Run engine: one pass over every configured city.
//!
//! [`Engine::run_once`] opens a browser session, reloads the seen-lead set
//! and the security skip table from disk, and crawls each city in order.
//! Only one run executes at a time; a second caller waits for the first.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Local};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::models::CityTarget;
use crate::scrapers::browser::{BrowserLauncher, BrowserSession, PageHandle};
use crate::scrapers::marketplace::pacing::BETWEEN_CITIES;
use crate::scrapers::marketplace::{CityReport, MarketplaceCrawler, StopReason};
use crate::services::webhook::LeadSink;
use crate::storage::{LeadLedger, SecuritySkipTable, SeenLeads};

/// Aggregated counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunTotals {
    pub ads_processed: u32,
    pub leads_found: u32,
    pub leads_delivered: u32,
    pub checkpoints: u32,
    pub errors: u32,
    pub price_mutations: u32,
}

/// Outcome of one full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub cities: Vec<CityReport>,
    /// Links known as delivered leads when the run ended.
    pub seen_leads: usize,
}

impl RunSummary {
    pub fn totals(&self) -> RunTotals {
        self.cities.iter().fold(RunTotals::default(), |mut t, c| {
            t.ads_processed += c.ads_processed;
            t.leads_found += c.leads_found;
            t.leads_delivered += c.leads_delivered;
            t.checkpoints += c.checkpoints;
            t.errors += c.errors;
            t.price_mutations += c.price_mutations;
            t
        })
    }

    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Observable state of the engine, served by `/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub runs_completed: u64,
    pub last_started: Option<DateTime<Local>>,
    pub last_finished: Option<DateTime<Local>>,
    pub last_error: Option<String>,
    pub last_summary: Option<RunSummary>,
}

pub struct Engine {
    settings: Settings,
    ledger: LeadLedger,
    launcher: Arc<dyn BrowserLauncher>,
    sink: Arc<dyn LeadSink>,
    run_guard: Mutex<()>,
    status: RwLock<EngineStatus>,
}

impl Engine {
    pub fn new(
        settings: Settings,
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn LeadSink>,
    ) -> Self {
        let ledger = settings.ledger();
        Self {
            settings,
            ledger,
            launcher,
            sink,
            run_guard: Mutex::new(()),
            status: RwLock::new(EngineStatus::default()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ledger(&self) -> &LeadLedger {
        &self.ledger
    }

    pub async fn status(&self) -> EngineStatus {
        self.status.read().await.clone()
    }

    /// Crawl every configured city once.
    ///
    /// Waits for any run already in progress to finish first.
    pub async fn run_once(&self) -> anyhow::Result<RunSummary> {
        let _guard = self.run_guard.lock().await;

        let started_at = Local::now();
        {
            let mut status = self.status.write().await;
            status.running = true;
            status.last_started = Some(started_at);
        }
        info!("Run started ({} cities)", self.settings.cities.len());

        let result = self.run_cities(started_at).await;

        let mut status = self.status.write().await;
        status.running = false;
        status.last_finished = Some(Local::now());
        match &result {
            Ok(summary) => {
                status.runs_completed += 1;
                status.last_error = None;
                status.last_summary = Some(summary.clone());
                let totals = summary.totals();
                info!(
                    "Run finished in {}s: {} processed, {} leads ({} delivered), {} checkpoints, {} errors",
                    summary.duration_secs(),
                    totals.ads_processed,
                    totals.leads_found,
                    totals.leads_delivered,
                    totals.checkpoints,
                    totals.errors
                );
            }
            Err(e) => {
                error!("Run failed: {:#}", e);
                status.last_error = Some(format!("{:#}", e));
            }
        }

        result
    }

    async fn run_cities(&self, started_at: DateTime<Local>) -> anyhow::Result<RunSummary> {
        self.settings
            .ensure_directories()
            .context("Failed to create data directory")?;

        let mut seen = self
            .ledger
            .load_seen()
            .context("Failed to load the lead store")?;
        let mut skips = self.ledger.load_skips();
        info!(
            "Loaded {} seen leads and {} skip entries",
            seen.len(),
            skips.len()
        );

        let session = self
            .launcher
            .open()
            .await
            .context("Failed to open browser session")?;
        let mut ad_page = session
            .new_page()
            .await
            .context("Failed to open listing tab")?;

        let crawler = MarketplaceCrawler {
            session: session.as_ref(),
            ledger: &self.ledger,
            sink: self.sink.as_ref(),
            limits: self.settings.limits.clone(),
            pacing: self.settings.pacing(),
        };

        let mut cities = Vec::with_capacity(self.settings.cities.len());
        for (i, city) in self.settings.cities.iter().enumerate() {
            if i > 0 {
                crawler.pacing.pause(BETWEEN_CITIES).await;
            }
            let report = self
                .run_city(&crawler, session.as_ref(), city, &mut ad_page, &mut seen, &mut skips)
                .await;
            cities.push(report);
        }

        if let Err(e) = ad_page.close().await {
            warn!("Failed to close listing tab: {}", e);
        }

        Ok(RunSummary {
            started_at,
            finished_at: Local::now(),
            cities,
            seen_leads: seen.len(),
        })
    }

    /// One city, isolated: a failure here never aborts the run.
    async fn run_city(
        &self,
        crawler: &MarketplaceCrawler<'_>,
        session: &dyn BrowserSession,
        city: &CityTarget,
        ad_page: &mut Box<dyn PageHandle>,
        seen: &mut SeenLeads,
        skips: &mut SecuritySkipTable,
    ) -> CityReport {
        if ad_page.is_closed() {
            match session.new_page().await {
                Ok(page) => *ad_page = page,
                Err(e) => warn!("Could not reopen listing tab: {}", e),
            }
        }

        let feed_page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                error!("Could not open feed tab for {}: {}", city.name, e);
                let mut report = CityReport::new(&city.name);
                report.stop_reason = Some(StopReason::Failed(e.to_string()));
                return report;
            }
        };

        let pass = AssertUnwindSafe(crawler.crawl_city(city, feed_page.as_ref(), ad_page, seen, skips))
            .catch_unwind()
            .await;

        if let Err(e) = feed_page.close().await {
            warn!("Failed to close feed tab for {}: {}", city.name, e);
        }

        pass.unwrap_or_else(|_| {
            error!("City {} aborted unexpectedly", city.name);
            let mut report = CityReport::new(&city.name);
            report.stop_reason = Some(StopReason::Failed("city pass panicked".to_string()));
            report
        })
    }
}
