//! Full runs through the engine.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marketlead::config::Settings;
use marketlead::scrapers::browser::{BrowserLauncher, BrowserSession};
use marketlead::scrapers::marketplace::StopReason;
use marketlead::services::orchestrator::Engine;
use tempfile::tempdir;

use support::{city, item, lead_html, stale_html, FakeWeb, RecordingSink};

fn settings(dir: &std::path::Path, cities: &[&str]) -> Settings {
    let mut settings = Settings::with_data_dir(dir.to_path_buf());
    settings.pacing_scale = 0.0;
    settings.cities = cities.iter().map(|name| city(name)).collect();
    settings
}

#[tokio::test]
async fn test_cities_run_in_order_and_share_seen_set() {
    let dir = tempdir().unwrap();
    let web = FakeWeb::new();
    // Both feeds show the same fresh listing.
    web.feed(&city("montreal"), vec![vec![1, 2]])
        .feed(&city("toronto"), vec![vec![1, 3]])
        .ad(1, lead_html("2020 Toyota Corolla"))
        .ad(2, stale_html("2011 Mazda 5"))
        .ad(3, lead_html("2017 Jeep Cherokee"));
    let sink = RecordingSink::default();
    let engine = Engine::new(
        settings(dir.path(), &["montreal", "toronto"]),
        web.launcher(),
        Arc::new(sink.clone()),
    );

    let summary = engine.run_once().await.unwrap();

    let names: Vec<&str> = summary.cities.iter().map(|c| c.city.as_str()).collect();
    assert_eq!(names, vec!["montreal", "toronto"]);
    assert_eq!(sink.links(), vec![item(1), item(3)]);
    assert_eq!(web.visit_count(&item(1)), 1);
    assert_eq!(summary.totals().leads_delivered, 2);
    assert_eq!(summary.seen_leads, 2);

    let status = engine.status().await;
    assert!(!status.running);
    assert_eq!(status.runs_completed, 1);
    assert_eq!(status.last_summary.unwrap().cities.len(), 2);
}

#[tokio::test]
async fn test_failing_city_does_not_stop_run() {
    let dir = tempdir().unwrap();
    let web = FakeWeb::new();
    web.feed(&city("thunder bay"), vec![vec![9]])
        .ad(9, lead_html("2016 Ford F-150 XLT"));
    let sink = RecordingSink::default();
    let engine = Engine::new(
        settings(dir.path(), &["unreachable", "thunder bay"]),
        web.launcher(),
        Arc::new(sink.clone()),
    );

    let summary = engine.run_once().await.unwrap();

    assert!(matches!(
        summary.cities[0].stop_reason,
        Some(StopReason::FeedUnavailable(_))
    ));
    assert_eq!(summary.cities[1].leads_delivered, 1);
    assert_eq!(sink.links(), vec![item(9)]);
}

#[tokio::test]
async fn test_second_run_skips_delivered_leads() {
    let dir = tempdir().unwrap();
    let web = FakeWeb::new();
    web.feed(&city("sudbury"), vec![vec![4]])
        .ad(4, lead_html("2019 Honda CR-V EX"));
    let sink = RecordingSink::default();
    let engine = Engine::new(
        settings(dir.path(), &["sudbury"]),
        web.launcher(),
        Arc::new(sink.clone()),
    );

    engine.run_once().await.unwrap();
    let second = engine.run_once().await.unwrap();

    assert_eq!(second.totals().ads_processed, 0);
    assert_eq!(sink.links().len(), 1);
    assert_eq!(web.visit_count(&item(4)), 1);
}

/// Tracks how many sessions are open at once.
struct SlowLauncher {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserLauncher for SlowLauncher {
    async fn open(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("browser unavailable"))
    }
}

#[tokio::test]
async fn test_concurrent_runs_serialize() {
    let dir = tempdir().unwrap();
    let peak = Arc::new(AtomicUsize::new(0));
    let engine = Arc::new(Engine::new(
        settings(dir.path(), &["sudbury"]),
        Arc::new(SlowLauncher {
            active: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        }),
        Arc::new(RecordingSink::default()),
    ));

    let (a, b) = tokio::join!(engine.run_once(), engine.run_once());

    assert!(a.is_err());
    assert!(b.is_err());
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    let status = engine.status().await;
    assert_eq!(status.runs_completed, 0);
    assert!(status.last_error.unwrap().contains("browser unavailable"));
}
