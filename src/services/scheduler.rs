//! Background scheduler driving periodic runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::orchestrator::Engine;

/// Starts the periodic run loop at most once.
#[derive(Default)]
pub struct Scheduler {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the loop unless it is already running. Returns whether this
    /// call started it.
    pub fn ensure_started(&self, engine: Arc<Engine>, interval: Duration) -> bool {
        let mut handle = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        info!("Starting scheduler (interval {}s)", interval.as_secs());
        *handle = Some(tokio::spawn(run_forever(engine, interval)));
        true
    }

    pub fn is_running(&self) -> bool {
        match self.handle.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|h| !h.is_finished()),
            Err(poisoned) => poisoned.into_inner().as_ref().is_some_and(|h| !h.is_finished()),
        }
    }
}

async fn run_forever(engine: Arc<Engine>, interval: Duration) {
    loop {
        if let Err(e) = engine.run_once().await {
            error!("Scheduled run failed: {:#}", e);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::scrapers::browser::{BrowserLauncher, BrowserSession};
    use crate::services::webhook::LogOnlySink;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLauncher(Arc<AtomicUsize>);

    #[async_trait]
    impl BrowserLauncher for CountingLauncher {
        async fn open(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("no browser in tests"))
        }
    }

    #[tokio::test]
    async fn test_started_once() {
        let dir = tempfile::tempdir().unwrap();
        let opened = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(Engine::new(
            Settings::with_data_dir(dir.path().to_path_buf()),
            Arc::new(CountingLauncher(opened.clone())),
            Arc::new(LogOnlySink),
        ));
        let scheduler = Scheduler::new();

        assert!(scheduler.ensure_started(engine.clone(), Duration::from_secs(3600)));
        assert!(!scheduler.ensure_started(engine.clone(), Duration::from_secs(3600)));
        assert!(scheduler.is_running());

        let mut status = engine.status().await;
        for _ in 0..100 {
            if status.last_error.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = engine.status().await;
        }
        assert!(status.last_error.is_some());
        assert!(!status.running);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }
}
