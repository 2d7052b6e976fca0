//! HTTP service exposing the lead store and run status.
//!
//! Serving also keeps the background scheduler alive: it is started when
//! the server comes up and again by `/health` should it ever have stopped.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::services::orchestrator::Engine;
use crate::services::scheduler::Scheduler;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            scheduler: Arc::new(Scheduler::new()),
        }
    }

    /// Start the scheduler if it is not running. Returns whether it was started.
    pub fn ensure_scheduler(&self) -> bool {
        let interval = self.engine.settings().scrape_interval();
        self.scheduler.ensure_started(self.engine.clone(), interval)
    }
}

/// Start the web server and the background scheduler.
pub async fn serve(engine: Arc<Engine>, bind: &str) -> anyhow::Result<()> {
    let state = AppState::new(engine);
    state.ensure_scheduler();
    let app = create_router(state);

    let addr: SocketAddr = bind.parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
