//! HTTP request handlers for the web server.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::AppState;

/// Service information and store locations.
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.engine.settings();
    let ledger = state.engine.ledger();
    let cities: Vec<&str> = settings.cities.iter().map(|c| c.name.as_str()).collect();

    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "cities": cities,
        "scrape_interval_secs": settings.scrape_interval().as_secs(),
        "lead_max_age_minutes": settings.limits.lead_max_age_minutes,
        "stores": {
            "all_listings": ledger.all_listings.path().display().to_string(),
            "leads": ledger.leads.path().display().to_string(),
            "security_skip": ledger.skip_table_path.display().to_string(),
        },
    }))
}

/// Health check; also restarts the scheduler if it is not running.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let started = state.ensure_scheduler();
    if started {
        tracing::info!("Scheduler started from health check");
    }

    Json(serde_json::json!({
        "status": "ok",
        "scheduler_started": started,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LeadsParams {
    /// Only the most recent `limit` leads.
    pub limit: Option<usize>,
}

/// Contents of the lead store.
pub async fn list_leads(
    State(state): State<AppState>,
    Query(params): Query<LeadsParams>,
) -> impl IntoResponse {
    let leads = match state.engine.ledger().leads.read_all() {
        Ok(leads) => leads,
        Err(e) => {
            tracing::error!("Failed to read lead store: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "success": false, "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let count = leads.len();
    let skip = params.limit.map_or(0, |limit| count.saturating_sub(limit));
    let leads: Vec<_> = leads.into_iter().skip(skip).collect();

    Json(serde_json::json!({
        "success": true,
        "leads_count": count,
        "leads": leads,
    }))
    .into_response()
}

/// Engine run state and the last run summary.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.engine.status().await;
    let totals = status.last_summary.as_ref().map(|s| s.totals());

    Json(serde_json::json!({
        "running": status.running,
        "runs_completed": status.runs_completed,
        "last_started": status.last_started,
        "last_finished": status.last_finished,
        "last_error": status.last_error,
        "last_totals": totals,
        "last_summary": status.last_summary,
        "scheduler_running": state.scheduler.is_running(),
    }))
}

/// Queue a run in the background. It waits for any run already in progress.
pub async fn trigger_run(State(state): State<AppState>) -> impl IntoResponse {
    let already_running = state.engine.status().await.running;
    let engine = state.engine.clone();

    tokio::spawn(async move {
        if let Err(e) = engine.run_once().await {
            tracing::error!("Requested run failed: {:#}", e);
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "queued": true,
            "waiting_for_current_run": already_running,
        })),
    )
}
