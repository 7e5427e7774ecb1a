//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::server::AppState;
use crate::monitor::CheckResult;

/// Body of `GET /healthz`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub sites_configured: usize,
    /// Latest result per site, ordered by URL.
    pub last_known: Vec<CheckResult>,
    pub uptime_secs: u64,
    pub now: DateTime<Utc>,
}

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness_check))
}

/// Monitor status with the last known result of every site.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sites_configured: state.sites_configured,
        last_known: state.store.snapshot(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        now: Utc::now(),
    })
}

/// Liveness check - is the service alive?
async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "uptimeSecs": uptime
        })),
    )
}
