//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Detailed health as JSON.
///
/// Always 200; the `state` field says whether the server is actually
/// serving, draining, or stopped.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.shutdown.health_state();

    Json(json!({
        "state": health.as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "open_reports": state.engine.open_count(),
        "sessions": state.sessions.active_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness check: the process is up.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness check: 200 only while the server accepts requests.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.is_accepting() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
