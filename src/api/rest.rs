// =============================================================================
// REST Endpoints
// =============================================================================

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::compute::{compute, ComputeRequest, ComputeResponse};
use crate::error::EngineError;

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    started_at: i64,
    active_feeds: usize,
    subscriptions: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
        started_at: state.started_at,
        active_feeds: state.orchestrator.active_feeds().len(),
        subscriptions: state.orchestrator.subscription_count(),
    })
}

// =============================================================================
// Batch compute
// =============================================================================

pub async fn compute_indicators(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ComputeRequest>,
) -> Result<Json<ComputeResponse>, EngineError> {
    let symbol = request.symbol.clone();
    match compute(&state.provider, request).await {
        Ok(response) => {
            info!(symbol = %symbol, count = response.count, "compute served");
            Ok(Json(response))
        }
        Err(e) if e.is_retryable() => {
            warn!(symbol = %symbol, kind = e.kind(), error = %e, "compute failed upstream");
            Err(e)
        }
        Err(e) => {
            info!(symbol = %symbol, kind = e.kind(), error = %e, "compute rejected");
            Err(e)
        }
    }
}
