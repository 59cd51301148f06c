// =============================================================================
// HTTP / WebSocket API — Axum 0.7
// =============================================================================
//
//   GET  /api/v1/health       liveness plus feed / subscription counts
//   POST /api/v1/indicators   batch compute over a historical range
//   GET  /api/v1/stream       websocket; first text frame is the request
//
// Engine errors render as `{"error": <kind>, "message": <text>}` with a
// status derived from the error kind.
// =============================================================================

pub mod rest;
pub mod ws;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;

use crate::app_state::AppState;
use crate::error::EngineError;

/// Build the full API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(rest::health))
        .route("/api/v1/indicators", post(rest::compute_indicators))
        .route("/api/v1/stream", get(ws::stream_handler))
        .with_state(state)
}

pub fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) | EngineError::TooManySymbols { .. } => StatusCode::BAD_REQUEST,
        EngineError::RequestTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        EngineError::Upstream(_) | EngineError::Malformed(_) => StatusCode::BAD_GATEWAY,
        EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_body(err: &EngineError) -> serde_json::Value {
    json!({ "error": err.kind(), "message": err.to_string() })
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        (status_for(&self), axum::Json(error_body(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_kind() {
        assert_eq!(status_for(&EngineError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&EngineError::TooManySymbols { requested: 3, max: 2 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&EngineError::RequestTooLarge("x".into())), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(status_for(&EngineError::Upstream("x".into())), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn body_carries_kind() {
        let body = error_body(&EngineError::TooManySymbols { requested: 3, max: 2 });
        assert_eq!(body["error"], "too_many_symbols");
        assert!(body["message"].as_str().unwrap().contains("maximum is 2"));
    }
}
