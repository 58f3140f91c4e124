use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::handler::{self, HandleOutcome};
use crate::AppState;

/// HTTP surface: Pub/Sub push deliveries plus a health probe.
///
/// Rejected payloads answer 200 so the subscription does not redeliver them;
/// any other failure answers 500 and is left to the subscription's retry policy.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(push))
        .route("/pubsub/push", post(push))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn push(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    match handler::handle_json(state.provider.as_ref(), &state.options, &body).await {
        Ok(HandleOutcome::Completed(outcome)) => (
            StatusCode::OK,
            Json(json!({"status": "completed", "outcome": outcome.to_string()})),
        ),
        Ok(HandleOutcome::Rejected(e)) => (
            StatusCode::OK,
            Json(json!({"status": "rejected", "error": e.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "failed", "error": e.to_string()})),
        ),
    }
}
