use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::activity::{ActivityRecord, ActivityType};
use crate::error::StorageError;
use crate::service::Stats;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

// --- Request types ---

#[derive(Debug, Deserialize)]
pub struct EmitActivityRequest {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

// --- Handlers ---

/// POST /api/activities — Producer entry point (grading, submission,
/// assignment-creation workflows). Returns 201 with the persisted record
/// once the durable write has succeeded; fan-out continues in the
/// background. 503 means nothing was written and the producer owns the
/// retry/drop decision.
pub async fn emit_activity(
    State(state): State<AppState>,
    Json(req): Json<EmitActivityRequest>,
) -> Result<(StatusCode, Json<ActivityRecord>), (StatusCode, String)> {
    if req.user_id.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "user_id must be non-empty".to_string(),
        ));
    }

    let kind = ActivityType::from_str(&req.kind);

    match state.service.emit_activity(&req.user_id, kind, req.payload).await {
        Ok(record) => Ok((StatusCode::CREATED, Json(record))),
        Err(e @ StorageError::Unavailable(_)) => {
            tracing::error!(
                user_id = %req.user_id,
                error = %e,
                "Activity write failed"
            );
            Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

/// GET /api/stats — Connection/room counts for health and monitoring.
pub async fn stats(State(state): State<AppState>) -> Json<Stats> {
    Json(state.service.stats())
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/activities", post(emit_activity))
        .route("/api/stats", get(stats));

    // WebSocket endpoint (authenticates in-band after upgrade)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(api_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}
