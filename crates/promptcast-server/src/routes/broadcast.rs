//! Broadcast and target listing routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::state::AppState;
use promptcast_browser::{InjectionRequest, TargetOutcome};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/broadcast", post(broadcast))
        .route("/targets", get(list_targets))
}

#[derive(Debug, Deserialize)]
struct BroadcastBody {
    text: String,
    #[serde(default, rename = "startNewConversation")]
    start_new_conversation: bool,
}

/// POST /api/broadcast: run the injection protocol on every enabled target.
async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BroadcastBody>,
) -> impl IntoResponse {
    let request = match InjectionRequest::new(body.text, body.start_new_conversation) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            );
        }
    };

    info!(
        "Broadcasting {} chars (new conversation: {})",
        request.text().chars().count(),
        request.start_new_conversation()
    );
    let reports = state.broadcaster.send(request).await;
    let delivered = reports
        .iter()
        .filter(|r| r.outcome == TargetOutcome::Done)
        .count();
    info!("Broadcast delivered to {}/{} targets", delivered, reports.len());

    (
        StatusCode::OK,
        Json(serde_json::json!({ "reports": reports })),
    )
}

/// GET /api/targets: configured targets and whether each has an open tab.
async fn list_targets(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let targets = state.broadcaster.list_targets().await;
    Json(serde_json::json!({ "targets": targets }))
}
