//! HTTP surface for the inbound command channel.

use std::sync::Arc;

use action_flow::{CommandResponse, FlowService, InboundCommand};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ServeState {
    service: Arc<FlowService>,
}

pub fn router(service: Arc<FlowService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/commands", post(commands))
        .layer(CorsLayer::permissive())
        .with_state(ServeState { service })
}

async fn health(State(state): State<ServeState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build": env!("GIT_HASH"),
        "flows": state.service.flow_ids(),
    }))
}

async fn commands(
    State(state): State<ServeState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<CommandResponse>) {
    let command = match serde_json::from_value::<InboundCommand>(body) {
        Ok(command) => command,
        Err(err) => {
            warn!(error = %err, "Rejected inbound command");
            return (
                StatusCode::BAD_REQUEST,
                Json(CommandResponse::failed(format!("Unsupported command: {err}"))),
            );
        }
    };

    let response = state.service.handle(command).await;
    info!(success = response.success, "Command handled");
    (StatusCode::OK, Json(response))
}
