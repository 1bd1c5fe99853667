//! `monitor` RPC namespace: resource-monitor lifecycle control.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use lydian_recorder::DEFAULT_SAMPLE_INTERVAL;

use crate::platform::context::AgentContext;

pub fn router() -> Router<AgentContext> {
    Router::new()
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/is_running", post(is_running))
}

async fn start(State(ctx): State<AgentContext>) -> Json<serde_json::Value> {
    ctx.resource_monitor().start(ctx.recorder(), DEFAULT_SAMPLE_INTERVAL).await;
    Json(serde_json::json!({"ok": true}))
}

async fn stop(State(ctx): State<AgentContext>) -> Json<serde_json::Value> {
    ctx.resource_monitor().stop().await;
    Json(serde_json::json!({"ok": true}))
}

async fn is_running(State(ctx): State<AgentContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({"running": ctx.resource_monitor().is_running()}))
}
