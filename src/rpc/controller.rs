//! `controller` RPC namespace: rule ingestion and lifecycle control.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use lydian_traffic::TrafficRule;

use crate::platform::context::AgentContext;
use crate::rpc::error::{internal_error, RpcError};

pub fn router() -> Router<AgentContext> {
    Router::new()
        .route("/register_traffic", post(register_traffic))
        .route("/unregister_traffic", post(unregister_traffic))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/discover_interfaces", post(discover_interfaces))
}

#[derive(Deserialize)]
struct RuleIds {
    ruleids: Vec<String>,
}

async fn register_traffic(
    State(ctx): State<AgentContext>,
    Json(rules): Json<Vec<TrafficRule>>,
) -> Result<Json<serde_json::Value>, RpcError> {
    ctx.controller().register_traffic(rules).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn unregister_traffic(
    State(ctx): State<AgentContext>,
    Json(body): Json<RuleIds>,
) -> Result<Json<serde_json::Value>, RpcError> {
    ctx.controller().unregister_traffic(&body.ruleids).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn start(
    State(ctx): State<AgentContext>,
    Json(body): Json<RuleIds>,
) -> Result<Json<serde_json::Value>, RpcError> {
    ctx.controller().start(&body.ruleids).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn stop(
    State(ctx): State<AgentContext>,
    Json(body): Json<RuleIds>,
) -> Result<Json<serde_json::Value>, RpcError> {
    ctx.controller().stop(&body.ruleids).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn discover_interfaces(
    State(ctx): State<AgentContext>,
) -> Result<Json<serde_json::Value>, RpcError> {
    ctx.controller().discover_interfaces().await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"ok": true})))
}
