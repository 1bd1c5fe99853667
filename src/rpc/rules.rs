//! `rules` RPC namespace: read and enable/disable a single persisted rule.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::platform::context::AgentContext;
use crate::rpc::error::{internal_error, not_found, RpcError};

pub fn router() -> Router<AgentContext> {
    Router::new()
        .route("/:ruleid", get(get_rule))
        .route("/:ruleid/enable", post(enable))
        .route("/:ruleid/disable", post(disable))
}

async fn get_rule(
    State(ctx): State<AgentContext>,
    Path(ruleid): Path<String>,
) -> Result<Json<serde_json::Value>, RpcError> {
    match ctx.rules().get(&ruleid).await {
        Some(rule) => Ok(Json(serde_json::json!(rule))),
        None => Err(not_found(format!("rule {ruleid} not found"))),
    }
}

async fn enable(
    State(ctx): State<AgentContext>,
    Path(ruleid): Path<String>,
) -> Result<Json<serde_json::Value>, RpcError> {
    ctx.rules().enable(&ruleid).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn disable(
    State(ctx): State<AgentContext>,
    Path(ruleid): Path<String>,
) -> Result<Json<serde_json::Value>, RpcError> {
    ctx.rules().disable(&ruleid).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"ok": true})))
}
