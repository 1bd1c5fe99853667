//! `results` RPC namespace: filtered reads and latency aggregation over
//! recorded traffic (§4.9).

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use lydian_results::ResultFilter;

use crate::platform::context::AgentContext;
use crate::rpc::error::{internal_error, RpcError};

pub fn router() -> Router<AgentContext> {
    Router::new()
        .route("/traffic", post(traffic))
        .route("/count", post(count))
        .route("/latency_stat", post(latency_stat))
        .route("/delete", post(delete_record))
}

#[derive(Deserialize, Default)]
struct FilterWire {
    reqid: Option<String>,
    ruleid: Option<String>,
    source: Option<String>,
    destination: Option<String>,
    protocol: Option<String>,
    result: Option<bool>,
    timestamp_range: Option<(i64, i64)>,
}

impl From<FilterWire> for ResultFilter {
    fn from(wire: FilterWire) -> Self {
        ResultFilter {
            reqid: wire.reqid,
            ruleid: wire.ruleid,
            source: wire.source,
            destination: wire.destination,
            protocol: wire.protocol,
            result: wire.result,
            timestamp_range: wire.timestamp_range,
        }
    }
}

#[derive(Deserialize)]
struct DeleteRequest {
    reqid: String,
}

async fn traffic(
    State(ctx): State<AgentContext>,
    Json(filter): Json<FilterWire>,
) -> Result<Json<serde_json::Value>, RpcError> {
    let records = ctx.results().records(&filter.into()).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!(records)))
}

async fn count(
    State(ctx): State<AgentContext>,
    Json(filter): Json<FilterWire>,
) -> Result<Json<serde_json::Value>, RpcError> {
    let records = ctx.results().records(&filter.into()).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"count": records.len()})))
}

async fn latency_stat(
    State(ctx): State<AgentContext>,
    Json(filter): Json<FilterWire>,
) -> Result<Json<serde_json::Value>, RpcError> {
    let stats = ctx.results().stats(&filter.into()).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({
        "count": stats.count,
        "avg_latency": stats.avg_latency,
        "min_latency": stats.min_latency,
        "max_latency": stats.max_latency,
        "pass_percent": stats.pass_percent(),
        "fail_percent": stats.fail_percent(),
    })))
}

async fn delete_record(
    State(ctx): State<AgentContext>,
    Json(body): Json<DeleteRequest>,
) -> Result<Json<serde_json::Value>, RpcError> {
    let deleted = ctx.results().delete_by_reqid(&body.reqid).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"deleted": deleted})))
}
