//! `interface` RPC namespace: local interface enumeration.
//!
//! `getifaddrs` is a blocking syscall, so enumeration runs on a blocking
//! thread rather than the async executor (§5).

use std::collections::HashMap;

use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};

use lydian_discovery::enumerate_interfaces;

use crate::platform::context::AgentContext;
use crate::rpc::error::{internal_error, not_found, RpcError};

pub fn router() -> Router<AgentContext> {
    Router::new()
        .route("/", get(list_interfaces))
        .route("/ips", get(interface_ips_map))
        .route("/:name", get(get_interface))
}

async fn list_interfaces() -> Result<Json<serde_json::Value>, RpcError> {
    let interfaces = tokio::task::spawn_blocking(enumerate_interfaces)
        .await
        .expect("interface enumeration task panicked")
        .map_err(internal_error)?;

    let names: Vec<String> = interfaces.into_iter().map(|iface| iface.name).collect();
    Ok(Json(serde_json::json!(names)))
}

async fn get_interface(Path(name): Path<String>) -> Result<Json<serde_json::Value>, RpcError> {
    let interfaces = tokio::task::spawn_blocking(enumerate_interfaces)
        .await
        .expect("interface enumeration task panicked")
        .map_err(internal_error)?;

    match interfaces.into_iter().find(|iface| iface.name == name) {
        Some(iface) => Ok(Json(serde_json::json!({"name": iface.name, "ip": iface.ip.to_string()}))),
        None => Err(not_found(format!("interface {name} not found"))),
    }
}

async fn interface_ips_map() -> Result<Json<serde_json::Value>, RpcError> {
    let interfaces = tokio::task::spawn_blocking(enumerate_interfaces)
        .await
        .expect("interface enumeration task panicked")
        .map_err(internal_error)?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for iface in interfaces {
        map.entry(iface.name).or_default().push(iface.ip.to_string());
    }
    Ok(Json(serde_json::json!(map)))
}
