//! `namespace` RPC namespace: network-namespace enumeration and interface
//! listing inside each namespace.
//!
//! Entering a namespace via `setns` affects the calling OS thread, so every
//! handler here runs its namespace work on a blocking thread (§5).

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use lydian_discovery::{enumerate_interfaces, enumerate_namespaces};
use lydian_traffic::namespace::NamespaceGuard;

use crate::platform::context::AgentContext;
use crate::rpc::error::{internal_error, not_found, RpcError};

pub fn router() -> Router<AgentContext> {
    Router::new()
        .route("/", get(list_namespaces))
        .route("/ips", get(list_namespaces_ips))
        .route("/:name", get(get_namespace))
        .route("/discover", post(discover_namespaces))
}

async fn list_namespaces() -> Result<Json<serde_json::Value>, RpcError> {
    let names = tokio::task::spawn_blocking(enumerate_namespaces)
        .await
        .expect("namespace enumeration task panicked")
        .map_err(internal_error)?;
    Ok(Json(serde_json::json!(names)))
}

async fn get_namespace(Path(name): Path<String>) -> Result<Json<serde_json::Value>, RpcError> {
    let names = tokio::task::spawn_blocking(enumerate_namespaces)
        .await
        .expect("namespace enumeration task panicked")
        .map_err(internal_error)?;

    if names.contains(&name) {
        Ok(Json(serde_json::json!({"name": name})))
    } else {
        Err(not_found(format!("namespace {name} not found")))
    }
}

async fn list_namespaces_ips() -> Result<Json<serde_json::Value>, RpcError> {
    let map = tokio::task::spawn_blocking(namespace_ip_map)
        .await
        .expect("namespace enumeration task panicked")
        .map_err(internal_error)?;
    Ok(Json(serde_json::json!(map)))
}

fn namespace_ip_map() -> Result<HashMap<String, Vec<String>>, lydian_discovery::DiscoveryError> {
    let mut map = HashMap::new();
    for name in enumerate_namespaces()? {
        let guard = match NamespaceGuard::enter(&name) {
            Ok(guard) => guard,
            Err(err) => {
                tracing::warn!("skipping namespace {name} while listing ips: {err}");
                continue;
            }
        };
        if let Ok(interfaces) = enumerate_interfaces() {
            map.insert(name, interfaces.into_iter().map(|iface| iface.ip.to_string()).collect());
        }
        drop(guard);
    }
    Ok(map)
}

/// Forces a fresh controller-level interface/namespace rediscovery, then
/// returns the refreshed namespace list.
async fn discover_namespaces(
    State(ctx): State<AgentContext>,
) -> Result<Json<serde_json::Value>, RpcError> {
    ctx.controller().discover_interfaces().await.map_err(internal_error)?;
    let names = tokio::task::spawn_blocking(enumerate_namespaces)
        .await
        .expect("namespace enumeration task panicked")
        .map_err(internal_error)?;
    Ok(Json(serde_json::json!(names)))
}
