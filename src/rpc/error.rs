//! Maps domain errors onto HTTP status codes for the RPC handlers.

use axum::http::StatusCode;
use axum::Json;

pub type RpcError = (StatusCode, Json<serde_json::Value>);

pub fn internal_error(err: impl std::fmt::Display) -> RpcError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() })))
}

pub fn not_found(err: impl std::fmt::Display) -> RpcError {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": err.to_string() })))
}

pub fn bad_request(err: impl std::fmt::Display) -> RpcError {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": err.to_string() })))
}
