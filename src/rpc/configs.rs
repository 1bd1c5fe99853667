//! `configs` RPC namespace: typed get/set over the dynamic config store (§4.7).

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ConfigValue;
use crate::platform::context::AgentContext;
use crate::rpc::error::{bad_request, not_found, RpcError};

pub fn router() -> Router<AgentContext> {
    Router::new().route("/:name", get(get_param).post(set_param))
}

#[derive(Deserialize)]
struct SetParamBody {
    value: Value,
    #[serde(default)]
    persist: bool,
}

async fn get_param(
    State(ctx): State<AgentContext>,
    Path(name): Path<String>,
) -> Result<Json<Value>, RpcError> {
    match ctx.config_store().get_param(&name).await {
        Some(value) => Ok(Json(config_value_to_json(&value))),
        None => Err(not_found(format!("param {name} not found"))),
    }
}

async fn set_param(
    State(ctx): State<AgentContext>,
    Path(name): Path<String>,
    Json(body): Json<SetParamBody>,
) -> Result<Json<Value>, RpcError> {
    let value = config_value_from_json(&body.value).map_err(bad_request)?;
    ctx.config_store()
        .set_param(&name, value, body.persist)
        .await
        .map_err(bad_request)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

fn config_value_to_json(value: &ConfigValue) -> Value {
    match value {
        ConfigValue::Int(i) => Value::from(*i),
        ConfigValue::Float(f) => Value::from(*f),
        ConfigValue::Bool(b) => Value::from(*b),
        ConfigValue::Str(s) => Value::from(s.clone()),
        ConfigValue::List(items) => Value::from(items.clone()),
        ConfigValue::None => Value::Null,
    }
}

fn config_value_from_json(value: &Value) -> Result<ConfigValue, String> {
    Ok(match value {
        Value::Null => ConfigValue::None,
        Value::Bool(b) => ConfigValue::Bool(*b),
        Value::Number(n) if n.is_i64() => ConfigValue::Int(n.as_i64().unwrap()),
        Value::Number(n) => ConfigValue::Float(n.as_f64().ok_or("invalid number")?),
        Value::String(s) => ConfigValue::Str(s.clone()),
        Value::Array(items) => ConfigValue::List(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(format!("list entries must be strings, got {other}")),
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(_) => return Err("object values are not supported".to_string()),
    })
}
