//! `pcap`/`iperf` RPC namespaces: thin subprocess supervisors (§6).
//!
//! Out-of-core surfaces: spawn a child process, track its pid, and stop it
//! with `SIGTERM`. No output parsing or capture-file management is attempted.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::rpc::error::{internal_error, not_found, RpcError};

#[derive(Default)]
pub struct ProcessSupervisor {
    children: Mutex<HashMap<String, tokio::process::Child>>,
}

impl ProcessSupervisor {
    async fn spawn(&self, handle: String, mut command: Command) -> Result<u32, std::io::Error> {
        let child = command.kill_on_drop(true).spawn()?;
        let pid = child.id().unwrap_or(0);
        self.children.lock().await.insert(handle, child);
        Ok(pid)
    }

    async fn stop(&self, handle: &str) -> Result<(), String> {
        let mut children = self.children.lock().await;
        let Some(child) = children.remove(handle) else {
            return Err(format!("no running process for handle {handle}"));
        };
        if let Some(pid) = child.id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        Ok(())
    }
}

pub fn pcap_router() -> Router<Arc<ProcessSupervisor>> {
    Router::new()
        .route("/start", post(start_pcap))
        .route("/:handle/stop", post(stop_process))
}

pub fn iperf_router() -> Router<Arc<ProcessSupervisor>> {
    Router::new()
        .route("/start", post(start_iperf))
        .route("/:handle/stop", post(stop_process))
}

#[derive(Deserialize)]
struct PcapRequest {
    handle: String,
    interface: String,
    #[serde(default)]
    filter: Option<String>,
}

async fn start_pcap(
    State(supervisor): State<Arc<ProcessSupervisor>>,
    Json(body): Json<PcapRequest>,
) -> Result<Json<serde_json::Value>, RpcError> {
    let mut command = Command::new("tcpdump");
    command.arg("-i").arg(&body.interface);
    if let Some(filter) = &body.filter {
        command.arg(filter);
    }
    let pid = supervisor.spawn(body.handle, command).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"pid": pid})))
}

#[derive(Deserialize)]
struct IperfRequest {
    handle: String,
    #[serde(default)]
    server: bool,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    port: Option<u16>,
}

async fn start_iperf(
    State(supervisor): State<Arc<ProcessSupervisor>>,
    Json(body): Json<IperfRequest>,
) -> Result<Json<serde_json::Value>, RpcError> {
    let mut command = Command::new("iperf3");
    if body.server {
        command.arg("-s");
    } else {
        let target = body.target.as_deref().unwrap_or("127.0.0.1");
        command.arg("-c").arg(target);
    }
    if let Some(port) = body.port {
        command.arg("-p").arg(port.to_string());
    }
    let pid = supervisor.spawn(body.handle, command).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"pid": pid})))
}

async fn stop_process(
    State(supervisor): State<Arc<ProcessSupervisor>>,
    Path(handle): Path<String>,
) -> Result<Json<serde_json::Value>, RpcError> {
    supervisor.stop(&handle).await.map_err(not_found)?;
    Ok(Json(serde_json::json!({"ok": true})))
}
