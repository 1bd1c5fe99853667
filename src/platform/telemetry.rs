//! Prometheus-text `/metrics` endpoint exposing the recorder's dropped-record
//! counters (§4.8.1) alongside basic process gauges.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::platform::config::ObservabilitySettings;
use crate::platform::context::AgentContext;
use crate::platform::service::ServiceRegistration;

pub fn telemetry_service(settings: ObservabilitySettings) -> ServiceRegistration {
    ServiceRegistration::new(
        "telemetry",
        Arc::new(move |ctx: AgentContext, token: CancellationToken| {
            let settings = settings.clone();
            tokio::spawn(async move {
                let outcome: Result<()> = async {
                    if !settings.enable_metrics {
                        return Ok(());
                    }

                    let app = Router::new().route("/metrics", get(metrics_handler)).with_state(ctx);
                    let addr = SocketAddr::from(([0, 0, 0, 0], settings.metrics_port));
                    let shutdown = token.clone();

                    let listener = tokio::net::TcpListener::bind(addr).await?;
                    info!(port = settings.metrics_port, "telemetry server started");

                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            shutdown.cancelled().await;
                            info!("shutting down telemetry server");
                        })
                        .await?;

                    Ok(())
                }
                .await;

                outcome
            })
        }),
    )
}

async fn metrics_handler(State(ctx): State<AgentContext>) -> String {
    let recorder = ctx.recorder();
    format!(
        "# HELP lydian_dropped_traffic_records Traffic records dropped on a full queue\n\
         # TYPE lydian_dropped_traffic_records counter\n\
         lydian_dropped_traffic_records {}\n\
         # HELP lydian_dropped_resource_records Resource records dropped on a full queue\n\
         # TYPE lydian_dropped_resource_records counter\n\
         lydian_dropped_resource_records {}\n\
         # HELP lydian_resource_monitor_running Whether the resource monitor is sampling\n\
         # TYPE lydian_resource_monitor_running gauge\n\
         lydian_resource_monitor_running {}\n",
        recorder.dropped_traffic_records(),
        recorder.dropped_resource_records(),
        ctx.resource_monitor().is_running() as u8,
    )
}
