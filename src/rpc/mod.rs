//! RPC surface (§6): one `axum` route group per namespace, wired onto the
//! shared [`AgentContext`]. Method names mirror the reference RPC surface
//! for wire compatibility with existing clients.

pub mod configs;
pub mod controller;
pub mod error;
pub mod interface;
pub mod monitor;
pub mod namespace;
pub mod process;
pub mod results;
pub mod rules;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::platform::context::AgentContext;
use crate::platform::service::ServiceRegistration;
use crate::rpc::process::ProcessSupervisor;

pub fn router(ctx: AgentContext) -> Router {
    let supervisor = Arc::new(ProcessSupervisor::default());

    let agent_routes = Router::new()
        .nest("/controller", controller::router())
        .nest("/rules", rules::router())
        .nest("/results", results::router())
        .nest("/configs", configs::router())
        .nest("/monitor", monitor::router())
        .nest("/interface", interface::router())
        .nest("/namespace", namespace::router())
        .with_state(ctx);

    let process_routes = Router::new()
        .nest("/pcap", process::pcap_router())
        .nest("/iperf", process::iperf_router())
        .with_state(supervisor);

    agent_routes.merge(process_routes)
}

pub fn rpc_service(port: u16) -> ServiceRegistration {
    ServiceRegistration::new(
        "rpc",
        Arc::new(move |ctx: AgentContext, token: CancellationToken| {
            tokio::spawn(async move {
                let outcome: Result<()> = async {
                    let app = router(ctx);
                    let addr = SocketAddr::from(([0, 0, 0, 0], port));
                    let listener = tokio::net::TcpListener::bind(addr).await?;
                    info!(port, "rpc server listening");

                    let shutdown = token.clone();
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            shutdown.cancelled().await;
                            info!("shutting down rpc server");
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
