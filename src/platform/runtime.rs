//! Boot sequence and graceful shutdown for the `lydian-agent` binary.
//!
//! Wires every layer in the init order fixed by §9 / crate dependency graph:
//! config → stores → managers/controller → recorder → RPC server. This
//! mirrors the reference codebase's `Platform`/`PlatformRuntime` split: a
//! builder (`AgentPlatform`) that consumes settings and produces a running
//! `AgentRuntime` holding every spawned service's join handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use lydian_controller::TrafficController;
use lydian_recorder::{
    ElasticsearchSink, RecordingPipeline, ResourceMonitor, ResourceSink, SqliteSink, TrafficSink,
    WavefrontSink,
};
use lydian_results::ResultsQuery;
use lydian_rules::RulesStore;
use lydian_traffic::task::RecordSink;

use crate::config::{ConfigStore, ConfigValue};
use crate::platform::config::LydianSettings;
use crate::platform::context::AgentContext;
use crate::platform::service::ServiceRegistration;
use crate::platform::telemetry::telemetry_service;
use crate::rpc::rpc_service;

pub struct AgentPlatform {
    settings: LydianSettings,
    services: Vec<ServiceRegistration>,
}

impl AgentPlatform {
    pub fn new(settings: LydianSettings) -> Self {
        let services = vec![telemetry_service(settings.observability.clone())];
        Self { settings, services }
    }

    pub fn register_service(&mut self, service: ServiceRegistration) {
        self.services.push(service);
    }

    pub async fn start(self) -> Result<AgentRuntime> {
        initialize_logging(&self.settings);

        let db_dir = PathBuf::from(&self.settings.service.db_dir);
        tokio::fs::create_dir_all(&db_dir).await?;

        let config_store = Arc::new(
            ConfigStore::open(
                db_dir.join("params.db"),
                Some(PathBuf::from(&self.settings.service.config_file)),
            )
            .await?,
        );

        let rules = Arc::new(RulesStore::open(db_dir.join("rules.db").to_str().unwrap()).await?);

        let traffic_pool = SqlitePoolOptions::new()
            .connect(&format!("sqlite://{}?mode=rwc", db_dir.join("traffic.db").display()))
            .await?;

        let traffic_sinks = build_traffic_sinks(&config_store, traffic_pool.clone()).await?;
        let resource_sinks: Vec<Arc<dyn ResourceSink>> = Vec::new();
        let recorder = Arc::new(RecordingPipeline::start(traffic_sinks, resource_sinks));

        let sink: Arc<dyn RecordSink> = Arc::new(recorder.traffic_sink_handle());
        let controller = Arc::new(
            TrafficController::new(rules.clone(), sink, self.settings.service.host_name.clone()).await?,
        );

        let resource_monitor = Arc::new(ResourceMonitor::new());
        resource_monitor.start(recorder.clone(), lydian_recorder::DEFAULT_SAMPLE_INTERVAL).await;

        let results = Arc::new(ResultsQuery::new(traffic_pool));

        let root_token = CancellationToken::new();
        let context = AgentContext::new(
            self.settings.clone(),
            config_store,
            rules,
            controller,
            recorder.clone(),
            resource_monitor,
            results,
            root_token.child_token(),
        );

        let mut tasks = Vec::new();
        let mut services = self.services;
        services.push(rpc_service(self.settings.service.port));

        for service in services {
            let handle = service.spawn(context.clone(), root_token.child_token());
            tasks.push((service.name().to_string(), handle));
        }

        info!(port = self.settings.service.port, "lydian agent boot completed");

        Ok(AgentRuntime { context, cancel_token: root_token, tasks, recorder })
    }
}

pub struct AgentRuntime {
    context: AgentContext,
    cancel_token: CancellationToken,
    tasks: Vec<(String, JoinHandle<Result<()>>)>,
    recorder: Arc<RecordingPipeline>,
}

impl AgentRuntime {
    pub fn context(&self) -> AgentContext {
        self.context.clone()
    }

    pub async fn shutdown(self) -> Result<()> {
        self.cancel_token.cancel();

        for (name, handle) in self.tasks {
            match handle.await {
                Ok(Ok(())) => info!(service = %name, "service shutdown cleanly"),
                Ok(Err(err)) => return Err(err),
                Err(err) => return Err(err.into()),
            }
        }

        self.context.controller().close().await;
        self.context.resource_monitor().stop().await;

        match Arc::try_unwrap(self.recorder) {
            Ok(pipeline) => pipeline.close(Duration::from_secs(5)).await,
            Err(shared) => {
                warn!(
                    refs = Arc::strong_count(&shared),
                    "recorder pipeline still referenced at shutdown, skipping graceful drain"
                );
            }
        }

        self.context.rules().close().await;
        self.context.config_store().close().await;

        Ok(())
    }
}

fn initialize_logging(settings: &LydianSettings) {
    let filter = &settings.observability.log_level;
    let _ = tracing_subscriber::fmt().with_env_filter(filter.as_str()).try_init();
}

async fn build_traffic_sinks(
    config: &ConfigStore,
    pool: sqlx::SqlitePool,
) -> Result<Vec<Arc<dyn TrafficSink>>> {
    let mut sinks: Vec<Arc<dyn TrafficSink>> = Vec::new();

    if config_bool(config, "SQLITE_TRAFFIC_RECORDING", true).await {
        sinks.push(Arc::new(SqliteSink::new(pool).await?));
    }

    if config_bool(config, "WAVEFRONT_TRAFFIC_RECORDING", false).await {
        let host = config_str(config, "WAVEFRONT_PROXY_HOST", "").await;
        if !host.is_empty() {
            let port = config_int(config, "WAVEFRONT_PROXY_PORT", 2878).await as u16;
            let prefix = config_str(config, "WAVEFRONT_METRIC_PREFIX", "lydian.traffic").await;
            sinks.push(Arc::new(WavefrontSink::new(host, port, prefix)));
        }
    }

    if config_bool(config, "ELASTICSEARCH_TRAFFIC_RECORDING", false).await {
        let host = config_str(config, "ELASTICSEARCH_HOST", "").await;
        if !host.is_empty() {
            let index = config_str(config, "ELASTICSEARCH_INDEX", "lydian-traffic").await;
            sinks.push(Arc::new(ElasticsearchSink::new(host, index)));
        }
    }

    Ok(sinks)
}

async fn config_bool(config: &ConfigStore, name: &str, default: bool) -> bool {
    match config.get_param(name).await {
        Some(ConfigValue::Bool(b)) => b,
        _ => default,
    }
}

async fn config_str(config: &ConfigStore, name: &str, default: &str) -> String {
    match config.get_param(name).await {
        Some(ConfigValue::Str(s)) => s,
        _ => default.to_string(),
    }
}

async fn config_int(config: &ConfigStore, name: &str, default: i64) -> i64 {
    match config.get_param(name).await {
        Some(ConfigValue::Int(i)) => i,
        _ => default,
    }
}
