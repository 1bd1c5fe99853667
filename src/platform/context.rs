//! `AgentContext` bundles every shared component a service (RPC router,
//! resource monitor, telemetry endpoint) needs a handle to, behind one
//! cheaply-cloneable `Arc`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use lydian_controller::TrafficController;
use lydian_recorder::RecordingPipeline;
use lydian_recorder::ResourceMonitor;
use lydian_results::ResultsQuery;
use lydian_rules::RulesStore;

use crate::config::ConfigStore;
use crate::platform::config::LydianSettings;

#[derive(Clone)]
pub struct AgentContext {
    shared: Arc<SharedState>,
    shutdown: CancellationToken,
}

struct SharedState {
    settings: LydianSettings,
    config_store: Arc<ConfigStore>,
    rules: Arc<RulesStore>,
    controller: Arc<TrafficController>,
    recorder: Arc<RecordingPipeline>,
    resource_monitor: Arc<ResourceMonitor>,
    results: Arc<ResultsQuery>,
}

impl AgentContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        settings: LydianSettings,
        config_store: Arc<ConfigStore>,
        rules: Arc<RulesStore>,
        controller: Arc<TrafficController>,
        recorder: Arc<RecordingPipeline>,
        resource_monitor: Arc<ResourceMonitor>,
        results: Arc<ResultsQuery>,
        shutdown: CancellationToken,
    ) -> Self {
        let shared = SharedState {
            settings,
            config_store,
            rules,
            controller,
            recorder,
            resource_monitor,
            results,
        };

        Self { shared: Arc::new(shared), shutdown }
    }

    pub fn settings(&self) -> &LydianSettings {
        &self.shared.settings
    }

    pub fn config_store(&self) -> Arc<ConfigStore> {
        Arc::clone(&self.shared.config_store)
    }

    pub fn rules(&self) -> Arc<RulesStore> {
        Arc::clone(&self.shared.rules)
    }

    pub fn controller(&self) -> Arc<TrafficController> {
        Arc::clone(&self.shared.controller)
    }

    pub fn recorder(&self) -> Arc<RecordingPipeline> {
        Arc::clone(&self.shared.recorder)
    }

    pub fn resource_monitor(&self) -> Arc<ResourceMonitor> {
        Arc::clone(&self.shared.resource_monitor)
    }

    pub fn results(&self) -> Arc<ResultsQuery> {
        Arc::clone(&self.shared.results)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
