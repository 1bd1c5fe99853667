//! Traffic controller: translates rules into local client/server tasks and
//! owns the resume-on-boot loop (§4.5).

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use lydian_discovery::{discover_endpoints, EndpointMap};
use lydian_rules::RulesStore;
use lydian_traffic::task::RecordSink;
use lydian_traffic::types::{RuleState, TrafficRule};

use crate::error::ControllerError;
use crate::manager::{ClientManager, ServerManager};

pub struct TrafficController {
    rules: Arc<RulesStore>,
    endpoint_map: RwLock<EndpointMap>,
    client_manager: ClientManager,
    server_manager: ServerManager,
    sink: Arc<dyn RecordSink>,
    local_host_name: String,
}

impl TrafficController {
    pub async fn new(
        rules: Arc<RulesStore>,
        sink: Arc<dyn RecordSink>,
        local_host_name: impl Into<String>,
    ) -> Result<Self, ControllerError> {
        let local_host_name = local_host_name.into();
        let endpoint_map = discover_endpoint_map(local_host_name.clone()).await?;
        let controller = Self {
            rules,
            endpoint_map: RwLock::new(endpoint_map),
            client_manager: ClientManager::new(),
            server_manager: ServerManager::new(),
            sink,
            local_host_name,
        };
        controller.resume_from_store().await?;
        Ok(controller)
    }

    /// Re-enumerates interfaces and namespaces, rebuilding the
    /// endpoint→target map (used when a new interface appears).
    pub async fn discover_interfaces(&self) -> Result<(), ControllerError> {
        let fresh = discover_endpoint_map(self.local_host_name.clone()).await?;
        *self.endpoint_map.write().await = fresh;
        Ok(())
    }

    /// Resolves targets, fills derived fields, starts the appropriate local
    /// tasks, and persists each rule.
    pub async fn register_traffic(&self, rules: Vec<TrafficRule>) -> Result<(), ControllerError> {
        let resolved: Vec<TrafficRule> = {
            let map = self.endpoint_map.read().await;
            rules
                .into_iter()
                .filter_map(|rule| self.resolve_rule(&map, rule))
                .collect()
        };

        for rule in resolved {
            self.add_local_tasks(&rule).await;
            self.rules.add(rule).await?;
        }
        Ok(())
    }

    fn resolve_rule(&self, map: &EndpointMap, mut rule: TrafficRule) -> Option<TrafficRule> {
        let src_target = map.resolve(&rule.src);
        let dst_target = map.resolve(&rule.dst);
        if src_target.is_none() && dst_target.is_none() {
            error!("rule {} has no locally-resolvable endpoint, ignoring", rule.ruleid);
            return None;
        }
        rule.src_host = src_target.as_ref().map(|t| t.name().to_string());
        rule.dst_host = dst_target.as_ref().map(|t| t.name().to_string());
        rule.src_target = src_target;
        rule.dst_target = dst_target;
        rule.state = RuleState::Active;
        Some(rule)
    }

    async fn add_local_tasks(&self, rule: &TrafficRule) {
        if let Some(dst_target) = rule.dst_target.clone() {
            self.server_manager
                .add_task(dst_target, rule.protocol, rule.port)
                .await;
        }
        if rule.src_target.is_some() {
            self.client_manager
                .add_task(rule.clone(), self.sink.clone())
                .await;
        }
    }

    /// Flips state to ACTIVE and (re)starts the client task for every id,
    /// fanning out in parallel.
    pub async fn start(&self, ruleids: &[String]) -> Result<(), ControllerError> {
        let futures = ruleids.iter().map(|ruleid| self.start_one(ruleid));
        for result in join_all(futures).await {
            result?;
        }
        Ok(())
    }

    async fn start_one(&self, ruleid: &str) -> Result<(), ControllerError> {
        self.rules.enable(ruleid).await?;
        if let Some(rule) = self.rules.get(ruleid).await {
            if rule.src_target.is_some() {
                self.client_manager.start(rule, self.sink.clone()).await;
            }
        }
        Ok(())
    }

    pub async fn stop(&self, ruleids: &[String]) -> Result<(), ControllerError> {
        let futures = ruleids.iter().map(|ruleid| self.stop_one(ruleid));
        for result in join_all(futures).await {
            result?;
        }
        Ok(())
    }

    async fn stop_one(&self, ruleid: &str) -> Result<(), ControllerError> {
        self.rules.disable(ruleid).await?;
        self.client_manager.stop(ruleid).await;
        Ok(())
    }

    /// Stops each client task then deletes the rule. Any shared server the
    /// rule's `dst_target` resolved to is left running - a later rule may
    /// still reuse it - and only stops via `close`.
    pub async fn unregister_traffic(&self, ruleids: &[String]) -> Result<(), ControllerError> {
        self.stop(ruleids).await?;
        for ruleid in ruleids {
            self.rules.delete_by_ruleid(ruleid).await?;
        }
        Ok(())
    }

    /// Scans the rules store for ACTIVE rules, re-resolves targets, and
    /// re-adds tasks. A rule whose endpoints no longer resolve locally is
    /// left in the store but inert.
    async fn resume_from_store(&self) -> Result<(), ControllerError> {
        let active = self.rules.active_rules().await;
        let resolved: Vec<TrafficRule> = {
            let map = self.endpoint_map.read().await;
            active
                .into_iter()
                .filter_map(|mut rule| {
                    let src_target = map.resolve(&rule.src);
                    let dst_target = map.resolve(&rule.dst);
                    if src_target.is_none() && dst_target.is_none() {
                        warn!("rule {} no longer resolves locally, leaving inert", rule.ruleid);
                        return None;
                    }
                    rule.src_host = src_target.as_ref().map(|t| t.name().to_string());
                    rule.dst_host = dst_target.as_ref().map(|t| t.name().to_string());
                    rule.src_target = src_target;
                    rule.dst_target = dst_target;
                    Some(rule)
                })
                .collect()
        };

        for rule in resolved {
            self.add_local_tasks(&rule).await;
            info!("resumed rule {} on boot", rule.ruleid);
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.client_manager.close().await;
        self.server_manager.close().await;
    }
}

async fn discover_endpoint_map(local_host_name: String) -> Result<EndpointMap, ControllerError> {
    tokio::task::spawn_blocking(move || discover_endpoints(&local_host_name))
        .await
        .expect("discovery task panicked")
        .map_err(ControllerError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydian_traffic::task::NullSink;
    use lydian_traffic::types::{Protocol, RuleState, TrafficRuleBuilder};

    async fn fresh_controller() -> (TrafficController, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("rules.db");
        let rules = Arc::new(RulesStore::open(db_path.to_str().unwrap()).await.unwrap());
        let sink: Arc<dyn RecordSink> = Arc::new(NullSink);
        let controller = TrafficController::new(rules, sink, "test-host").await.unwrap();
        (controller, dir)
    }

    fn loopback_rule(ruleid: &str, reqid: &str) -> TrafficRule {
        TrafficRuleBuilder::new(ruleid, reqid)
            .src("127.0.0.1")
            .dst("127.0.0.1")
            .protocol(Protocol::Tcp)
            .port(19966)
            .tries(1)
            .build()
    }

    #[tokio::test]
    async fn register_start_stop_unregister_round_trip() {
        let (controller, _dir) = fresh_controller().await;

        controller
            .register_traffic(vec![loopback_rule("r1", "req1")])
            .await
            .unwrap();
        assert_eq!(controller.client_manager.running_count().await, 1);
        assert_eq!(controller.server_manager.running_count().await, 1);

        controller.stop(&["r1".to_string()]).await.unwrap();
        assert_eq!(controller.client_manager.running_count().await, 0);

        controller.start(&["r1".to_string()]).await.unwrap();
        assert_eq!(controller.client_manager.running_count().await, 1);

        controller.unregister_traffic(&["r1".to_string()]).await.unwrap();
        assert_eq!(controller.client_manager.running_count().await, 0);
        // A later rule might reuse this port; the server stays up until close().
        assert_eq!(controller.server_manager.running_count().await, 1);
        assert!(controller.rules.get("r1").await.is_none());

        controller.close().await;
    }

    #[tokio::test]
    async fn register_traffic_ignores_rule_with_no_local_endpoint() {
        let (controller, _dir) = fresh_controller().await;

        let mut rule = loopback_rule("r2", "req2");
        rule.src = "203.0.113.5".into();
        rule.dst = "203.0.113.6".into();
        controller.register_traffic(vec![rule]).await.unwrap();

        assert_eq!(controller.client_manager.running_count().await, 0);
        assert_eq!(controller.server_manager.running_count().await, 0);
        assert!(controller.rules.get("r2").await.is_none());

        controller.close().await;
    }

    #[tokio::test]
    async fn resume_from_store_restarts_active_rules_on_boot() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("rules.db");

        {
            let rules = Arc::new(RulesStore::open(db_path.to_str().unwrap()).await.unwrap());
            let sink: Arc<dyn RecordSink> = Arc::new(NullSink);
            let controller = TrafficController::new(rules, sink, "test-host").await.unwrap();
            controller
                .register_traffic(vec![loopback_rule("r3", "req3")])
                .await
                .unwrap();
            controller.close().await;
        }

        let rules = Arc::new(RulesStore::open(db_path.to_str().unwrap()).await.unwrap());
        let sink: Arc<dyn RecordSink> = Arc::new(NullSink);
        let controller = TrafficController::new(rules, sink, "test-host").await.unwrap();

        let rule = controller.rules.get("r3").await.unwrap();
        assert_eq!(rule.state, RuleState::Active);
        assert_eq!(controller.server_manager.running_count().await, 1);

        controller.close().await;
    }
}
