//! Registries owning the running client/server tasks (§4.4).
//!
//! `ClientManager` is keyed 1:1 on `ruleid`. `ServerManager` is keyed on
//! `(target name, protocol, port)` and is shared 1:N across every rule whose
//! `dst_target` resolves to that key, so two rules probing the same
//! destination port reuse a single listening server. A server is never
//! stopped when an individual client rule stops or is unregistered - a
//! later rule may reuse it - only `ServerManager::close` tears servers down.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::warn;

use lydian_traffic::task::{ClientTask, RecordSink, ServerTask};
use lydian_traffic::types::{Protocol, Target, TrafficRule};

/// Bound for `Close()`'s join wait (`THREADS_JOIN_TIMEOUT`).
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

type ServerKey = (String, Protocol, u16);

#[derive(Default)]
pub struct ClientManager {
    tasks: Mutex<HashMap<String, ClientTask>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and, if `rule` is ACTIVE, starts a task for `rule.ruleid`.
    /// Re-adding an existing ruleid logs a warning and replaces the task,
    /// matching `AddTask`'s "duplicate add is a warning" contract.
    pub async fn add_task(&self, rule: TrafficRule, sink: std::sync::Arc<dyn RecordSink>) {
        let ruleid = rule.ruleid.clone();
        let enabled = rule.enabled();
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&ruleid) {
            warn!("client task for rule {ruleid} already exists, replacing");
        }
        if enabled {
            let task = ClientTask::spawn(rule, sink);
            tasks.insert(ruleid, task);
        }
    }

    pub async fn start(&self, rule: TrafficRule, sink: std::sync::Arc<dyn RecordSink>) {
        self.stop(&rule.ruleid).await;
        let ruleid = rule.ruleid.clone();
        let task = ClientTask::spawn(rule, sink);
        self.tasks.lock().await.insert(ruleid, task);
    }

    pub async fn stop(&self, ruleid: &str) {
        let task = self.tasks.lock().await.remove(ruleid);
        if let Some(task) = task {
            if let Err(err) = task.close(DEFAULT_JOIN_TIMEOUT).await {
                warn!("client task {ruleid} did not stop cleanly: {err}");
            }
        }
    }

    pub async fn is_running(&self, ruleid: &str) -> bool {
        self.tasks.lock().await.contains_key(ruleid)
    }

    pub async fn running_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Stops and discards every managed task.
    pub async fn close(&self) {
        let tasks: Vec<(String, ClientTask)> = self.tasks.lock().await.drain().collect();
        for (ruleid, task) in tasks {
            if let Err(err) = task.close(DEFAULT_JOIN_TIMEOUT).await {
                warn!("client task {ruleid} did not stop cleanly: {err}");
            }
        }
    }
}

#[derive(Default)]
pub struct ServerManager {
    servers: Mutex<HashMap<ServerKey, ServerTask>>,
}

impl ServerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding a task whose key already exists is a no-op success; the
    /// server keeps running and is shared by the new rule as well. Servers
    /// are never torn down here - other rules still might need them - only
    /// `close` stops a server.
    pub async fn add_task(&self, target: Target, protocol: Protocol, port: u16) {
        let key = (target.name().to_string(), protocol, port);
        let mut servers = self.servers.lock().await;
        if servers.contains_key(&key) {
            return;
        }
        let task = ServerTask::spawn(target, protocol, port);
        servers.insert(key, task);
    }

    pub async fn running_count(&self) -> usize {
        self.servers.lock().await.len()
    }

    pub async fn close(&self) {
        let servers: Vec<(ServerKey, ServerTask)> = self.servers.lock().await.drain().collect();
        for ((name, _, port), task) in servers {
            if let Err(err) = task.close(DEFAULT_JOIN_TIMEOUT).await {
                warn!("server task for {name}:{port} did not stop cleanly: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydian_traffic::task::NullSink;
    use lydian_traffic::types::RuleState;

    fn sample_rule(id: &str) -> TrafficRule {
        TrafficRule {
            ruleid: id.into(),
            reqid: "req".into(),
            src: "127.0.0.1".into(),
            dst: "127.0.0.1".into(),
            protocol: Protocol::Tcp,
            port: 19998,
            connected: false,
            payload: "hi".into(),
            tries: Some(1),
            attempts: 1,
            frequency: None,
            interval: Some(0.05),
            state: RuleState::Active,
            src_host: None,
            dst_host: None,
            src_target: None,
            dst_target: None,
            tool: None,
        }
    }

    #[tokio::test]
    async fn client_manager_replaces_task_on_restart() {
        let manager = ClientManager::new();
        let sink: std::sync::Arc<dyn RecordSink> = std::sync::Arc::new(NullSink);
        manager.start(sample_rule("r1"), sink.clone()).await;
        assert!(manager.is_running("r1").await);
        manager.start(sample_rule("r1"), sink).await;
        assert_eq!(manager.running_count().await, 1);
        manager.close().await;
        assert_eq!(manager.running_count().await, 0);
    }

    #[tokio::test]
    async fn server_manager_shares_one_server_across_rules() {
        let manager = ServerManager::new();
        let target = Target::VMHost {
            name: "host-a".into(),
            ip: "127.0.0.1".into(),
        };
        manager.add_task(target.clone(), Protocol::Tcp, 19467).await;
        manager.add_task(target.clone(), Protocol::Tcp, 19467).await;
        assert_eq!(manager.running_count().await, 1);

        // Only `close` stops a server; nothing short of it tears one down.
        manager.close().await;
        assert_eq!(manager.running_count().await, 0);
    }
}
