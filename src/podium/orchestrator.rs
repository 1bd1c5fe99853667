//! Podium: the multi-host orchestrator (§4.11).
//!
//! Fans operations out to every involved agent in parallel, bounded by a
//! semaphore sized to `NODE_PREP_MAX_THREAD`. Keeps its own rules cache
//! (mirroring what each agent was told to register) so reqid-scoped
//! operations don't need a round trip just to discover which hosts are
//! involved.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use lydian_rules::RulesStore;
use lydian_traffic::{Protocol, TrafficRecord, TrafficRule, TrafficRuleBuilder};

use crate::podium::error::PodiumError;
use crate::podium::latency::{combine_latencies, CombinedLatency, HostLatency};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CombinedStats {
    pub count: i64,
    pub pass_count: i64,
    pub fail_count: i64,
}

impl CombinedStats {
    pub fn pass_percent(&self) -> f64 {
        if self.count == 0 { 0.0 } else { (self.pass_count as f64 / self.count as f64) * 100.0 }
    }

    pub fn fail_percent(&self) -> f64 {
        if self.count == 0 { 0.0 } else { (self.fail_count as f64 / self.count as f64) * 100.0 }
    }
}

#[derive(serde::Deserialize)]
struct LatencyStatResponse {
    count: i64,
    avg_latency: f64,
    min_latency: f64,
    max_latency: f64,
}

pub struct Podium {
    ep_hosts: RwLock<HashMap<String, String>>,
    rules: RulesStore,
    client: reqwest::Client,
    semaphore: Semaphore,
    agent_port: u16,
    host_wait_time: Duration,
}

impl Podium {
    pub async fn open(
        db_path: &str,
        agent_port: u16,
        max_threads: usize,
        host_wait_time: Duration,
    ) -> Result<Self, PodiumError> {
        let rules = RulesStore::open(db_path).await?;
        Ok(Self {
            ep_hosts: RwLock::new(HashMap::new()),
            rules,
            client: reqwest::Client::new(),
            semaphore: Semaphore::new(max_threads.max(1)),
            agent_port,
            host_wait_time,
        })
    }

    fn base_url(&self, mgmt_ip: &str) -> String {
        format!("http://{mgmt_ip}:{}", self.agent_port)
    }

    /// Waits for the agent's RPC port to answer, then primes its endpoint
    /// map and records it under `endpoint_ip` (§4.11 `AddHost`).
    ///
    /// Node provisioning (copying the agent binary, installing the service)
    /// is an SSH/infrastructure concern outside this crate's scope; callers
    /// are expected to have the agent already running at `mgmt_ip`.
    pub async fn add_host(
        &self,
        endpoint_ip: impl Into<String>,
        mgmt_ip: impl Into<String>,
    ) -> Result<(), PodiumError> {
        let mgmt_ip = mgmt_ip.into();
        let endpoint_ip = endpoint_ip.into();

        self.wait_for_host(&mgmt_ip).await?;

        self.client
            .post(format!("{}/controller/discover_interfaces", self.base_url(&mgmt_ip)))
            .send()
            .await
            .map_err(|source| PodiumError::Rpc { host: mgmt_ip.clone(), source })?;

        self.ep_hosts.write().await.insert(endpoint_ip, mgmt_ip);
        Ok(())
    }

    /// Parallel multi-host form of `add_host`, bounded by the thread pool.
    /// Keyed by `mgmt_ip`: one host's failure never blocks the others
    /// (§7 "Podium aggregates a {host -> result} map").
    pub async fn add_hosts(&self, hosts: Vec<(String, String)>) -> HashMap<String, Result<(), PodiumError>> {
        let futures = hosts.into_iter().map(|(endpoint_ip, mgmt_ip)| async move {
            let _permit = self.semaphore.acquire().await.expect("semaphore closed");
            let result = self.add_host(endpoint_ip, mgmt_ip.clone()).await;
            (mgmt_ip, result)
        });
        join_all(futures).await.into_iter().collect()
    }

    async fn wait_for_host(&self, mgmt_ip: &str) -> Result<(), PodiumError> {
        let deadline = Instant::now() + self.host_wait_time;
        let url = format!("{}/monitor/is_running", self.base_url(mgmt_ip));
        loop {
            if self.client.post(&url).send().await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PodiumError::HostUnreachable { host: mgmt_ip.to_string() });
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    /// Purges `endpoint_ips` from the host map. Uninstalling the remote
    /// service is an infrastructure concern; see `add_host`.
    pub async fn cleanup_hosts(&self, endpoint_ips: &[String]) {
        let mut ep_hosts = self.ep_hosts.write().await;
        for ip in endpoint_ips {
            ep_hosts.remove(ip);
        }
    }

    /// Groups `rules` by destination (servers) and source (clients) host,
    /// honoring `servers_first` ordering, then persists to the local cache.
    /// The per-host RPC outcome map is returned as-is (§7): one host's
    /// failure to register never blocks any other host's registration or
    /// the local persist.
    pub async fn register_traffic(
        &self,
        rules: Vec<TrafficRule>,
        servers_first: bool,
    ) -> Result<HashMap<String, Result<(), PodiumError>>, PodiumError> {
        let ep_hosts = self.ep_hosts.read().await.clone();
        let mut by_dst: HashMap<String, Vec<TrafficRule>> = HashMap::new();
        let mut by_src: HashMap<String, Vec<TrafficRule>> = HashMap::new();

        for rule in &rules {
            if let Some(mgmt) = ep_hosts.get(&rule.dst) {
                by_dst.entry(mgmt.clone()).or_default().push(rule.clone());
            }
            if let Some(mgmt) = ep_hosts.get(&rule.src) {
                by_src.entry(mgmt.clone()).or_default().push(rule.clone());
            }
        }

        let mut outcomes = HashMap::new();
        if servers_first {
            outcomes.extend(self.fan_out_register(&by_dst).await);
            outcomes.extend(self.fan_out_register(&by_src).await);
        } else {
            let mut merged = by_dst;
            for (mgmt, rules) in by_src {
                merged.entry(mgmt).or_default().extend(rules);
            }
            outcomes.extend(self.fan_out_register(&merged).await);
        }

        self.rules.add_all(rules).await?;
        Ok(outcomes)
    }

    async fn fan_out_register(
        &self,
        groups: &HashMap<String, Vec<TrafficRule>>,
    ) -> HashMap<String, Result<(), PodiumError>> {
        let futures = groups.iter().map(|(mgmt, rules)| {
            let url = format!("{}/controller/register_traffic", self.base_url(mgmt));
            let client = self.client.clone();
            let rules = rules.clone();
            let host = mgmt.clone();
            async move {
                let result = client
                    .post(url)
                    .json(&rules)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|source| PodiumError::Rpc { host: host.clone(), source });
                (host, result)
            }
        });
        join_all(futures).await.into_iter().collect()
    }

    pub async fn start_traffic(&self, reqid: &str) -> HashMap<String, Result<(), PodiumError>> {
        self.fan_out_by_src_ruleids(reqid, "start").await
    }

    pub async fn stop_traffic(&self, reqid: &str) -> HashMap<String, Result<(), PodiumError>> {
        self.fan_out_by_src_ruleids(reqid, "stop").await
    }

    pub async fn unregister_traffic(
        &self,
        reqid: &str,
    ) -> Result<HashMap<String, Result<(), PodiumError>>, PodiumError> {
        let outcomes = self.fan_out_by_src_ruleids(reqid, "unregister_traffic").await;
        self.rules.delete_by_reqid(reqid).await?;
        Ok(outcomes)
    }

    /// Fans `action` out to every src host holding rules for `reqid`,
    /// keyed by `mgmt_ip`. A host unreachable for this reqid simply carries
    /// an `Err` in its slot; every other host is still attempted (§7).
    async fn fan_out_by_src_ruleids(&self, reqid: &str, action: &str) -> HashMap<String, Result<(), PodiumError>> {
        let rules = self.rules.rules_for_reqid(reqid).await;
        let ep_hosts = self.ep_hosts.read().await.clone();

        let mut by_src: HashMap<String, Vec<String>> = HashMap::new();
        for rule in rules {
            if let Some(mgmt) = ep_hosts.get(&rule.src) {
                by_src.entry(mgmt.clone()).or_default().push(rule.ruleid);
            }
        }

        let futures = by_src.into_iter().map(|(mgmt, ruleids)| {
            let url = format!("{}/controller/{action}", self.base_url(&mgmt));
            let client = self.client.clone();
            async move {
                let result = client
                    .post(url)
                    .json(&serde_json::json!({ "ruleids": ruleids }))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|source| PodiumError::Rpc { host: mgmt.clone(), source });
                (mgmt, result)
            }
        });
        join_all(futures).await.into_iter().collect()
    }

    async fn src_hosts_for_reqid(&self, reqid: &str) -> Vec<String> {
        let rules = self.rules.rules_for_reqid(reqid).await;
        let ep_hosts = self.ep_hosts.read().await;
        let mut hosts: Vec<String> = rules.iter().filter_map(|r| ep_hosts.get(&r.src).cloned()).collect();
        hosts.sort();
        hosts.dedup();
        hosts
    }

    /// Queries every src host holding rules for `reqid` in parallel and
    /// concatenates the records. A host that errors contributes nothing;
    /// every other host is still collected (§7 "other hosts still
    /// processed").
    pub async fn get_results(&self, reqid: &str) -> Vec<TrafficRecord> {
        let hosts = self.src_hosts_for_reqid(reqid).await;
        let futures = hosts.into_iter().map(|mgmt| {
            let url = format!("{}/results/traffic", self.base_url(&mgmt));
            let client = self.client.clone();
            let reqid = reqid.to_string();
            async move {
                let response = client
                    .post(url)
                    .json(&serde_json::json!({ "reqid": reqid }))
                    .send()
                    .await
                    .map_err(|source| PodiumError::Rpc { host: mgmt.clone(), source })?;
                response
                    .json::<Vec<TrafficRecord>>()
                    .await
                    .map_err(|source| PodiumError::Rpc { host: mgmt, source })
            }
        });

        let mut all = Vec::new();
        for result in join_all(futures).await {
            match result {
                Ok(records) => all.extend(records),
                Err(err) => warn!("skipping unreachable host while collecting results: {err}"),
            }
        }
        all
    }

    pub async fn get_traffic_stats(&self, reqid: &str) -> CombinedStats {
        let records = self.get_results(reqid).await;
        let pass_count = records.iter().filter(|r| r.result).count() as i64;
        let count = records.len() as i64;
        CombinedStats { count, pass_count, fail_count: count - pass_count }
    }

    /// Fans out to each src host's latency aggregate and combines per
    /// §4.11.1. `None` if no involved host returned samples. A host that
    /// errors contributes nothing rather than failing the whole query.
    pub async fn get_latency(&self, reqid: &str) -> Option<CombinedLatency> {
        let hosts = self.src_hosts_for_reqid(reqid).await;
        let futures = hosts.into_iter().map(|mgmt| {
            let url = format!("{}/results/latency_stat", self.base_url(&mgmt));
            let client = self.client.clone();
            let reqid = reqid.to_string();
            async move {
                let response = client
                    .post(url)
                    .json(&serde_json::json!({ "reqid": reqid }))
                    .send()
                    .await
                    .map_err(|source| PodiumError::Rpc { host: mgmt.clone(), source })?;
                response
                    .json::<LatencyStatResponse>()
                    .await
                    .map_err(|source| PodiumError::Rpc { host: mgmt, source })
            }
        });

        let mut per_host = Vec::new();
        for result in join_all(futures).await {
            match result {
                Ok(stat) => per_host.push(HostLatency {
                    count: stat.count,
                    avg: stat.avg_latency,
                    min: stat.min_latency,
                    max: stat.max_latency,
                }),
                Err(err) => warn!("skipping unreachable host while collecting latency: {err}"),
            }
        }
        combine_latencies(&per_host)
    }

    /// Generates N×(N-1) intents across `hosts` under one shared reqid,
    /// registers them servers-first, and starts probing immediately.
    pub async fn run_mesh_ping(&self, hosts: &[String], port: u16, protocol: Protocol) -> Result<String, PodiumError> {
        let reqid = format!("mesh-{}", Uuid::new_v4());
        let mut rules = Vec::new();
        for src in hosts {
            for dst in hosts {
                if src == dst {
                    continue;
                }
                let ruleid = format!("{reqid}-{src}-{dst}");
                rules.push(
                    TrafficRuleBuilder::new(ruleid, reqid.clone())
                        .src(src.clone())
                        .dst(dst.clone())
                        .protocol(protocol)
                        .port(port)
                        .build(),
                );
            }
        }

        self.register_traffic(rules, true).await?;
        self.start_traffic(&reqid).await;
        Ok(reqid)
    }

    pub async fn close(&self) {
        self.rules.close().await;
    }
}
