//! Data model shared across the traffic client, server, task and manager layers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default TCP server port (`lydian.common.consts.TestbedConstants.DEFAULT_TCP_SERVER_PORT`).
pub const DEFAULT_TCP_SERVER_PORT: u16 = 5649;
/// Default UDP server port.
pub const DEFAULT_UDP_SERVER_PORT: u16 = 5648;
/// Default payload used when a rule does not specify one.
pub const DEFAULT_PAYLOAD: &str = "Dinkirk";
/// Maximum payload size accepted/echoed by a server.
pub const MAX_PAYLOAD_SIZE: usize = 4096;
/// Cap on error strings stored in a TrafficRecord.
pub const MAX_ERROR_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "HTTP")]
    Http,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Http => write!(f, "HTTP"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            "HTTP" => Ok(Protocol::Http),
            other => Err(format!("unrecognized protocol: {other}")),
        }
    }
}

/// The ownership domain a probe endpoint lives in on a given host.
///
/// `name` is the key component used by `ServerManager` to dedupe servers;
/// `ip` is the host's own management address, used for namespace-agnostic
/// book-keeping (see `traffic_controller.py::_update_endpoints_map`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Target {
    VMHost { name: String, ip: String },
    NSHost { name: String, ip: String },
    ContainerHost { name: String, ip: String },
    WinHost { name: String, ip: String },
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Target::VMHost { name, .. }
            | Target::NSHost { name, .. }
            | Target::ContainerHost { name, .. }
            | Target::WinHost { name, .. } => name,
        }
    }

    pub fn ip(&self) -> &str {
        match self {
            Target::VMHost { ip, .. }
            | Target::NSHost { ip, .. }
            | Target::ContainerHost { ip, .. }
            | Target::WinHost { ip, .. } => ip,
        }
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self, Target::NSHost { .. })
    }

    pub fn is_vmhost(&self) -> bool {
        matches!(self, Target::VMHost { .. })
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Target::ContainerHost { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleState {
    Active,
    Inactive,
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleState::Active => write!(f, "ACTIVE"),
            RuleState::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// The central persisted entity: a directed probe description.
///
/// `src_target`/`dst_target`/`src_host`/`dst_host` are filled locally by the
/// agent's controller on ingest (`_add_rule_info` in the original), never by
/// the Podium or the wire payload that created the rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficRule {
    pub ruleid: String,
    pub reqid: String,
    pub src: String,
    pub dst: String,
    pub protocol: Protocol,
    pub port: u16,
    pub connected: bool,
    pub payload: String,
    pub tries: Option<u64>,
    pub attempts: u32,
    pub frequency: Option<u32>,
    pub interval: Option<f64>,
    pub state: RuleState,
    pub src_host: Option<String>,
    pub dst_host: Option<String>,
    pub src_target: Option<Target>,
    pub dst_target: Option<Target>,
    pub tool: Option<String>,
}

impl TrafficRule {
    /// `interval` in seconds between probes, resolving `frequency` per §4.1.
    pub fn effective_interval(&self) -> f64 {
        if let Some(interval) = self.interval {
            return interval;
        }
        let freq = self.frequency.unwrap_or(1).max(1);
        60.0 / freq as f64
    }

    pub fn enabled(&self) -> bool {
        self.state == RuleState::Active
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self.protocol, Protocol::Tcp)
    }

    pub fn is_udp(&self) -> bool {
        matches!(self.protocol, Protocol::Udp)
    }

    pub fn is_http(&self) -> bool {
        matches!(self.protocol, Protocol::Http)
    }

    pub fn external(&self) -> bool {
        self.tool.is_some()
    }

    /// The key a ServerManager dedupes on: `(target.name, protocol, port)`.
    pub fn server_key(&self) -> Option<(String, Protocol, u16)> {
        self.dst_target
            .as_ref()
            .map(|t| (t.name().to_string(), self.protocol, self.port))
    }
}

#[derive(Debug, Default, Clone)]
pub struct TrafficRuleBuilder {
    fields: HashMap<String, serde_json::Value>,
}

impl TrafficRuleBuilder {
    pub fn new(ruleid: impl Into<String>, reqid: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert("ruleid".into(), serde_json::Value::String(ruleid.into()));
        fields.insert("reqid".into(), serde_json::Value::String(reqid.into()));
        Self { fields }
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.fields
            .insert("src".into(), serde_json::Value::String(src.into()));
        self
    }

    pub fn dst(mut self, dst: impl Into<String>) -> Self {
        self.fields
            .insert("dst".into(), serde_json::Value::String(dst.into()));
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.fields
            .insert("protocol".into(), serde_json::to_value(protocol).unwrap());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.fields
            .insert("port".into(), serde_json::Value::from(port));
        self
    }

    pub fn connected(mut self, connected: bool) -> Self {
        self.fields
            .insert("connected".into(), serde_json::Value::Bool(connected));
        self
    }

    pub fn tries(mut self, tries: u64) -> Self {
        self.fields
            .insert("tries".into(), serde_json::Value::from(tries));
        self
    }

    /// Fills remaining fields from the compiled defaults, matching
    /// `lydian.traffic.core.TrafficRule.fill`.
    pub fn build(self) -> TrafficRule {
        let get_str = |k: &str, default: &str| -> String {
            self.fields
                .get(k)
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };
        TrafficRule {
            ruleid: get_str("ruleid", ""),
            reqid: get_str("reqid", ""),
            src: get_str("src", ""),
            dst: get_str("dst", ""),
            protocol: self
                .fields
                .get("protocol")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or(Protocol::Tcp),
            port: self
                .fields
                .get("port")
                .and_then(|v| v.as_u64())
                .unwrap_or(DEFAULT_TCP_SERVER_PORT as u64) as u16,
            connected: self
                .fields
                .get("connected")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
            payload: get_str("payload", DEFAULT_PAYLOAD),
            tries: self.fields.get("tries").and_then(|v| v.as_u64()),
            attempts: self
                .fields
                .get("attempts")
                .and_then(|v| v.as_u64())
                .unwrap_or(1) as u32,
            frequency: self
                .fields
                .get("frequency")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32),
            interval: self.fields.get("interval").and_then(|v| v.as_f64()),
            state: RuleState::Active,
            src_host: None,
            dst_host: None,
            src_target: None,
            dst_target: None,
            tool: self
                .fields
                .get("tool")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        }
    }
}

/// One probe outcome. Append-only: no primary key, never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrafficRecord {
    pub timestamp: i64,
    pub reqid: String,
    pub ruleid: String,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    pub port: i64,
    pub expected: bool,
    pub result: bool,
    pub latency: f64,
    pub error: String,
}

impl TrafficRecord {
    /// Truncates `error` to `MAX_ERROR_LEN` bytes at a char boundary.
    pub fn with_truncated_error(mut self) -> Self {
        if self.error.len() > MAX_ERROR_LEN {
            let mut end = MAX_ERROR_LEN;
            while !self.error.is_char_boundary(end) {
                end -= 1;
            }
            self.error.truncate(end);
        }
        self
    }
}

/// Periodic CPU/memory/connection-count sample, for system and agent process.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceRecord {
    pub timestamp: i64,
    pub system_cpu_percent: f64,
    pub system_mem_percent: f64,
    pub system_open_conns: i64,
    pub process_cpu_percent: f64,
    pub process_mem_percent: f64,
    pub process_open_conns: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_interval_prefers_explicit_interval() {
        let rule = TrafficRuleBuilder::new("r1", "req1")
            .src("127.0.0.1")
            .dst("127.0.0.1")
            .protocol(Protocol::Tcp)
            .port(9465)
            .build();
        assert_eq!(rule.effective_interval(), 60.0);

        let mut rule = rule;
        rule.frequency = Some(30);
        assert_eq!(rule.effective_interval(), 2.0);
        rule.interval = Some(5.0);
        assert_eq!(rule.effective_interval(), 5.0);
    }

    #[test]
    fn truncates_long_errors_on_char_boundary() {
        let record = TrafficRecord {
            timestamp: 0,
            reqid: "r".into(),
            ruleid: "r".into(),
            source: "a".into(),
            destination: "b".into(),
            protocol: "TCP".into(),
            port: 1,
            expected: true,
            result: true,
            latency: 0.0,
            error: "e".repeat(200),
        }
        .with_truncated_error();
        assert_eq!(record.error.len(), MAX_ERROR_LEN);
    }

    #[test]
    fn server_key_only_present_for_local_destination() {
        let mut rule = TrafficRuleBuilder::new("r1", "req1")
            .protocol(Protocol::Udp)
            .port(9)
            .build();
        assert!(rule.server_key().is_none());
        rule.dst_target = Some(Target::VMHost {
            name: "host-a".into(),
            ip: "10.0.0.1".into(),
        });
        assert_eq!(
            rule.server_key(),
            Some(("host-a".to_string(), Protocol::Udp, 9))
        );
    }
}
