//! Compiled-in config defaults (§3.1), grouped by category.
//!
//! This is the first layer of the three-way overlay a `ConfigStore` merges
//! at boot: defaults here, then the legacy config file, then whatever the
//! sqlite table last persisted.

use crate::config::store::ConfigValue;

/// One compiled default: name, value, and the category used to group the
/// regenerated config file (§4.7.1).
pub struct DefaultEntry {
    pub name: &'static str,
    pub value: ConfigValue,
    pub category: &'static str,
}

pub fn catalog() -> Vec<DefaultEntry> {
    use ConfigValue::*;
    vec![
        DefaultEntry { name: "LYDIAN_PORT", value: Int(5649), category: "Service" },
        DefaultEntry { name: "LYDIAN_DB_DIR", value: Str("/var/lydian/db".into()), category: "Service" },
        DefaultEntry { name: "LYDIAN_CONFIG", value: Str("/etc/lydian/lydian.conf".into()), category: "Service" },
        DefaultEntry { name: "THREADS_JOIN_TIMEOUT", value: Int(5), category: "Service" },
        DefaultEntry { name: "NODE_PREP_MAX_THREAD", value: Int(32), category: "Service" },
        DefaultEntry { name: "HOST_WAIT_TIME", value: Int(30), category: "Service" },
        DefaultEntry { name: "LOG_LEVEL", value: Str("INFO".into()), category: "Logging" },
        DefaultEntry { name: "LOG_DIR", value: Str("/var/log/lydian".into()), category: "Logging" },
        DefaultEntry { name: "SQLITE3_CONNECTION_TIMEOUT", value: Int(20), category: "Sqlite3" },
        DefaultEntry { name: "MAX_CONNS", value: Int(20), category: "Testbed" },
        DefaultEntry { name: "DEFAULT_TCP_SERVER_PORT", value: Int(5649), category: "Testbed" },
        DefaultEntry { name: "DEFAULT_UDP_SERVER_PORT", value: Int(5648), category: "Testbed" },
        DefaultEntry { name: "TCP_CLIENT_PAYLOAD", value: Str("Dinkirk".into()), category: "Testbed" },
        DefaultEntry { name: "MAX_PAYLOAD_SIZE", value: Int(4096), category: "Testbed" },
        DefaultEntry {
            name: "NAMESPACE_INTERFACE_NAME_PREFIXES",
            value: List(vec!["veth".into(), "eth".into(), "vmk".into()]),
            category: "Namespace",
        },
        DefaultEntry { name: "TRAFFIC_START_SERVERS_FIRST", value: Bool(true), category: "Traffic" },
        DefaultEntry { name: "TRAFFIC_STATS_QUERY_LATENCY", value: Int(15), category: "Traffic" },
        DefaultEntry { name: "RESOURCE_RECORD_REPORT_FREQ", value: Int(4), category: "Recorder" },
        DefaultEntry { name: "TRAFFIC_RECORD_REPORT_FREQ", value: Int(4), category: "Recorder" },
        DefaultEntry { name: "RECORD_QUEUE_MAXSIZE", value: Int(50_000), category: "Recorder" },
        DefaultEntry { name: "SQLITE_TRAFFIC_RECORDING", value: Bool(true), category: "Recorder" },
        DefaultEntry { name: "WAVEFRONT_TRAFFIC_RECORDING", value: Bool(true), category: "Wavefront" },
        DefaultEntry { name: "WAVEFRONT_PROXY_HOST", value: Str(String::new()), category: "Wavefront" },
        DefaultEntry { name: "WAVEFRONT_PROXY_PORT", value: Int(2878), category: "Wavefront" },
        DefaultEntry {
            name: "WAVEFRONT_METRIC_PREFIX",
            value: Str("lydian.traffic".into()),
            category: "Wavefront",
        },
        DefaultEntry { name: "ELASTICSEARCH_TRAFFIC_RECORDING", value: Bool(true), category: "ELS" },
        DefaultEntry { name: "ELASTICSEARCH_HOST", value: Str(String::new()), category: "ELS" },
        DefaultEntry { name: "ELASTICSEARCH_INDEX", value: Str("lydian-traffic".into()), category: "ELS" },
    ]
}
