//! Error catalog for the Podium orchestrator (§7.1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PodiumError {
    #[error("rpc call to {host} failed: {source}")]
    Rpc {
        host: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("host {host} did not become reachable within the wait window")]
    HostUnreachable { host: String },
    #[error("rules error: {0}")]
    Rules(#[from] lydian_rules::RulesError),
}
