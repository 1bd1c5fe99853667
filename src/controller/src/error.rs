//! Error catalog for the traffic controller and its managers (§7.1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("rule error: {0}")]
    Rules(#[from] lydian_rules::RulesError),
    #[error("discovery error: {0}")]
    Discovery(#[from] lydian_discovery::DiscoveryError),
    #[error("neither endpoint of rule {ruleid} resolves to a local host")]
    NoLocalEndpoint { ruleid: String },
    #[error("task error: {0}")]
    Task(#[from] lydian_traffic::TaskError),
}
