//! Podium: the multi-host traffic orchestrator (§4.11).
//!
//! Fans every cross-process operation out to the agents owning the
//! relevant hosts over the same RPC surface the agents expose to each
//! other, combining per-host results the way §4.11.1 specifies.

pub mod error;
pub mod latency;
pub mod orchestrator;

pub use error::PodiumError;
pub use latency::{combine_latencies, CombinedLatency, HostLatency};
pub use orchestrator::{CombinedStats, Podium};

/// `NODE_PREP_MAX_THREAD`: default bound on parallel per-host operations.
pub const DEFAULT_MAX_THREADS: usize = 32;

/// `HOST_WAIT_TIME`: default time to wait for a newly-added host's RPC port.
pub const DEFAULT_HOST_WAIT_TIME_SECS: u64 = 60;
