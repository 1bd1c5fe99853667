//! Traffic Fabric - probe clients, echo servers, and the tasks that run them
//!
//! This crate is the leaf of the workspace's dependency graph: it knows how
//! to speak the TCP/UDP/HTTP wire protocols a rule describes, how to run an
//! echo/status server for the other side of a rule, and how to keep either
//! one alive as a supervised task that honours a stop signal within a
//! bounded time. Every other crate in the workspace depends on this one for
//! its data model (`TrafficRule`, `TrafficRecord`, `Target`); this crate
//! depends on none of them.
//!
//! ## Key components
//!
//! - **types**: the shared data model - rules, records, targets, protocols
//! - **client**: single-probe execution for TCP/UDP/HTTP with latency capture
//! - **server**: echo/status servers for the same three protocols
//! - **connection**: the resettable stop-event clients and servers wait on
//! - **namespace**: RAII network-namespace entry for namespace-bound targets
//! - **task**: supervises one client or server as an async task or, for a
//!   namespace-bound target, a dedicated OS thread holding the namespace
//!   guard for its whole lifetime
//!
//! The registries that own running tasks (keyed by `ruleid` for clients,
//! `(target, protocol, port)` for shared servers) live in the controller
//! crate, one layer up.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod client;
pub mod connection;
pub mod error;
pub mod namespace;
pub mod server;
pub mod task;
pub mod types;

pub use client::{probe_once, ProbeOutcome};
pub use connection::StopEvent;
pub use error::TaskError;
pub use namespace::{NamespaceError, NamespaceGuard};
pub use server::run_server;
pub use task::{ClientTask, NullSink, RecordSink, ServerTask, TaskHandle};
pub use types::{
    Protocol, ResourceRecord, RuleState, Target, TrafficRecord, TrafficRule, TrafficRuleBuilder,
};

/// Crate version, surfaced over the `monitor` RPC namespace alongside the
/// platform's own build info.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
