//! Interface and namespace discovery - endpoint→target resolution
//!
//! Enumerates the interfaces visible on the local host and inside every
//! network namespace under `/var/run/netns`, producing the endpoint (IP) to
//! `Target` map the traffic controller uses to decide whether a rule's
//! `src`/`dst` is local and, if so, which namespace it lives in.

pub mod endpoint_map;
pub mod error;
pub mod interfaces;
pub mod namespaces;

pub use endpoint_map::{discover_endpoints, EndpointMap};
pub use error::DiscoveryError;
pub use interfaces::{enumerate_interfaces, is_fabric_interface, InterfaceAddr};
pub use namespaces::enumerate_namespaces;
