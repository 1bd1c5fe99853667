//! Endpoint (IP) to `Target` resolution, rebuilt whenever interfaces change.
//!
//! Entering a namespace via `setns` affects the calling OS thread, so this
//! whole rebuild is synchronous and meant to be run on a blocking thread
//! (`tokio::task::spawn_blocking`) rather than the async executor.

use std::collections::HashMap;
use std::net::IpAddr;

use lydian_traffic::namespace::NamespaceGuard;
use lydian_traffic::Target;

use crate::error::DiscoveryError;
use crate::interfaces::enumerate_interfaces;
use crate::namespaces::enumerate_namespaces;

#[derive(Debug, Default, Clone)]
pub struct EndpointMap {
    entries: HashMap<IpAddr, Target>,
}

impl EndpointMap {
    pub fn resolve(&self, ip: &str) -> Option<Target> {
        ip.parse::<IpAddr>().ok().and_then(|ip| self.entries.get(&ip).cloned())
    }

    pub fn is_local(&self, ip: &str) -> bool {
        self.resolve(ip).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Re-enumerates local interfaces and every network namespace, producing a
/// fresh endpoint→target map. `local_host_name` labels the `VMHost` entries.
pub fn discover_endpoints(local_host_name: &str) -> Result<EndpointMap, DiscoveryError> {
    let mut entries = HashMap::new();

    entries.insert(
        IpAddr::from([127, 0, 0, 1]),
        Target::VMHost {
            name: local_host_name.to_string(),
            ip: "127.0.0.1".to_string(),
        },
    );
    entries.insert(
        "::1".parse().unwrap(),
        Target::VMHost {
            name: local_host_name.to_string(),
            ip: "::1".to_string(),
        },
    );

    for iface in enumerate_interfaces()? {
        entries.insert(
            iface.ip,
            Target::VMHost {
                name: local_host_name.to_string(),
                ip: iface.ip.to_string(),
            },
        );
    }

    for ns_name in enumerate_namespaces()? {
        let guard = match NamespaceGuard::enter(&ns_name) {
            Ok(guard) => guard,
            Err(err) => {
                tracing::warn!("skipping namespace {ns_name} during discovery: {err}");
                continue;
            }
        };
        match enumerate_interfaces() {
            Ok(ifaces) => {
                for iface in ifaces {
                    entries.insert(
                        iface.ip,
                        Target::NSHost {
                            name: ns_name.clone(),
                            ip: iface.ip.to_string(),
                        },
                    );
                }
            }
            Err(err) => tracing::warn!("failed to enumerate interfaces in namespace {ns_name}: {err}"),
        }
        drop(guard);
    }

    Ok(EndpointMap { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_always_resolves_locally() {
        let map = discover_endpoints("test-host").unwrap();
        assert!(map.is_local("127.0.0.1"));
        assert!(map.is_local("::1"));
        assert!(!map.is_local("203.0.113.5"));
    }
}
