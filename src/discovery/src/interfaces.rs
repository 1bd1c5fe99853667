//! Local interface enumeration.

use std::net::IpAddr;

use nix::ifaddrs::getifaddrs;
use nix::sys::socket::SockaddrLike;

use crate::error::DiscoveryError;

/// Interface name prefixes considered part of the managed namespace fabric
/// (`NAMESPACE_INTERFACE_NAME_PREFIXES`).
pub const NAMESPACE_INTERFACE_NAME_PREFIXES: &[&str] = &["veth", "eth", "vmk"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub name: String,
    pub ip: IpAddr,
}

/// Enumerates every interface visible in the current network namespace.
///
/// Must be called after any `setns` into a target namespace to see that
/// namespace's interfaces rather than the caller's own.
pub fn enumerate_interfaces() -> Result<Vec<InterfaceAddr>, DiscoveryError> {
    let addrs = getifaddrs().map_err(DiscoveryError::InterfaceEnumeration)?;
    let mut result = Vec::new();
    for ifaddr in addrs {
        let Some(address) = ifaddr.address else {
            continue;
        };
        let ip = if let Some(sin) = address.as_sockaddr_in() {
            IpAddr::V4(std::net::Ipv4Addr::from(sin.ip()))
        } else if let Some(sin6) = address.as_sockaddr_in6() {
            IpAddr::V6(sin6.ip())
        } else {
            continue;
        };
        result.push(InterfaceAddr {
            name: ifaddr.interface_name,
            ip,
        });
    }
    Ok(result)
}

/// True if `name` matches one of the managed-fabric interface prefixes.
pub fn is_fabric_interface(name: &str) -> bool {
    NAMESPACE_INTERFACE_NAME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_fabric_interface_prefixes() {
        assert!(is_fabric_interface("veth1234"));
        assert!(is_fabric_interface("eth0"));
        assert!(is_fabric_interface("vmk0"));
        assert!(!is_fabric_interface("lo"));
    }

    #[test]
    fn enumerate_interfaces_includes_loopback() {
        let interfaces = enumerate_interfaces().expect("enumerate local interfaces");
        assert!(interfaces.iter().any(|i| i.ip.is_loopback()));
    }
}
