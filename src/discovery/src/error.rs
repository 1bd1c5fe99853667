//! Error catalog for interface/namespace discovery (§7.1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to enumerate interfaces: {0}")]
    InterfaceEnumeration(#[source] nix::Error),
    #[error("failed to enumerate namespaces: {0}")]
    NamespaceEnumeration(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
