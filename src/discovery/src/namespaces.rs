//! Network-namespace enumeration (`/var/run/netns`, as populated by `ip netns add`).

use std::path::Path;

use crate::error::DiscoveryError;
use lydian_traffic::namespace::NETNS_RUN_DIR;

/// Lists the names of every namespace handle under `/var/run/netns`.
///
/// Returns an empty list, rather than an error, when the directory does not
/// exist - namespace support is optional infrastructure, not a precondition.
pub fn enumerate_namespaces() -> Result<Vec<String>, DiscoveryError> {
    let dir = Path::new(NETNS_RUN_DIR);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(DiscoveryError::NamespaceEnumeration)? {
        let entry = entry.map_err(DiscoveryError::NamespaceEnumeration)?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_netns_dir_yields_empty_list() {
        // This test environment has no /var/run/netns in the general case;
        // the function must not error either way.
        let result = enumerate_namespaces();
        assert!(result.is_ok());
    }
}
