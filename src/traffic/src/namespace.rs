//! Network-namespace entry as a scoped RAII resource (§4.3.1).
//!
//! Resolves the original's generator-based `_ns_task_helper` context manager
//! into an explicit acquire/release guard: entering saves the caller's own
//! `/proc/self/ns/net` fd, `setns`s into the target namespace, and restores
//! the saved fd on `Drop` regardless of how the scope is exited.

use std::os::fd::{AsRawFd, OwnedFd};
use std::path::PathBuf;

use nix::fcntl::{open, OFlag};
use nix::sched::{setns, CloneFlags};
use nix::sys::stat::Mode;

/// Directory `ip netns` populates named namespace handles under.
pub const NETNS_RUN_DIR: &str = "/var/run/netns";

#[derive(Debug, thiserror::Error)]
pub enum NamespaceError {
    #[error("failed to open namespace handle at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
    #[error("setns failed: {0}")]
    SetNs(#[source] nix::Error),
}

/// Holds the caller's original namespace fd and restores it on drop.
///
/// A no-op guard (never entering any other namespace) is used for `VMHost`
/// targets, so the task layer can treat every target uniformly.
pub struct NamespaceGuard {
    restore_fd: Option<OwnedFd>,
}

impl NamespaceGuard {
    /// Enters the named network namespace, saving the current one for restore.
    pub fn enter(name: &str) -> Result<Self, NamespaceError> {
        let current_path = PathBuf::from("/proc/self/ns/net");
        let current_fd = open(&current_path, OFlag::O_RDONLY, Mode::empty()).map_err(|e| {
            NamespaceError::Open {
                path: current_path.clone(),
                source: e,
            }
        })?;

        let target_path = PathBuf::from(NETNS_RUN_DIR).join(name);
        let target_fd = open(&target_path, OFlag::O_RDONLY, Mode::empty()).map_err(|e| {
            NamespaceError::Open {
                path: target_path.clone(),
                source: e,
            }
        })?;

        setns(target_fd.as_raw_fd(), CloneFlags::CLONE_NEWNET).map_err(NamespaceError::SetNs)?;

        Ok(Self {
            restore_fd: Some(current_fd),
        })
    }

    /// A guard that does nothing on drop: the task stays in the caller's
    /// (default / VMHost) namespace for its whole lifetime.
    pub fn stay() -> Self {
        Self { restore_fd: None }
    }
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.restore_fd.take() {
            if let Err(err) = setns(fd.as_raw_fd(), CloneFlags::CLONE_NEWNET) {
                tracing::error!("failed to restore network namespace on drop: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stay_guard_holds_no_fd() {
        let guard = NamespaceGuard::stay();
        assert!(guard.restore_fd.is_none());
        drop(guard);
    }
}
