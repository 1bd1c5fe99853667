//! Error catalog for the traffic client/server/task layer (§7.1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation timed out")]
    Timeout,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("namespace entry failed: {0}")]
    NamespaceEntry(#[from] crate::namespace::NamespaceError),
}
