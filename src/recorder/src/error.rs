//! Error catalog for the recording pipeline and its sinks (§7.1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("sink write failed: {0}")]
    Sink(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
