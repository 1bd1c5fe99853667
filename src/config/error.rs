//! Error catalog for the dynamic config store (§7.1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config file line: {0}")]
    ParseError(String),
    #[error("unknown config value type: {0}")]
    UnknownType(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
