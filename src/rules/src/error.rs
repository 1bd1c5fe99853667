//! Error catalog for the rules store (§7.1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("rule not found: {0}")]
    NotFound(String),
    #[error("failed to (de)serialize rule: {0}")]
    Serde(#[from] serde_json::Error),
}
