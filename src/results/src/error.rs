//! Error catalog for results query/aggregation (§7.1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
