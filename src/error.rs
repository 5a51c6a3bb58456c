use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Report-boundary error taxonomy. Cache failures are deliberately absent:
/// the engine swallows them and falls through to full computation.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Malformed identity or parameter; a client error, never retried.
    #[error("invalid parameter: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage unavailable or a query failed.
    #[error("storage error: {0}")]
    DataAccess(#[from] sqlx::Error),

    /// Unexpected shape mid-pipeline; no partial report is returned.
    #[error("computation error: {0}")]
    Computation(String),
}
