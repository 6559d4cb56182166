//! Typed errors for the pipeline
//!
//! Expected failures (not found, conflicts, authorization) never travel as
//! errors: they are [`Outcome::Failure`](crate::core::Outcome) values. The
//! types here cover the remaining cases.
//!
//! - [`StoreError`]: raised by persistence collaborators
//! - [`ExecutionError`]: what a core action may fail with inside the pipeline
//! - [`PipelineError`]: the only errors allowed past the service boundary
//! - [`QueryError`]: malformed list parameters
//! - [`PolicyError`]: unreadable policy strings in configuration

use thiserror::Error;

/// Errors raised by an [`EntityStore`](crate::core::EntityStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency check failed on save
    #[error("the row was modified or deleted by another writer")]
    Concurrency,

    /// Error reported by the database engine with its native error code
    #[error("database error {code}: {message}")]
    Database { code: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a core action inside the pipeline
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("operation cancelled")]
    Cancelled,

    /// Caller/integration bug, propagated instead of converted to a status
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Errors that cross the service boundary instead of becoming an outcome
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The cancellation token fired before the action completed
    #[error("operation cancelled")]
    Cancelled,

    /// The request violates a usage contract (programming error)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors produced while parsing list parameters
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("filter is not valid JSON: {0}")]
    MalformedFilter(String),

    #[error("filter must be a JSON object")]
    FilterNotObject,

    #[error("unsupported operand for '{field}'")]
    UnsupportedOperand { field: String },

    #[error("invalid sort direction '{direction}' for '{field}'")]
    InvalidSortDirection { field: String, direction: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unknown policy '{0}'")]
    Unknown(String),

    #[error("policy '{0}' names no role")]
    MissingRole(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Database {
            code: "547".to_string(),
            message: "conflict".to_string(),
        };
        assert_eq!(err.to_string(), "database error 547: conflict");
    }

    #[test]
    fn test_execution_error_from_store() {
        let err: ExecutionError = StoreError::Concurrency.into();
        assert!(matches!(err, ExecutionError::Store(StoreError::Concurrency)));
    }

    #[test]
    fn test_execution_error_from_anyhow() {
        let err: ExecutionError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, ExecutionError::Unexpected(_)));
    }

    #[test]
    fn test_query_error_display() {
        let err = QueryError::InvalidSortDirection {
            field: "total".to_string(),
            direction: "up".to_string(),
        };
        assert_eq!(err.to_string(), "invalid sort direction 'up' for 'total'");
    }
}
