//! Conversion of execution errors into outcomes

use crate::authorization::handler::Action;
use crate::core::error::{ExecutionError, PipelineError, StoreError};
use crate::core::outcome::{Outcome, Problem};
use axum::http::StatusCode;
use regex::Regex;
use std::sync::LazyLock;

/// Native error codes of foreign-key violations (SQL Server, PostgreSQL)
const FOREIGN_KEY_CODES: &[&str] = &["547", "23503"];

static MISSING_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:conflict occurred in database "[^"]*", table|is not present in table) "(?P<table>[^"]+)""#)
        .expect("static pattern")
});

static CONSTRAINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)foreign key constraint "(?P<name>[^"]+)""#).expect("static pattern")
});

/// Convert a failed core action into an outcome.
///
/// Cancellation and request-contract violations are not outcomes; they are
/// handed back as [`PipelineError`].
pub(crate) fn into_outcome<T>(
    action: Action,
    error: ExecutionError,
) -> Result<Outcome<T>, PipelineError> {
    match error {
        ExecutionError::Cancelled => Err(PipelineError::Cancelled),
        ExecutionError::InvalidRequest(message) => Err(PipelineError::InvalidRequest(message)),
        ExecutionError::Store(StoreError::Concurrency) => Ok(Outcome::Failure(
            Problem::with_source(StatusCode::CONFLICT, StoreError::Concurrency.into()),
        )),
        ExecutionError::Store(StoreError::Database { code, message })
            if FOREIGN_KEY_CODES.contains(&code.as_str()) =>
        {
            match describe_foreign_key_violation(&message) {
                Some(detail) => Ok(Outcome::conflict(detail)),
                None => Ok(Outcome::Failure(Problem::with_source(
                    StatusCode::CONFLICT,
                    StoreError::Database { code, message }.into(),
                ))),
            }
        }
        other => Ok(unexpected(action, other.into())),
    }
}

/// Log an unexpected failure and hide it behind a bare 500
pub(crate) fn unexpected<T>(action: Action, error: anyhow::Error) -> Outcome<T> {
    tracing::error!(action = %action, error = ?error, "unhandled failure in service action");
    Outcome::Failure(Problem::with_source(StatusCode::INTERNAL_SERVER_ERROR, error))
}

/// Human-readable description of a foreign-key violation message
pub fn describe_foreign_key_violation(message: &str) -> Option<String> {
    if let Some(table) = MISSING_TABLE.captures(message).and_then(|c| c.name("table")) {
        return Some(format!(
            "Invalid relationship. '{}' was not found.",
            table.as_str()
        ));
    }
    CONSTRAINT
        .captures(message)
        .and_then(|c| c.name("name"))
        .map(|name| {
            format!(
                "Invalid relationship. The foreign key '{}' was violated.",
                name.as_str()
            )
        })
}
