//! Operation results returned by every service action
//!
//! An [`Outcome`] is either a typed success value or a [`Problem`] carrying an
//! HTTP-equivalent status code. The optional `source` error is kept for
//! server-side diagnostics only and is never rendered to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Failure half of an [`Outcome`]
#[derive(Clone)]
pub struct Problem {
    status: StatusCode,
    detail: Option<String>,
    source: Option<Arc<anyhow::Error>>,
}

impl Problem {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            detail: None,
            source: None,
        }
    }

    pub fn with_detail(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
            source: None,
        }
    }

    pub fn with_source(status: StatusCode, source: anyhow::Error) -> Self {
        Self {
            status,
            detail: None,
            source: Some(Arc::new(source)),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Human-readable problem description, safe to show to callers
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Underlying error, for logging only
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.source.as_deref()
    }
}

impl fmt::Debug for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Problem")
            .field("status", &self.status)
            .field("detail", &self.detail)
            .field("source", &self.source.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl PartialEq for Problem {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status && self.detail == other.detail
    }
}

/// Result of a service action
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(Problem),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Failure carrying only a status code
    pub fn status(status: StatusCode) -> Self {
        Outcome::Failure(Problem::new(status))
    }

    pub fn failure(status: StatusCode, detail: impl Into<String>) -> Self {
        Outcome::Failure(Problem::with_detail(status, detail))
    }

    pub fn not_found() -> Self {
        Self::status(StatusCode::NOT_FOUND)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::failure(StatusCode::CONFLICT, detail)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Status code this outcome renders as (200 for successes)
    pub fn status_code(&self) -> StatusCode {
        match self {
            Outcome::Success(_) => StatusCode::OK,
            Outcome::Failure(problem) => problem.status(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn problem(&self) -> Option<&Problem> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(problem) => Some(problem),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(problem) => Outcome::Failure(problem),
        }
    }

    pub fn into_result(self) -> Result<T, Problem> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(problem) => Err(problem),
        }
    }
}

impl<T> From<Problem> for Outcome<T> {
    fn from(problem: Problem) -> Self {
        Outcome::Failure(problem)
    }
}

/// Problem body rendered for failed outcomes
#[derive(Debug, Serialize)]
pub struct ProblemResponse {
    pub status: u16,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&Problem> for ProblemResponse {
    fn from(problem: &Problem) -> Self {
        Self {
            status: problem.status.as_u16(),
            title: problem
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            detail: problem.detail.clone(),
        }
    }
}

impl<T: Serialize> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        match self {
            Outcome::Success(value) => (StatusCode::OK, Json(value)).into_response(),
            Outcome::Failure(problem) => {
                let body = Json(ProblemResponse::from(&problem));
                (problem.status, body).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_accessors() {
        let outcome = Outcome::success(5);
        assert!(outcome.is_success());
        assert_eq!(outcome.status_code(), StatusCode::OK);
        assert_eq!(outcome.value(), Some(&5));
        assert!(outcome.problem().is_none());
    }

    #[test]
    fn test_failure_accessors() {
        let outcome: Outcome<i32> = Outcome::conflict("The entity was modified.");
        assert!(!outcome.is_success());
        assert_eq!(outcome.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            outcome.problem().and_then(Problem::detail),
            Some("The entity was modified.")
        );
    }

    #[test]
    fn test_map_preserves_failure() {
        let outcome: Outcome<i32> = Outcome::not_found();
        let mapped = outcome.map(|v| v * 2);
        assert_eq!(mapped.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_problem_response_hides_source() {
        let problem = Problem::with_source(
            StatusCode::INTERNAL_SERVER_ERROR,
            anyhow::anyhow!("connection string leaked"),
        );
        let body = serde_json::to_value(ProblemResponse::from(&problem)).unwrap();
        assert_eq!(body["status"], 500);
        assert_eq!(body["title"], "Internal Server Error");
        assert!(body.get("detail").is_none());
        assert!(!body.to_string().contains("connection string"));
    }

    #[test]
    fn test_into_response_status() {
        let response = Outcome::<()>::status(StatusCode::FORBIDDEN).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = Outcome::success(vec![1, 2]).into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
