//! Values threaded through the request side of the handler chain
//!
//! Both result types are immutable: every transform consumes the value and
//! returns a new one.

use crate::core::query::Query;
use axum::http::StatusCode;
use std::fmt;
use std::sync::Arc;

/// Composable row filter over an entity query
pub struct RowFilter<E> {
    steps: Vec<Arc<dyn Fn(Query<E>) -> Query<E> + Send + Sync>>,
}

impl<E> Clone for RowFilter<E> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<E> Default for RowFilter<E> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<E> fmt::Debug for RowFilter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowFilter")
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl<E> RowFilter<E> {
    pub fn identity() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// Compose `next` after the existing steps
    pub fn then(mut self, next: impl Fn(Query<E>) -> Query<E> + Send + Sync + 'static) -> Self {
        self.steps.push(Arc::new(next));
        self
    }

    /// Apply every step in insertion order
    pub fn apply(&self, query: Query<E>) -> Query<E> {
        self.steps.iter().fold(query, |query, step| step(query))
    }
}

/// Request-side authorization state for actions that touch persistence
pub struct Authorization<P, E> {
    status: StatusCode,
    values: P,
    filter: RowFilter<E>,
}

impl<P: Clone, E> Clone for Authorization<P, E> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            values: self.values.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<P: fmt::Debug, E> fmt::Debug for Authorization<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("status", &self.status)
            .field("values", &self.values)
            .field("filter", &self.filter)
            .finish()
    }
}

impl<P, E> Authorization<P, E> {
    /// Seed value: OK status, identity filter
    pub fn new(values: P) -> Self {
        Self {
            status: StatusCode::OK,
            values,
            filter: RowFilter::identity(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn values(&self) -> &P {
        &self.values
    }

    pub fn into_values(self) -> P {
        self.values
    }

    pub fn filter(&self) -> &RowFilter<E> {
        &self.filter
    }

    /// Replace the status.
    ///
    /// A failed status is sticky: asking for `200 OK` on an already failed
    /// result keeps the failure.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        if status == StatusCode::OK && !self.is_ok() {
            return self;
        }
        self.status = status;
        self
    }

    /// Narrow the row filter; `next` runs after every filter added so far
    pub fn with_filter(
        mut self,
        next: impl Fn(Query<E>) -> Query<E> + Send + Sync + 'static,
    ) -> Self {
        self.filter = self.filter.then(next);
        self
    }

    pub fn with_values(self, values: P) -> Self {
        Self { values, ..self }
    }

    pub fn map_values<Q>(self, f: impl FnOnce(P) -> Q) -> Authorization<Q, E> {
        Authorization {
            status: self.status,
            values: f(self.values),
            filter: self.filter,
        }
    }

    /// Apply the accumulated row filter to `query`
    pub fn apply(&self, query: Query<E>) -> Query<E> {
        self.filter.apply(query)
    }

    /// Split into the filter and the values, keeping the filter usable after the values move
    pub fn into_parts(self) -> (RowFilter<E>, P) {
        (self.filter, self.values)
    }
}

/// Request-side authorization state for actions that never touch persistence
#[derive(Debug, Clone)]
pub struct AuthorizationWithoutStore<P> {
    status: StatusCode,
    values: P,
}

impl<P> AuthorizationWithoutStore<P> {
    pub fn new(values: P) -> Self {
        Self {
            status: StatusCode::OK,
            values,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn values(&self) -> &P {
        &self.values
    }

    pub fn into_values(self) -> P {
        self.values
    }

    /// Replace the status; a failed status is never reset to `200 OK`
    pub fn with_status(mut self, status: StatusCode) -> Self {
        if status == StatusCode::OK && !self.is_ok() {
            return self;
        }
        self.status = status;
        self
    }

    pub fn with_values(self, values: P) -> Self {
        Self { values, ..self }
    }
}
