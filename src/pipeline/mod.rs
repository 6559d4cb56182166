//! Authorization-and-execution pipeline
//!
//! Every service action runs through [`Pipeline::run`]:
//!
//! 1. schema check (skipped once the schema was seen up to date)
//! 2. request fold: each handler replaces the [`Authorization`] in list order
//! 3. final status check: anything but `200 OK` ends the call
//! 4. the core action, with the accumulated row filter
//! 5. response fold: each handler replaces the [`Outcome`] in the same order
//!
//! Failures of the core action are converted by [`failure::into_outcome`].
//! Cancellation is checked before every handler and raced against every
//! suspension point.

pub mod failure;
pub mod state;

pub use failure::describe_foreign_key_violation;
pub use state::PipelineState;

use crate::authorization::handler::{CustomAuthorizationHandler, HandlerSet};
use crate::authorization::operation::Operation;
use crate::authorization::result::{Authorization, AuthorizationWithoutStore};
use crate::core::entity::{Dto, Entity};
use crate::core::error::{ExecutionError, PipelineError, StoreError};
use crate::core::outcome::{Outcome, Problem};
use crate::core::store::SchemaStatus;
use axum::http::StatusCode;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Await `future` unless `cancel` fires first
pub async fn guarded<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, ExecutionError> {
    if cancel.is_cancelled() {
        return Err(ExecutionError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
        output = future => Ok(output),
    }
}

/// Await a store call unless `cancel` fires first
pub async fn guarded_store<T, F>(cancel: &CancellationToken, future: F) -> Result<T, ExecutionError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    Ok(guarded(cancel, future).await??)
}

/// Runs service actions through the handler chain
#[derive(Clone)]
pub struct Pipeline {
    state: Arc<PipelineState>,
    schema: Arc<dyn SchemaStatus>,
    check_migrations: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("check_migrations", &self.check_migrations)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(state: Arc<PipelineState>, schema: Arc<dyn SchemaStatus>) -> Self {
        Self {
            state,
            schema,
            check_migrations: true,
        }
    }

    /// `false` skips the pending-migration precondition entirely
    pub fn with_migration_check(mut self, enabled: bool) -> Self {
        self.check_migrations = enabled;
        self
    }

    pub fn state(&self) -> &Arc<PipelineState> {
        &self.state
    }

    /// Run a generic action through the full pipeline
    pub async fn run<E, D, O, F, Fut>(
        &self,
        handlers: &HandlerSet<E, D>,
        params: O::Params,
        cancel: &CancellationToken,
        action: F,
    ) -> Result<Outcome<O::Output>, PipelineError>
    where
        E: Entity,
        D: Dto,
        O: Operation<E, D>,
        F: FnOnce(Authorization<O::Params, E>) -> Fut,
        Fut: Future<Output = Result<Outcome<O::Output>, ExecutionError>>,
    {
        if handlers.is_empty() {
            self.warn_unguarded::<E, D>();
        }
        let result = match self.ensure_schema(cancel).await {
            Ok(None) => {
                execute_with_authorization::<E, D, O, F, Fut>(handlers, params, cancel, action)
                    .await
            }
            Ok(Some(unavailable)) => Ok(unavailable),
            Err(err) => Err(err),
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => failure::into_outcome(O::ACTION, err),
        }
    }

    /// Run a custom, non-entity operation through its own handler chain
    pub async fn run_custom<P, T, F, Fut>(
        &self,
        operation: &str,
        handlers: &[Arc<dyn CustomAuthorizationHandler<P, T>>],
        params: P,
        cancel: &CancellationToken,
        action: F,
    ) -> Result<Outcome<T>, PipelineError>
    where
        P: Send + 'static,
        T: Send + 'static,
        F: FnOnce(AuthorizationWithoutStore<P>) -> Fut,
        Fut: Future<Output = Result<Outcome<T>, ExecutionError>>,
    {
        let result = match self.ensure_schema(cancel).await {
            Ok(None) => execute_custom(operation, handlers, params, cancel, action).await,
            Ok(Some(unavailable)) => Ok(unavailable),
            Err(err) => Err(err),
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(ExecutionError::Cancelled) => Err(PipelineError::Cancelled),
            Err(ExecutionError::InvalidRequest(message)) => {
                Err(PipelineError::InvalidRequest(message))
            }
            Err(err) => {
                tracing::error!(operation, error = ?err, "unhandled failure in custom operation");
                Ok(Outcome::Failure(Problem::with_source(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    err.into(),
                )))
            }
        }
    }

    /// `Ok(Some(_))` carries the 503 outcome when migrations are pending
    async fn ensure_schema<T>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Outcome<T>>, ExecutionError> {
        if !self.check_migrations || self.state.schema_ready() {
            return Ok(None);
        }
        let pending = guarded_store(cancel, self.schema.pending_migrations()).await?;
        if pending.is_empty() {
            self.state.mark_schema_ready();
            tracing::info!("database schema is up to date");
            return Ok(None);
        }
        let names = pending.join(", ");
        tracing::warn!(pending = %names, "rejecting request, migrations are pending");
        Ok(Some(Outcome::failure(StatusCode::SERVICE_UNAVAILABLE, names)))
    }

    fn warn_unguarded<E: Entity, D: Dto>(&self) {
        let combination = format!("{}/{}", E::resource_name(), std::any::type_name::<D>());
        if self.state.note_missing_handlers(&combination) {
            tracing::warn!(
                entity = E::resource_name(),
                dto = std::any::type_name::<D>(),
                "no authorization handler configured, requests are not authorized"
            );
        }
    }
}

/// Fold the request through the handlers, run the action, fold the response
pub async fn execute_with_authorization<E, D, O, F, Fut>(
    handlers: &HandlerSet<E, D>,
    params: O::Params,
    cancel: &CancellationToken,
    action: F,
) -> Result<Outcome<O::Output>, ExecutionError>
where
    E: Entity,
    D: Dto,
    O: Operation<E, D>,
    F: FnOnce(Authorization<O::Params, E>) -> Fut,
    Fut: Future<Output = Result<Outcome<O::Output>, ExecutionError>>,
{
    let mut authorization = Authorization::new(params);
    for (position, handler) in handlers.iter().enumerate() {
        authorization = guarded(cancel, O::authorize(handler.as_ref(), authorization, cancel)).await?;
        tracing::debug!(
            action = %O::ACTION,
            handler = position,
            status = %authorization.status(),
            "request handler applied"
        );
    }

    if !authorization.is_ok() {
        tracing::debug!(
            action = %O::ACTION,
            status = %authorization.status(),
            "request rejected by authorization handlers"
        );
        return Ok(Outcome::status(authorization.status()));
    }

    let mut outcome = guarded(cancel, action(authorization)).await??;

    for handler in handlers.iter() {
        outcome = guarded(cancel, O::review(handler.as_ref(), outcome, cancel)).await?;
    }
    Ok(outcome)
}

async fn execute_custom<P, T, F, Fut>(
    operation: &str,
    handlers: &[Arc<dyn CustomAuthorizationHandler<P, T>>],
    params: P,
    cancel: &CancellationToken,
    action: F,
) -> Result<Outcome<T>, ExecutionError>
where
    P: Send + 'static,
    T: Send + 'static,
    F: FnOnce(AuthorizationWithoutStore<P>) -> Fut,
    Fut: Future<Output = Result<Outcome<T>, ExecutionError>>,
{
    let mut authorization = AuthorizationWithoutStore::new(params);
    for handler in handlers {
        authorization = guarded(cancel, handler.handle_request(operation, authorization, cancel)).await?;
    }

    if !authorization.is_ok() {
        tracing::debug!(operation, status = %authorization.status(), "custom operation rejected");
        return Ok(Outcome::status(authorization.status()));
    }

    let mut outcome = guarded(cancel, action(authorization)).await??;

    for handler in handlers {
        outcome = guarded(cancel, handler.handle_response(operation, outcome, cancel)).await?;
    }
    Ok(outcome)
}
