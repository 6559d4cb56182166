//! Pluggable authorization handlers
//!
//! A handler implements any subset of the request/response method pairs;
//! every method defaults to passing its input through unchanged. Handlers are
//! shared across concurrent calls and must not keep per-call state.

use crate::authorization::result::{Authorization, AuthorizationWithoutStore};
use crate::core::entity::{Dto, Entity, EntityId};
use crate::core::outcome::Outcome;
use crate::service::request::{
    DeleteRequest, GetHistoryRequest, GetListRequest, ListPage, UpdateMultipleRequest,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Logical action a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GetSingle,
    GetList,
    GetHistory,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Delete,
}

impl Action {
    pub fn is_read(&self) -> bool {
        matches!(self, Action::GetSingle | Action::GetList | Action::GetHistory)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetSingle => "get_single",
            Action::GetList => "get_list",
            Action::GetHistory => "get_history",
            Action::Create => "create",
            Action::CreateMany => "create_many",
            Action::Update => "update",
            Action::UpdateMany => "update_many",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization handler for the generic actions on entity `E` exposed as `D`
#[allow(unused_variables)]
#[async_trait]
pub trait AuthorizationHandler<E: Entity, D: Dto>: Send + Sync {
    async fn handle_get_single_request(
        &self,
        previous: Authorization<EntityId, E>,
        cancel: &CancellationToken,
    ) -> Authorization<EntityId, E> {
        previous
    }

    async fn handle_get_single_response(
        &self,
        previous: Outcome<D>,
        cancel: &CancellationToken,
    ) -> Outcome<D> {
        previous
    }

    async fn handle_get_list_request(
        &self,
        previous: Authorization<GetListRequest<D, E>, E>,
        cancel: &CancellationToken,
    ) -> Authorization<GetListRequest<D, E>, E> {
        previous
    }

    async fn handle_get_list_response(
        &self,
        previous: Outcome<ListPage<D>>,
        cancel: &CancellationToken,
    ) -> Outcome<ListPage<D>> {
        previous
    }

    async fn handle_get_history_request(
        &self,
        previous: Authorization<GetHistoryRequest<D, E>, E>,
        cancel: &CancellationToken,
    ) -> Authorization<GetHistoryRequest<D, E>, E> {
        previous
    }

    async fn handle_get_history_response(
        &self,
        previous: Outcome<ListPage<D>>,
        cancel: &CancellationToken,
    ) -> Outcome<ListPage<D>> {
        previous
    }

    async fn handle_create_request(
        &self,
        previous: Authorization<D, E>,
        cancel: &CancellationToken,
    ) -> Authorization<D, E> {
        previous
    }

    async fn handle_create_response(
        &self,
        previous: Outcome<D>,
        cancel: &CancellationToken,
    ) -> Outcome<D> {
        previous
    }

    async fn handle_create_many_request(
        &self,
        previous: Authorization<Vec<D>, E>,
        cancel: &CancellationToken,
    ) -> Authorization<Vec<D>, E> {
        previous
    }

    async fn handle_create_many_response(
        &self,
        previous: Outcome<Vec<D>>,
        cancel: &CancellationToken,
    ) -> Outcome<Vec<D>> {
        previous
    }

    async fn handle_update_request(
        &self,
        previous: Authorization<D, E>,
        cancel: &CancellationToken,
    ) -> Authorization<D, E> {
        previous
    }

    async fn handle_update_response(
        &self,
        previous: Outcome<D>,
        cancel: &CancellationToken,
    ) -> Outcome<D> {
        previous
    }

    async fn handle_update_many_request(
        &self,
        previous: Authorization<UpdateMultipleRequest<D, E>, E>,
        cancel: &CancellationToken,
    ) -> Authorization<UpdateMultipleRequest<D, E>, E> {
        previous
    }

    async fn handle_update_many_response(
        &self,
        previous: Outcome<Vec<D>>,
        cancel: &CancellationToken,
    ) -> Outcome<Vec<D>> {
        previous
    }

    async fn handle_delete_request(
        &self,
        previous: Authorization<DeleteRequest, E>,
        cancel: &CancellationToken,
    ) -> Authorization<DeleteRequest, E> {
        previous
    }

    async fn handle_delete_response(
        &self,
        previous: Outcome<()>,
        cancel: &CancellationToken,
    ) -> Outcome<()> {
        previous
    }
}

/// Ordered, immutable collection of handlers for one entity/DTO combination
pub struct HandlerSet<E: Entity, D: Dto> {
    handlers: Arc<[Arc<dyn AuthorizationHandler<E, D>>]>,
}

impl<E: Entity, D: Dto> Clone for HandlerSet<E, D> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<E: Entity, D: Dto> fmt::Debug for HandlerSet<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("len", &self.handlers.len())
            .finish()
    }
}

impl<E: Entity, D: Dto> HandlerSet<E, D> {
    /// No handlers: authorization is not enforced
    pub fn empty() -> Self {
        Self {
            handlers: Arc::from(Vec::new()),
        }
    }

    pub fn new(handlers: Vec<Arc<dyn AuthorizationHandler<E, D>>>) -> Self {
        Self {
            handlers: Arc::from(handlers),
        }
    }

    /// Append a handler; it runs after every handler added before it
    pub fn with(self, handler: impl AuthorizationHandler<E, D> + 'static) -> Self {
        let mut handlers = self.handlers.to_vec();
        handlers.push(Arc::new(handler));
        Self::new(handlers)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AuthorizationHandler<E, D>>> {
        self.handlers.iter()
    }
}

/// Authorization handler for custom operations that never touch persistence
#[allow(unused_variables)]
#[async_trait]
pub trait CustomAuthorizationHandler<P: Send + 'static, T: Send + 'static>: Send + Sync {
    async fn handle_request(
        &self,
        operation: &str,
        previous: AuthorizationWithoutStore<P>,
        cancel: &CancellationToken,
    ) -> AuthorizationWithoutStore<P> {
        previous
    }

    async fn handle_response(
        &self,
        operation: &str,
        previous: Outcome<T>,
        cancel: &CancellationToken,
    ) -> Outcome<T> {
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_read_classification() {
        assert!(Action::GetSingle.is_read());
        assert!(Action::GetList.is_read());
        assert!(Action::GetHistory.is_read());
        assert!(!Action::Create.is_read());
        assert!(!Action::UpdateMany.is_read());
        assert!(!Action::Delete.is_read());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::CreateMany.to_string(), "create_many");
    }
}
