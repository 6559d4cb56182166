//! Action identifiers with their handler dispatch
//!
//! Each marker type names one generic action, fixes its parameter and
//! response types, and routes the pipeline's fold to the matching pair of
//! [`AuthorizationHandler`] methods.

use crate::authorization::handler::{Action, AuthorizationHandler};
use crate::authorization::result::Authorization;
use crate::core::entity::{Dto, Entity, EntityId};
use crate::core::outcome::Outcome;
use crate::service::request::{
    DeleteRequest, GetHistoryRequest, GetListRequest, ListPage, UpdateMultipleRequest,
};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// A generic action the pipeline can authorize and execute
pub trait Operation<E: Entity, D: Dto> {
    const ACTION: Action;

    type Params: Send + 'static;
    type Output: Send + 'static;

    fn authorize<'a>(
        handler: &'a dyn AuthorizationHandler<E, D>,
        previous: Authorization<Self::Params, E>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Authorization<Self::Params, E>>;

    fn review<'a>(
        handler: &'a dyn AuthorizationHandler<E, D>,
        previous: Outcome<Self::Output>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Outcome<Self::Output>>;
}

macro_rules! operation {
    ($(#[$meta:meta])* $name:ident, $action:ident, $params:ty, $output:ty, $request:ident, $response:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl<E: Entity, D: Dto> Operation<E, D> for $name {
            const ACTION: Action = Action::$action;

            type Params = $params;
            type Output = $output;

            fn authorize<'a>(
                handler: &'a dyn AuthorizationHandler<E, D>,
                previous: Authorization<Self::Params, E>,
                cancel: &'a CancellationToken,
            ) -> BoxFuture<'a, Authorization<Self::Params, E>> {
                handler.$request(previous, cancel)
            }

            fn review<'a>(
                handler: &'a dyn AuthorizationHandler<E, D>,
                previous: Outcome<Self::Output>,
                cancel: &'a CancellationToken,
            ) -> BoxFuture<'a, Outcome<Self::Output>> {
                handler.$response(previous, cancel)
            }
        }
    };
}

operation!(
    /// Fetch one entity by id
    GetSingle, GetSingle, EntityId, D,
    handle_get_single_request, handle_get_single_response
);
operation!(
    /// Fetch a page of entities
    GetList, GetList, GetListRequest<D, E>, ListPage<D>,
    handle_get_list_request, handle_get_list_response
);
operation!(
    /// Fetch a page of history rows
    GetHistory, GetHistory, GetHistoryRequest<D, E>, ListPage<D>,
    handle_get_history_request, handle_get_history_response
);
operation!(
    /// Insert one entity
    Create, Create, D, D,
    handle_create_request, handle_create_response
);
operation!(
    /// Insert several entities in one unit of work
    CreateMany, CreateMany, Vec<D>, Vec<D>,
    handle_create_many_request, handle_create_many_response
);
operation!(
    /// Update one entity
    Update, Update, D, D,
    handle_update_request, handle_update_response
);
operation!(
    /// Update several entities, all or nothing
    UpdateMany, UpdateMany, UpdateMultipleRequest<D, E>, Vec<D>,
    handle_update_many_request, handle_update_many_response
);
operation!(
    /// Remove one entity
    Delete, Delete, DeleteRequest, (),
    handle_delete_request, handle_delete_response
);
