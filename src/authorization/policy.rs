//! Built-in authorization handlers
//!
//! - [`PolicyHandler`]: rejects callers that fail the read or write policy
//! - [`TenantScopeHandler`]: restricts every persistence read to the caller's tenant
//!
//! Both are meant to be constructed per request with the caller's
//! [`AuthContext`].

use crate::authorization::handler::{Action, AuthorizationHandler};
use crate::authorization::result::Authorization;
use crate::config::EntityConfig;
use crate::core::auth::{AuthContext, AuthPolicy};
use crate::core::entity::{Dto, Entity, EntityId};
use crate::core::error::PolicyError;
use crate::core::query::Query;
use crate::service::request::{
    DeleteRequest, GetHistoryRequest, GetListRequest, UpdateMultipleRequest,
};
use async_trait::async_trait;
use axum::http::StatusCode;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Read/write policy pair checked by [`PolicyHandler`]
#[derive(Debug, Clone)]
pub struct ActionPolicies {
    pub read: AuthPolicy,
    pub write: AuthPolicy,
}

impl Default for ActionPolicies {
    fn default() -> Self {
        Self {
            read: AuthPolicy::Authenticated,
            write: AuthPolicy::Authenticated,
        }
    }
}

impl ActionPolicies {
    pub fn new(read: AuthPolicy, write: AuthPolicy) -> Self {
        Self { read, write }
    }

    /// Policies declared for an entity in the YAML configuration.
    ///
    /// A missing string keeps the default; an unreadable one is an error.
    pub fn from_config(config: &EntityConfig) -> Result<Self, PolicyError> {
        let parse = |declared: Option<&str>, fallback: AuthPolicy| match declared {
            Some(text) => text.parse::<AuthPolicy>(),
            None => Ok(fallback),
        };
        let defaults = Self::default();
        Ok(Self {
            read: parse(config.policies.read.as_deref(), defaults.read)?,
            write: parse(config.policies.write.as_deref(), defaults.write)?,
        })
    }

    pub fn for_action(&self, action: Action) -> &AuthPolicy {
        if action.is_read() { &self.read } else { &self.write }
    }
}

/// Rejects callers that do not satisfy the policy of the requested action.
///
/// Anonymous callers get `401 Unauthorized`, authenticated ones `403 Forbidden`.
#[derive(Debug, Clone)]
pub struct PolicyHandler {
    context: AuthContext,
    policies: ActionPolicies,
}

impl PolicyHandler {
    pub fn new(context: AuthContext, policies: ActionPolicies) -> Self {
        Self { context, policies }
    }

    fn check<P, E>(&self, action: Action, previous: Authorization<P, E>) -> Authorization<P, E> {
        if self.policies.for_action(action).permits(&self.context) {
            return previous;
        }
        let status = if self.context.is_anonymous() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::FORBIDDEN
        };
        tracing::debug!(action = %action, status = %status, "policy rejected caller");
        previous.with_status(status)
    }
}

#[async_trait]
impl<E: Entity, D: Dto> AuthorizationHandler<E, D> for PolicyHandler {
    async fn handle_get_single_request(
        &self,
        previous: Authorization<EntityId, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<EntityId, E> {
        self.check(Action::GetSingle, previous)
    }

    async fn handle_get_list_request(
        &self,
        previous: Authorization<GetListRequest<D, E>, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<GetListRequest<D, E>, E> {
        self.check(Action::GetList, previous)
    }

    async fn handle_get_history_request(
        &self,
        previous: Authorization<GetHistoryRequest<D, E>, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<GetHistoryRequest<D, E>, E> {
        self.check(Action::GetHistory, previous)
    }

    async fn handle_create_request(
        &self,
        previous: Authorization<D, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<D, E> {
        self.check(Action::Create, previous)
    }

    async fn handle_create_many_request(
        &self,
        previous: Authorization<Vec<D>, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<Vec<D>, E> {
        self.check(Action::CreateMany, previous)
    }

    async fn handle_update_request(
        &self,
        previous: Authorization<D, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<D, E> {
        self.check(Action::Update, previous)
    }

    async fn handle_update_many_request(
        &self,
        previous: Authorization<UpdateMultipleRequest<D, E>, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<UpdateMultipleRequest<D, E>, E> {
        self.check(Action::UpdateMany, previous)
    }

    async fn handle_delete_request(
        &self,
        previous: Authorization<DeleteRequest, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<DeleteRequest, E> {
        self.check(Action::Delete, previous)
    }
}

/// Restricts rows to the caller's tenant.
///
/// Admins are unrestricted; callers without a tenant see no rows at all, so
/// out-of-scope rows look exactly like missing ones.
#[derive(Debug, Clone)]
pub struct TenantScopeHandler {
    context: AuthContext,
}

impl TenantScopeHandler {
    pub fn new(context: AuthContext) -> Self {
        Self { context }
    }

    fn scope<P, E: Entity>(&self, previous: Authorization<P, E>) -> Authorization<P, E> {
        if self.context.is_admin() {
            return previous;
        }
        let tenant: Option<Uuid> = self.context.tenant_id();
        previous.with_filter(move |query: Query<E>| match tenant {
            Some(tenant) => query.filter(move |row: &E| row.tenant_id() == Some(tenant)),
            None => query.filter(|_: &E| false),
        })
    }
}

#[async_trait]
impl<E: Entity, D: Dto> AuthorizationHandler<E, D> for TenantScopeHandler {
    async fn handle_get_single_request(
        &self,
        previous: Authorization<EntityId, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<EntityId, E> {
        self.scope(previous)
    }

    async fn handle_get_list_request(
        &self,
        previous: Authorization<GetListRequest<D, E>, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<GetListRequest<D, E>, E> {
        self.scope(previous)
    }

    async fn handle_get_history_request(
        &self,
        previous: Authorization<GetHistoryRequest<D, E>, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<GetHistoryRequest<D, E>, E> {
        self.scope(previous)
    }

    async fn handle_update_request(
        &self,
        previous: Authorization<D, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<D, E> {
        self.scope(previous)
    }

    async fn handle_update_many_request(
        &self,
        previous: Authorization<UpdateMultipleRequest<D, E>, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<UpdateMultipleRequest<D, E>, E> {
        self.scope(previous)
    }

    async fn handle_delete_request(
        &self,
        previous: Authorization<DeleteRequest, E>,
        _cancel: &CancellationToken,
    ) -> Authorization<DeleteRequest, E> {
        self.scope(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityConfig, PolicyConfig};

    #[derive(Clone)]
    struct Row {
        id: EntityId,
        tenant: Uuid,
    }

    impl Entity for Row {
        fn resource_name() -> &'static str {
            "rows"
        }
        fn id(&self) -> EntityId {
            self.id
        }
        fn set_id(&mut self, id: EntityId) {
            self.id = id;
        }
        fn tenant_id(&self) -> Option<Uuid> {
            Some(self.tenant)
        }
    }

    fn user(tenant_id: Uuid, roles: &[&str]) -> AuthContext {
        AuthContext::User {
            user_id: Uuid::new_v4(),
            tenant_id,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_policy_anonymous_gets_unauthorized() {
        let handler = PolicyHandler::new(AuthContext::Anonymous, ActionPolicies::default());
        let auth = handler.check(Action::GetSingle, Authorization::<EntityId, Row>::new(1));
        assert_eq!(auth.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_policy_missing_role_gets_forbidden() {
        let policies = ActionPolicies::new(
            AuthPolicy::Authenticated,
            AuthPolicy::HasRole(vec!["admin".into()]),
        );
        let handler = PolicyHandler::new(user(Uuid::new_v4(), &["viewer"]), policies);

        let read = handler.check(Action::GetList, Authorization::<(), Row>::new(()));
        assert!(read.is_ok());

        let write = handler.check(Action::Delete, Authorization::<(), Row>::new(()));
        assert_eq!(write.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_policies_from_config() {
        let config = EntityConfig {
            name: "rows".to_string(),
            max_page_size: None,
            policies: PolicyConfig {
                read: Some("public".to_string()),
                write: Some("role:editor".to_string()),
            },
        };
        let policies = ActionPolicies::from_config(&config).unwrap();
        assert!(matches!(policies.read, AuthPolicy::Public));
        assert!(matches!(policies.for_action(Action::Update), AuthPolicy::HasRole(_)));
    }

    #[test]
    fn test_policies_from_config_reject_owner_strings() {
        let config = EntityConfig {
            name: "rows".to_string(),
            max_page_size: None,
            policies: PolicyConfig {
                read: None,
                write: Some("owner_or_role:manager".to_string()),
            },
        };
        assert_eq!(
            ActionPolicies::from_config(&config).unwrap_err(),
            PolicyError::Unknown("owner_or_role:manager".to_string())
        );
    }

    #[test]
    fn test_tenant_scope_filters_rows() {
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        let rows = vec![Row { id: 1, tenant }, Row { id: 2, tenant: other }];

        let handler = TenantScopeHandler::new(user(tenant, &[]));
        let auth = handler.scope(Authorization::<(), Row>::new(()));
        let visible: Vec<EntityId> = auth
            .apply(Query::new())
            .evaluate(rows)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(visible, vec![1]);
    }

    #[test]
    fn test_tenant_scope_without_tenant_sees_nothing() {
        let rows = vec![Row { id: 1, tenant: Uuid::new_v4() }];
        let handler = TenantScopeHandler::new(AuthContext::Anonymous);
        let auth = handler.scope(Authorization::<(), Row>::new(()));
        assert!(auth.apply(Query::new()).evaluate(rows).is_empty());
    }

    #[test]
    fn test_tenant_scope_admin_unrestricted() {
        let handler = TenantScopeHandler::new(AuthContext::Admin {
            admin_id: Uuid::new_v4(),
        });
        let auth = handler.scope(Authorization::<(), Row>::new(()));
        assert!(auth.filter().is_identity());
    }
}
