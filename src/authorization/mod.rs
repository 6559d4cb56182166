//! Request authorization: result values, handler chain and built-in handlers

pub mod handler;
pub mod operation;
pub mod policy;
pub mod result;

pub use handler::{Action, AuthorizationHandler, CustomAuthorizationHandler, HandlerSet};
pub use operation::Operation;
pub use policy::{ActionPolicies, PolicyHandler, TenantScopeHandler};
pub use result::{Authorization, AuthorizationWithoutStore, RowFilter};
