//! Caller identity and declarative access policies
//!
//! The host resolves an [`AuthContext`] once per request. Each entity declares
//! an [`AuthPolicy`] for reads and one for writes, usually as strings in the
//! `policies` block of the YAML configuration:
//!
//! | string                 | policy                                  |
//! |------------------------|-----------------------------------------|
//! | `public`               | [`AuthPolicy::Public`]                  |
//! | `authenticated`        | [`AuthPolicy::Authenticated`]           |
//! | `service_only`         | [`AuthPolicy::ServiceOnly`]             |
//! | `admin_only`           | [`AuthPolicy::AdminOnly`]               |
//! | `role:editor`          | [`AuthPolicy::HasRole`] with one role   |
//! | `role:editor\|manager` | [`AuthPolicy::HasRole`], any of several |
//!
//! Anything else is rejected with a [`PolicyError`] when the policies are
//! built, so a typo never widens access.
//!
//! Policies only look at the caller. Per-row restrictions belong in a row
//! filter (see `TenantScopeHandler`).

use crate::core::error::PolicyError;
use std::str::FromStr;
use uuid::Uuid;

/// The caller of a service action
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// End user acting inside one tenant
    User {
        user_id: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
    },

    /// Another service; `tenant_id` is set when it acts for a tenant
    Service {
        service_name: String,
        tenant_id: Option<Uuid>,
    },

    /// Operator with access to every tenant
    Admin { admin_id: Uuid },

    Anonymous,
}

impl AuthContext {
    /// Tenant the caller's reads and writes are confined to.
    ///
    /// `None` for admins (unrestricted) as well as for anonymous callers and
    /// tenant-less services (which see nothing); use [`is_admin`] to tell
    /// them apart.
    ///
    /// [`is_admin`]: AuthContext::is_admin
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User { tenant_id, .. } => Some(*tenant_id),
            AuthContext::Service { tenant_id, .. } => *tenant_id,
            AuthContext::Admin { .. } | AuthContext::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::Admin { .. })
    }

    pub fn is_service(&self) -> bool {
        matches!(self, AuthContext::Service { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, AuthContext::Anonymous)
    }

    /// Whether the caller holds at least one of `required`. Only users carry roles.
    pub fn has_any_role(&self, required: &[String]) -> bool {
        match self {
            AuthContext::User { roles, .. } => required.iter().any(|r| roles.contains(r)),
            _ => false,
        }
    }
}

/// Who may run an action
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    Public,

    /// Any caller except [`AuthContext::Anonymous`]
    Authenticated,

    /// A user holding any of these roles
    HasRole(Vec<String>),

    ServiceOnly,

    AdminOnly,

    /// Every inner policy must permit the caller
    And(Vec<AuthPolicy>),

    /// At least one inner policy must permit the caller
    Or(Vec<AuthPolicy>),

    Custom(fn(&AuthContext) -> bool),
}

impl AuthPolicy {
    pub fn permits(&self, context: &AuthContext) -> bool {
        match self {
            AuthPolicy::Public => true,
            AuthPolicy::Authenticated => !context.is_anonymous(),
            AuthPolicy::HasRole(roles) => context.has_any_role(roles),
            AuthPolicy::ServiceOnly => context.is_service(),
            AuthPolicy::AdminOnly => context.is_admin(),
            AuthPolicy::And(inner) => inner.iter().all(|p| p.permits(context)),
            AuthPolicy::Or(inner) => inner.iter().any(|p| p.permits(context)),
            AuthPolicy::Custom(predicate) => predicate(context),
        }
    }
}

impl FromStr for AuthPolicy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "public" => Ok(AuthPolicy::Public),
            "authenticated" => Ok(AuthPolicy::Authenticated),
            "service_only" => Ok(AuthPolicy::ServiceOnly),
            "admin_only" => Ok(AuthPolicy::AdminOnly),
            other => {
                let Some(list) = other.strip_prefix("role:") else {
                    return Err(PolicyError::Unknown(other.to_string()));
                };
                let roles: Vec<String> = list
                    .split('|')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect();
                if roles.is_empty() {
                    return Err(PolicyError::MissingRole(other.to_string()));
                }
                Ok(AuthPolicy::HasRole(roles))
            }
        }
    }
}
