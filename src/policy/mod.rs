//! Tenant isolation for client-submitted queries.
//!
//! Every query passes through [`SecureQueryPolicy::evaluate`] before it can
//! reach a store. The policy appends the caller's tenant filter (unless the
//! caller may read across tenants) and refuses any query without a
//! `project_id ==` filter. The only way to obtain a [`SecureQuery`] is through
//! this module.

pub mod error;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{AuthorizationModeKind, PolicyConfig};
use crate::query::{self, Filter, FilterOperator, QueryOptions};

pub use error::PolicyError;

/// Field carrying the per-tenant isolation boundary
pub const ISOLATION_FIELD: &str = "subdomain";

/// Field every query must constrain with `==`
pub const TENANCY_ROOT_FIELD: &str = "project_id";

/// Caller identity produced by the authenticator. Read-only to the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationContext {
    pub role: String,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl AuthorizationContext {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Self::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Deployment-wide choice of how bypass and tenant are determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationMode {
    /// Bypass when the permission set holds `bypass_permission`; tenant from `tenant_header`
    Permissions {
        bypass_permission: String,
        tenant_header: String,
    },
    /// Bypass when the role equals `privileged_role`; tenant from the context's `tenant_id`
    Role { privileged_role: String },
}

impl AuthorizationMode {
    pub fn from_config(config: &PolicyConfig) -> Self {
        match config.mode {
            AuthorizationModeKind::Permissions => AuthorizationMode::Permissions {
                bypass_permission: config.bypass_permission.clone(),
                tenant_header: config.tenant_header.clone(),
            },
            AuthorizationModeKind::Role => AuthorizationMode::Role {
                privileged_role: config.privileged_role.clone(),
            },
        }
    }

    /// Header the serving layer must forward, if this mode reads one
    pub fn tenant_header(&self) -> Option<&str> {
        match self {
            AuthorizationMode::Permissions { tenant_header, .. } => Some(tenant_header),
            AuthorizationMode::Role { .. } => None,
        }
    }
}

/// Per-request inputs to the policy besides the body
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestScope<'a> {
    pub auth: Option<&'a AuthorizationContext>,
    pub tenant_header: Option<&'a str>,
}

/// A query that has passed the policy. Only this module can construct one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SecureQuery(QueryOptions);

impl SecureQuery {
    pub fn options(&self) -> &QueryOptions {
        &self.0
    }

    pub fn filters(&self) -> &[Filter] {
        &self.0.filters
    }
}

#[derive(Debug, Clone)]
pub struct SecureQueryPolicy {
    mode: AuthorizationMode,
    audit_logging: bool,
}

impl SecureQueryPolicy {
    pub fn new(mode: AuthorizationMode) -> Self {
        Self {
            mode,
            audit_logging: false,
        }
    }

    pub fn from_config(config: &PolicyConfig, audit_logging: bool) -> Self {
        Self {
            mode: AuthorizationMode::from_config(config),
            audit_logging,
        }
    }

    pub fn mode(&self) -> &AuthorizationMode {
        &self.mode
    }

    /// Parse a raw request body and run it through the policy
    pub fn evaluate(&self, raw_body: &[u8], scope: RequestScope<'_>) -> Result<SecureQuery, PolicyError> {
        let options = query::parse(raw_body)?;
        self.secure(options, scope)
    }

    /// Inject the isolation filter and validate the tenancy root.
    ///
    /// Checks run in a fixed order: bypass, tenant resolution, injection,
    /// tenancy root. The first failure wins.
    pub fn secure(&self, mut options: QueryOptions, scope: RequestScope<'_>) -> Result<SecureQuery, PolicyError> {
        let bypass = self.bypass_granted(scope.auth);

        tracing::debug!(
            mode = ?self.mode,
            role = scope.auth.map(|a| a.role.as_str()).unwrap_or(""),
            bypass,
            "evaluating query policy"
        );

        if bypass {
            if self.audit_logging {
                tracing::info!(
                    target: "audit",
                    role = scope.auth.map(|a| a.role.as_str()).unwrap_or(""),
                    "tenant isolation bypassed"
                );
            }
        } else {
            let tenant = self.resolve_tenant(scope)?;
            tracing::debug!(tenant = %tenant, "appending {} filter", ISOLATION_FIELD);
            options.push_filter(Filter::new(ISOLATION_FIELD, FilterOperator::Eq, tenant));
        }

        if !options.has_filter(TENANCY_ROOT_FIELD, FilterOperator::Eq) {
            tracing::debug!("query rejected: no {} filter", TENANCY_ROOT_FIELD);
            return Err(PolicyError::MissingTenancyRoot { field: TENANCY_ROOT_FIELD });
        }

        Ok(SecureQuery(options))
    }

    fn bypass_granted(&self, auth: Option<&AuthorizationContext>) -> bool {
        let Some(auth) = auth else {
            return false;
        };
        match &self.mode {
            AuthorizationMode::Permissions { bypass_permission, .. } => auth.has_permission(bypass_permission),
            AuthorizationMode::Role { privileged_role } => auth.role == *privileged_role,
        }
    }

    fn resolve_tenant(&self, scope: RequestScope<'_>) -> Result<String, PolicyError> {
        let Some(auth) = scope.auth else {
            tracing::warn!("query rejected: no authorization context");
            return Err(PolicyError::MissingTenantScope(
                "An authorization context is required for this query".to_string(),
            ));
        };

        let (tenant, message) = match &self.mode {
            AuthorizationMode::Permissions { tenant_header, .. } => (
                scope.tenant_header,
                format!("The {} header is required for this query", tenant_header),
            ),
            AuthorizationMode::Role { .. } => (
                auth.tenant_id.as_deref(),
                "The caller has no tenant bound to its credentials".to_string(),
            ),
        };

        match tenant.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Ok(t.to_string()),
            None => {
                tracing::warn!("query rejected: {}", message);
                Err(PolicyError::MissingTenantScope(message))
            }
        }
    }
}
