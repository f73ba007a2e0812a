//! Principal data consumed by the resolver
//!
//! Principals are owned by the user-management component; the engine only
//! reads their role assignments and grants. Expiry is evaluated lazily
//! whenever permissions are computed, so expired grants never need to be
//! swept.

use crate::error::{AuthzError, Result};
use crate::types::{PermissionId, PrincipalId, RoleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A permission granted directly to a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectGrant {
    /// Granted permission
    pub permission: PermissionId,

    /// Administrator who created the grant
    pub granted_by: PrincipalId,

    /// Absent means the grant never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl DirectGrant {
    /// Create a grant that never expires
    pub fn new(permission: PermissionId, granted_by: impl Into<PrincipalId>) -> Self {
        Self {
            permission,
            granted_by: granted_by.into(),
            expires_at: None,
        }
    }

    /// Set an expiry
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the grant counts at `now`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// A time-bounded grant of some of one principal's permissions to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedGrant {
    /// Principal the permissions are delegated from
    pub from_principal: PrincipalId,

    /// Delegated permissions
    pub permissions: Vec<PermissionId>,

    /// Administrator who created the delegation
    pub granted_by: PrincipalId,

    /// Mandatory expiry
    pub expires_at: DateTime<Utc>,
}

impl DelegatedGrant {
    /// Create a delegation
    ///
    /// # Errors
    ///
    /// `Validation` if `expires_at` is missing or not after `now`.
    pub fn new(
        from_principal: impl Into<PrincipalId>,
        permissions: Vec<PermissionId>,
        granted_by: impl Into<PrincipalId>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let expires_at = expires_at.ok_or_else(|| {
            AuthzError::Validation("Delegated grants require an expiry".to_string())
        })?;

        if expires_at <= now {
            return Err(AuthzError::Validation(format!(
                "Delegated grant expiry {} is not in the future",
                expires_at.to_rfc3339()
            )));
        }

        Ok(Self {
            from_principal: from_principal.into(),
            permissions,
            granted_by: granted_by.into(),
            expires_at,
        })
    }

    /// Whether the delegation counts at `now`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Authorization-relevant view of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier
    pub id: PrincipalId,

    /// Assigned role ids
    #[serde(default)]
    pub roles: Vec<RoleId>,

    /// Permissions granted directly
    #[serde(default)]
    pub direct_grants: Vec<DirectGrant>,

    /// Permissions delegated from other principals
    #[serde(default)]
    pub delegated_grants: Vec<DelegatedGrant>,
}

impl Principal {
    /// Create a principal with no roles or grants
    pub fn new(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Assign a role
    pub fn with_role(mut self, role: RoleId) -> Self {
        self.roles.push(role);
        self
    }

    /// Add a direct grant
    pub fn with_direct_grant(mut self, grant: DirectGrant) -> Self {
        self.direct_grants.push(grant);
        self
    }

    /// Add a delegated grant
    pub fn with_delegated_grant(mut self, grant: DelegatedGrant) -> Self {
        self.delegated_grants.push(grant);
        self
    }
}
