//! Effective permission resolution
//!
//! Merges three sources into a principal's effective set:
//!
//! 1. role-derived permissions (each assigned active role and its ancestors)
//! 2. direct grants that have no expiry or expire strictly in the future
//! 3. delegated grants that expire strictly in the future
//!
//! A super-admin role short-circuits everything into
//! [`EffectivePermissions::Universal`].
//!
//! Nothing is cached between calls: every computation re-reads the store,
//! so a revoked grant or deactivated role takes effect on the very next
//! check. Reads are not taken from a consistent snapshot, so authorization
//! decisions are correct as of a moment no older than the current request.

use crate::error::Result;
use crate::permission::Permission;
use crate::principal::Principal;
use crate::role::{RolePermissions, RoleService};
use crate::store::{PermissionFilter, PermissionStore, RoleFilter, RoleStore};
use crate::types::{normalize_key, PermissionId, PrincipalId, RoleId};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Where an effective permission first came from
///
/// Informational only; never consulted when deciding access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantSource {
    /// Carried by an assigned role (directly or through inheritance)
    Role { role_id: RoleId, role_name: String },

    /// Granted directly to the principal
    Direct { granted_by: PrincipalId },

    /// Delegated from another principal
    Delegated {
        from_principal: PrincipalId,
        granted_by: PrincipalId,
    },
}

/// One entry of an effective permission set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub permission: Permission,
    pub source: GrantSource,
}

/// Result of resolving a principal's permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "permissions", rename_all = "snake_case")]
pub enum EffectivePermissions {
    /// Super-admin: every permission, without enumeration
    Universal,

    /// Deduplicated permissions sorted by `(module, action)`
    Granted(Vec<EffectivePermission>),
}

impl EffectivePermissions {
    /// Whether this is the super-admin sentinel
    pub fn is_universal(&self) -> bool {
        matches!(self, Self::Universal)
    }

    /// Enumerated permissions; empty for `Universal`
    pub fn permissions(&self) -> &[EffectivePermission] {
        match self {
            Self::Universal => &[],
            Self::Granted(entries) => entries,
        }
    }

    /// Whether `action` on `module` is allowed, honoring the per-module
    /// `wildcard` action
    pub fn allows(&self, module: &str, action: &str, wildcard: &str) -> bool {
        let entries = match self {
            Self::Universal => return true,
            Self::Granted(entries) => entries,
        };

        let module = normalize_key(module);
        let action = normalize_key(action);

        entries.iter().any(|e| {
            e.permission.module == module
                && (e.permission.action == action || e.permission.action == wildcard)
        })
    }
}

/// Computes effective permissions for principals
#[derive(Clone)]
pub struct EffectivePermissionResolver {
    roles: RoleService,
    role_store: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
}

impl EffectivePermissionResolver {
    /// Create a resolver
    pub fn new(
        roles: RoleService,
        role_store: Arc<dyn RoleStore>,
        permissions: Arc<dyn PermissionStore>,
    ) -> Self {
        Self {
            roles,
            role_store,
            permissions,
        }
    }

    /// Resolve `principal`'s effective permissions now
    pub async fn compute(&self, principal: &Principal) -> Result<EffectivePermissions> {
        self.compute_at(principal, Utc::now()).await
    }

    /// Resolve `principal`'s effective permissions at `now`
    pub async fn compute_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<EffectivePermissions> {
        let mut assigned = if principal.roles.is_empty() {
            Vec::new()
        } else {
            self.role_store
                .find(&RoleFilter {
                    ids: Some(principal.roles.iter().copied().collect()),
                    active: Some(true),
                })
                .await?
        };

        if let Some(admin) = assigned.iter().find(|r| r.is_super_admin) {
            debug!("Principal {} holds super-admin role {}", principal.id, admin.name);
            return Ok(EffectivePermissions::Universal);
        }

        assigned.sort_by(|a, b| a.name.cmp(&b.name));

        let mut merged = Merged::default();

        let per_role =
            try_join_all(assigned.iter().map(|role| self.roles.permissions_of(role, true))).await?;

        for (role, permissions) in assigned.iter().zip(per_role) {
            if let RolePermissions::Records(records) = permissions {
                for permission in records {
                    merged.push(
                        permission,
                        GrantSource::Role {
                            role_id: role.id,
                            role_name: role.name.clone(),
                        },
                    );
                }
            }
        }

        let direct: Vec<_> = principal
            .direct_grants
            .iter()
            .filter(|g| g.is_live_at(now))
            .collect();
        let records = self.active_records(direct.iter().map(|g| g.permission)).await?;
        for grant in direct {
            if let Some(permission) = records.get(&grant.permission) {
                merged.push(
                    permission.clone(),
                    GrantSource::Direct {
                        granted_by: grant.granted_by.clone(),
                    },
                );
            }
        }

        let delegated: Vec<_> = principal
            .delegated_grants
            .iter()
            .filter(|g| g.is_live_at(now))
            .collect();
        let records = self
            .active_records(delegated.iter().flat_map(|g| g.permissions.iter().copied()))
            .await?;
        for grant in delegated {
            for id in &grant.permissions {
                if let Some(permission) = records.get(id) {
                    merged.push(
                        permission.clone(),
                        GrantSource::Delegated {
                            from_principal: grant.from_principal.clone(),
                            granted_by: grant.granted_by.clone(),
                        },
                    );
                }
            }
        }

        let mut entries = merged.entries;
        entries.sort_by(|a, b| a.permission.sort_key().cmp(&b.permission.sort_key()));

        debug!(
            "Principal {} resolved to {} effective permissions",
            principal.id,
            entries.len()
        );

        Ok(EffectivePermissions::Granted(entries))
    }

    async fn active_records<I>(&self, ids: I) -> Result<HashMap<PermissionId, Permission>>
    where
        I: IntoIterator<Item = PermissionId>,
    {
        let ids: BTreeSet<PermissionId> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(self
            .permissions
            .find(&PermissionFilter::active_ids(ids))
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }
}

/// First-seen-wins accumulator
#[derive(Default)]
struct Merged {
    seen: HashSet<PermissionId>,
    entries: Vec<EffectivePermission>,
}

impl Merged {
    fn push(&mut self, permission: Permission, source: GrantSource) {
        if self.seen.insert(permission.id) {
            self.entries.push(EffectivePermission { permission, source });
        }
    }
}
