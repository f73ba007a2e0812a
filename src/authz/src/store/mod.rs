//! Persistence seam for permission and role records
//!
//! The engine never talks to a database directly. Hosting applications
//! implement [`PermissionStore`] and [`RoleStore`] for their backend;
//! [`InMemoryStore`] is provided for tests and single-process use.

mod memory;

pub use memory::InMemoryStore;

use crate::error::Result;
use crate::permission::{Permission, PermissionRefresh, PermissionSeed};
use crate::role::{Role, RoleRefresh, RoleSeed};
use crate::types::{PermissionId, RoleId};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Filter for permission lookups; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionFilter {
    /// Restrict to these identifiers
    pub ids: Option<BTreeSet<PermissionId>>,

    /// Restrict by activity flag
    pub active: Option<bool>,

    /// Restrict to one module
    pub module: Option<String>,
}

impl PermissionFilter {
    /// Active permissions among `ids`
    pub fn active_ids<I: IntoIterator<Item = PermissionId>>(ids: I) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            active: Some(true),
            module: None,
        }
    }

    /// Whether a record passes this filter
    pub fn matches(&self, permission: &Permission) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&permission.id))
            && self.active.map_or(true, |a| permission.active == a)
            && self.module.as_ref().map_or(true, |m| &permission.module == m)
    }
}

/// Filter for role lookups; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFilter {
    /// Restrict to these identifiers
    pub ids: Option<BTreeSet<RoleId>>,

    /// Restrict by activity flag
    pub active: Option<bool>,
}

impl RoleFilter {
    /// Roles among `ids`, active or not
    pub fn ids<I: IntoIterator<Item = RoleId>>(ids: I) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            active: None,
        }
    }

    /// Whether a record passes this filter
    pub fn matches(&self, role: &Role) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&role.id))
            && self.active.map_or(true, |a| role.active == a)
    }
}

/// Permission storage backend
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Get a permission by ID
    async fn get(&self, id: PermissionId) -> Result<Option<Permission>>;

    /// Get a permission by canonical key
    async fn find_by_key(&self, canonical_key: &str) -> Result<Option<Permission>>;

    /// Find permissions matching a filter
    async fn find(&self, filter: &PermissionFilter) -> Result<Vec<Permission>>;

    /// Insert or refresh the permission with `seed.canonical_key`
    ///
    /// `seed` fields are written only when the record is created;
    /// `refresh` fields are written on every call. Must be atomic per key.
    async fn upsert_by_key(
        &self,
        seed: PermissionSeed,
        refresh: PermissionRefresh,
    ) -> Result<Permission>;

    /// Activate or deactivate a permission
    async fn set_active(&self, id: PermissionId, active: bool) -> Result<Permission>;

    /// Whether `upsert_by_key` is atomic per key across processes
    ///
    /// Backends returning `false` get their bootstrap serialized.
    fn supports_atomic_upsert(&self) -> bool {
        true
    }
}

/// Role storage backend
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Get a role by ID
    async fn get(&self, id: RoleId) -> Result<Option<Role>>;

    /// Get a role by its (upper-cased) name
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Find roles matching a filter
    async fn find(&self, filter: &RoleFilter) -> Result<Vec<Role>>;

    /// Insert a new role; `Conflict` if the name is taken
    async fn insert(&self, role: Role) -> Result<Role>;

    /// Replace an existing role; `NotFound` if absent, `Conflict` on a name clash
    async fn update(&self, role: Role) -> Result<Role>;

    /// Insert or refresh the role named `seed.name`, atomic per name
    async fn upsert_by_name(&self, seed: RoleSeed, refresh: RoleRefresh) -> Result<Role>;
}
