//! In-memory store implementation

use super::{PermissionFilter, PermissionStore, RoleFilter, RoleStore};
use crate::error::{AuthzError, Result};
use crate::permission::{Permission, PermissionRefresh, PermissionSeed};
use crate::role::{Role, RoleRefresh, RoleSeed};
use crate::types::{normalize_key, PermissionId, RoleId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct PermissionTable {
    records: HashMap<PermissionId, Permission>,
    by_key: HashMap<String, PermissionId>,
}

#[derive(Default)]
struct RoleTable {
    records: HashMap<RoleId, Role>,
    by_name: HashMap<String, RoleId>,
}

/// In-memory permission and role store
///
/// Every upsert holds the table's write lock across its check-and-write,
/// so upserts are atomic per unique key. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    permissions: Arc<RwLock<PermissionTable>>,
    roles: Arc<RwLock<RoleTable>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of permission records, active or not
    pub async fn permission_count(&self) -> usize {
        self.permissions.read().await.records.len()
    }

    /// Number of role records
    pub async fn role_count(&self) -> usize {
        self.roles.read().await.records.len()
    }

    /// Write a role record as-is, bypassing name and graph validation
    ///
    /// Used to load legacy data.
    pub async fn put_role_unchecked(&self, role: Role) {
        let mut table = self.roles.write().await;
        table.by_name.insert(role.name.clone(), role.id);
        table.records.insert(role.id, role);
    }
}

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn get(&self, id: PermissionId) -> Result<Option<Permission>> {
        let table = self.permissions.read().await;
        Ok(table.records.get(&id).cloned())
    }

    async fn find_by_key(&self, canonical_key: &str) -> Result<Option<Permission>> {
        let table = self.permissions.read().await;
        Ok(table
            .by_key
            .get(canonical_key)
            .and_then(|id| table.records.get(id))
            .cloned())
    }

    async fn find(&self, filter: &PermissionFilter) -> Result<Vec<Permission>> {
        let table = self.permissions.read().await;

        let found = match &filter.ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| table.records.get(id))
                .filter(|p| filter.matches(p))
                .cloned()
                .collect(),
            None => table
                .records
                .values()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect(),
        };

        Ok(found)
    }

    async fn upsert_by_key(
        &self,
        seed: PermissionSeed,
        refresh: PermissionRefresh,
    ) -> Result<Permission> {
        let mut table = self.permissions.write().await;

        if let Some(id) = table.by_key.get(&seed.canonical_key).copied() {
            let record = table
                .records
                .get_mut(&id)
                .ok_or_else(|| AuthzError::Internal(format!("Dangling key index for {}", id)))?;
            record.refresh(refresh);
            return Ok(record.clone());
        }

        let permission = Permission::from_parts(Uuid::new_v4(), seed, refresh);
        debug!("Created permission {} ({})", permission.canonical_key, permission.id);

        table
            .by_key
            .insert(permission.canonical_key.clone(), permission.id);
        table.records.insert(permission.id, permission.clone());

        Ok(permission)
    }

    async fn set_active(&self, id: PermissionId, active: bool) -> Result<Permission> {
        let mut table = self.permissions.write().await;
        let record = table
            .records
            .get_mut(&id)
            .ok_or_else(|| AuthzError::permission_not_found(id))?;
        record.active = active;
        Ok(record.clone())
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn get(&self, id: RoleId) -> Result<Option<Role>> {
        let table = self.roles.read().await;
        Ok(table.records.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let table = self.roles.read().await;
        Ok(table
            .by_name
            .get(&normalize_key(name))
            .and_then(|id| table.records.get(id))
            .cloned())
    }

    async fn find(&self, filter: &RoleFilter) -> Result<Vec<Role>> {
        let table = self.roles.read().await;

        let found = match &filter.ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| table.records.get(id))
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
            None => table
                .records
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
        };

        Ok(found)
    }

    async fn insert(&self, role: Role) -> Result<Role> {
        let mut table = self.roles.write().await;

        if table.by_name.contains_key(&role.name) {
            return Err(AuthzError::Conflict(format!(
                "Role name '{}' already exists",
                role.name
            )));
        }
        if table.records.contains_key(&role.id) {
            return Err(AuthzError::Conflict(format!("Role id {} already exists", role.id)));
        }

        table.by_name.insert(role.name.clone(), role.id);
        table.records.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update(&self, role: Role) -> Result<Role> {
        let mut table = self.roles.write().await;

        let previous_name = table
            .records
            .get(&role.id)
            .map(|r| r.name.clone())
            .ok_or_else(|| AuthzError::role_not_found(role.id))?;

        if previous_name != role.name {
            if table.by_name.contains_key(&role.name) {
                return Err(AuthzError::Conflict(format!(
                    "Role name '{}' already exists",
                    role.name
                )));
            }
            table.by_name.remove(&previous_name);
            table.by_name.insert(role.name.clone(), role.id);
        }

        table.records.insert(role.id, role.clone());
        Ok(role)
    }

    async fn upsert_by_name(&self, seed: RoleSeed, refresh: RoleRefresh) -> Result<Role> {
        let mut table = self.roles.write().await;

        if let Some(id) = table.by_name.get(&seed.name).copied() {
            let record = table
                .records
                .get_mut(&id)
                .ok_or_else(|| AuthzError::Internal(format!("Dangling name index for {}", id)))?;
            record.refresh(refresh);
            return Ok(record.clone());
        }

        let role = Role::from_parts(Uuid::new_v4(), seed, refresh);
        table.by_name.insert(role.name.clone(), role.id);
        table.records.insert(role.id, role.clone());
        Ok(role)
    }
}
