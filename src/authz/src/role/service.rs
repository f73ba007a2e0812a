//! Role administration
//!
//! Every save re-normalizes the role's permission references and then
//! re-checks, right before the write, that each resolved permission is
//! still active. Inheritance edges are only committed after a graph walk
//! proves they cannot close a cycle. Both are read-then-write sequences
//! without snapshot isolation; concurrent admin edits are last-writer-wins.

use super::graph::InheritanceGraph;
use super::types::{NewRole, Role, RolePermissions, RoleUpdate};
use crate::error::{AuthzError, Result};
use crate::normalizer::PermissionNormalizer;
use crate::store::{PermissionFilter, PermissionStore, RoleFilter, RoleStore};
use crate::types::{normalize_key, PermissionId, RoleId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Creates, updates and links roles
#[derive(Clone)]
pub struct RoleService {
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
    normalizer: PermissionNormalizer,
}

impl RoleService {
    /// Create a role service
    pub fn new(
        roles: Arc<dyn RoleStore>,
        permissions: Arc<dyn PermissionStore>,
        normalizer: PermissionNormalizer,
    ) -> Self {
        Self {
            roles,
            permissions,
            normalizer,
        }
    }

    /// Inheritance graph view over the role store
    pub fn graph(&self) -> InheritanceGraph<'_> {
        InheritanceGraph::new(self.roles.as_ref())
    }

    /// Get a role, failing with `NotFound` if absent
    pub async fn get(&self, id: RoleId) -> Result<Role> {
        self.roles
            .get(id)
            .await?
            .ok_or_else(|| AuthzError::role_not_found(id))
    }

    /// Get a role by name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.roles.find_by_name(name).await
    }

    /// Create a role
    ///
    /// # Errors
    ///
    /// - `Validation` if the name is empty, or permission references were
    ///   given but none resolved
    /// - `NotFound` if a parent role does not exist
    /// - `Conflict` if the name is taken
    pub async fn create(&self, input: NewRole) -> Result<Role> {
        let name = Self::validate_name(&input.name)?;

        if self.roles.find_by_name(&name).await?.is_some() {
            return Err(AuthzError::Conflict(format!("Role name '{}' already exists", name)));
        }

        let mut inherits = BTreeSet::new();
        for parent in input.inherits {
            self.get(parent).await?;
            inherits.insert(parent);
        }

        // Normalization may lazily create permissions, so it runs last
        let permissions = self.resolve_permissions(&input.permissions).await?;

        let role = Role {
            id: Uuid::new_v4(),
            name,
            description: input.description,
            permissions,
            inherits,
            active: true,
            is_super_admin: input.is_super_admin,
        };

        let role = self.roles.insert(role).await?;
        info!(
            "Created role {} ({}) with {} permissions",
            role.name,
            role.id,
            role.permissions.len()
        );

        Ok(role)
    }

    /// Update a role, re-normalizing its permission set
    pub async fn update(&self, id: RoleId, update: RoleUpdate) -> Result<Role> {
        let mut role = self.get(id).await?;

        if let Some(name) = update.name {
            role.name = Self::validate_name(&name)?;
        }
        if let Some(description) = update.description {
            role.description = description;
        }
        if let Some(active) = update.active {
            role.active = active;
        }
        if let Some(is_super_admin) = update.is_super_admin {
            role.is_super_admin = is_super_admin;
        }

        let refs = match update.permissions {
            Some(refs) => refs,
            None => role.permissions.iter().map(|id| id.to_string()).collect(),
        };
        role.permissions = self.resolve_permissions(&refs).await?;

        let role = self.roles.update(role).await?;
        debug!("Updated role {} ({})", role.name, role.id);
        Ok(role)
    }

    /// Add the edge `role_id -> parent_id`
    ///
    /// Walks from `parent_id` along its own inheritance edges looking for
    /// `role_id`; if found, fails with `CircularInheritance` and leaves the
    /// graph unchanged. Adding an existing edge is a no-op.
    pub async fn add_inheritance(&self, role_id: RoleId, parent_id: RoleId) -> Result<Role> {
        let mut role = self.get(role_id).await?;
        self.get(parent_id).await?;

        if role.inherits.contains(&parent_id) {
            return Ok(role);
        }

        if let Some(path) = self.graph().find_path(parent_id, role_id).await? {
            let mut cycle = vec![role_id];
            cycle.extend(path);
            let path = self.graph().describe_path(&cycle).await?;

            warn!("Rejected inheritance edge on role {}: {}", role.name, path);
            return Err(AuthzError::CircularInheritance {
                role: role.name,
                path,
            });
        }

        role.inherits.insert(parent_id);
        let role = self.roles.update(role).await?;
        info!("Role {} now inherits from {}", role.name, parent_id);
        Ok(role)
    }

    /// Remove the edge `role_id -> parent_id`; removing a missing edge is a no-op
    pub async fn remove_inheritance(&self, role_id: RoleId, parent_id: RoleId) -> Result<Role> {
        let mut role = self.get(role_id).await?;

        if !role.inherits.remove(&parent_id) {
            return Ok(role);
        }

        let role = self.roles.update(role).await?;
        info!("Role {} no longer inherits from {}", role.name, parent_id);
        Ok(role)
    }

    /// Permissions of a role and all of its active ancestors
    ///
    /// With `as_records`, returns the active permission records sorted by
    /// `(module, action)`; otherwise the raw union of ids.
    pub async fn get_all_permissions(&self, role_id: RoleId, as_records: bool) -> Result<RolePermissions> {
        let role = self.get(role_id).await?;
        self.permissions_of(&role, as_records).await
    }

    /// [`get_all_permissions`](Self::get_all_permissions) for an already loaded role
    pub async fn permissions_of(&self, role: &Role, as_records: bool) -> Result<RolePermissions> {
        let closure = self.graph().closure(role, true).await?;

        let ids: BTreeSet<PermissionId> = closure
            .iter()
            .flat_map(|r| r.permissions.iter().copied())
            .collect();

        if !as_records {
            return Ok(RolePermissions::Ids(ids.into_iter().collect()));
        }

        if ids.is_empty() {
            return Ok(RolePermissions::Records(Vec::new()));
        }

        let mut records = self.permissions.find(&PermissionFilter::active_ids(ids)).await?;
        records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(RolePermissions::Records(records))
    }

    /// Validate a principal's role assignment
    ///
    /// Every role must exist, and a super-admin role may only be assigned
    /// on its own.
    pub async fn validate_assignment(&self, role_ids: &[RoleId]) -> Result<Vec<Role>> {
        let wanted: BTreeSet<RoleId> = role_ids.iter().copied().collect();
        let roles = self.roles.find(&RoleFilter::ids(wanted.iter().copied())).await?;

        if let Some(missing) = wanted.iter().find(|id| !roles.iter().any(|r| r.id == **id)) {
            return Err(AuthzError::role_not_found(missing));
        }

        if roles.len() > 1 {
            if let Some(admin) = roles.iter().find(|r| r.is_super_admin) {
                return Err(AuthzError::Validation(format!(
                    "Super-admin role {} cannot be combined with other roles",
                    admin.name
                )));
            }
        }

        Ok(roles)
    }

    /// Describe inheritance cycles present in stored data
    pub async fn inheritance_cycles(&self) -> Result<Vec<String>> {
        let graph = self.graph();
        let mut described = Vec::new();

        for cycle in graph.detect_cycles().await? {
            described.push(graph.describe_path(&cycle).await?);
        }

        Ok(described)
    }

    fn validate_name(name: &str) -> Result<String> {
        let name = normalize_key(name);
        if name.is_empty() {
            return Err(AuthzError::Validation("Role name cannot be empty".to_string()));
        }
        Ok(name)
    }

    async fn resolve_permissions(&self, refs: &[String]) -> Result<BTreeSet<PermissionId>> {
        let ids = self.normalizer.resolve_mixed_to_ids(refs).await?;

        if !refs.is_empty() && ids.is_empty() {
            return Err(AuthzError::Validation("no valid permissions resolved".to_string()));
        }

        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }

        // Re-check right before commit: a permission may have been
        // deactivated since it was normalized.
        let active: BTreeSet<PermissionId> = self
            .permissions
            .find(&PermissionFilter::active_ids(ids.iter().copied()))
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        if let Some(stale) = ids.iter().find(|id| !active.contains(*id)) {
            return Err(AuthzError::Validation(format!(
                "permission {} is no longer active",
                stale
            )));
        }

        Ok(active)
    }
}
