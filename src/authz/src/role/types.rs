//! Role type definitions

use crate::permission::Permission;
use crate::types::{normalize_key, PermissionId, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Persisted role
///
/// `permissions` only ever holds ids of permissions that were active at
/// the last successful save. `inherits` lists parent roles whose
/// permissions this role also carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Store-assigned identifier
    pub id: RoleId,

    /// Unique, upper-cased role name
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Directly attached permission ids
    #[serde(default)]
    pub permissions: BTreeSet<PermissionId>,

    /// Parent roles (inheritance edges)
    #[serde(default)]
    pub inherits: BTreeSet<RoleId>,

    /// Inactive roles grant nothing
    pub active: bool,

    /// Holding this role grants every permission
    #[serde(default)]
    pub is_super_admin: bool,
}

impl Role {
    /// Create an active, empty role with a fresh id
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: normalize_key(name),
            description: String::new(),
            permissions: BTreeSet::new(),
            inherits: BTreeSet::new(),
            active: true,
            is_super_admin: false,
        }
    }

    /// Build a role from its insert-once and refreshed halves
    pub fn from_parts(id: RoleId, seed: RoleSeed, refresh: RoleRefresh) -> Self {
        Self {
            id,
            name: seed.name,
            description: seed.description,
            permissions: BTreeSet::new(),
            inherits: BTreeSet::new(),
            active: refresh.active,
            is_super_admin: refresh.is_super_admin,
        }
    }

    /// Apply the refreshed fields
    pub fn refresh(&mut self, refresh: RoleRefresh) {
        self.active = refresh.active;
        self.is_super_admin = refresh.is_super_admin;
    }
}

/// Role fields written only on creation by an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSeed {
    pub name: String,
    pub description: String,
}

impl RoleSeed {
    /// Seed with an upper-cased name
    pub fn new(name: &str, description: impl Into<String>) -> Self {
        Self {
            name: normalize_key(name),
            description: description.into(),
        }
    }
}

/// Role fields written on every upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRefresh {
    pub active: bool,
    pub is_super_admin: bool,
}

/// Input for creating a role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    /// Role name, upper-cased on save
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Mixed permission references (ids or `MODULE.ACTION` keys)
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Parent role ids, each checked for cycles
    #[serde(default)]
    pub inherits: Vec<RoleId>,

    #[serde(default)]
    pub is_super_admin: bool,
}

impl NewRole {
    /// Role input with a name and permission references
    pub fn new<I, S>(name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Add a parent role
    pub fn inheriting(mut self, parent: RoleId) -> Self {
        self.inherits.push(parent);
        self
    }

    /// Mark the role as super-admin
    pub fn super_admin(mut self) -> Self {
        self.is_super_admin = true;
        self
    }
}

/// Partial update of a role; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replacement permission references; when absent the current set is
    /// re-normalized
    pub permissions: Option<Vec<String>>,
    pub active: Option<bool>,
    pub is_super_admin: Option<bool>,
}

/// Transitive permissions of a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolePermissions {
    /// Raw permission ids
    Ids(Vec<PermissionId>),

    /// Active permission records sorted by `(module, action)`
    Records(Vec<Permission>),
}

impl RolePermissions {
    /// Number of entries
    pub fn len(&self) -> usize {
        match self {
            Self::Ids(ids) => ids.len(),
            Self::Records(records) => records.len(),
        }
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Permission ids, regardless of representation
    pub fn ids(&self) -> Vec<PermissionId> {
        match self {
            Self::Ids(ids) => ids.clone(),
            Self::Records(records) => records.iter().map(|p| p.id).collect(),
        }
    }
}
