//! Idempotent catalog bootstrap
//!
//! [`CatalogBootstrapper::ensure_catalog`] upserts one permission per
//! `(module, action)` catalog pair. Identity fields ([`PermissionSeed`])
//! are written only on creation and presentation fields
//! ([`PermissionRefresh`]) on every call, so the two never touch the same
//! field and repeated or concurrent runs converge on the same set.

use crate::catalog::Catalog;
use crate::error::{AuthzError, Result};
use crate::permission::{Permission, PermissionRefresh, PermissionSeed};
use crate::role::{Role, RoleRefresh, RoleSeed};
use crate::store::{PermissionStore, RoleStore};
use crate::types::{canonical_key, normalize_key};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Process-wide lock for stores without atomic upsert
fn bootstrap_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Ensures every catalog pair has an active canonical permission
#[derive(Clone)]
pub struct CatalogBootstrapper {
    catalog: Arc<Catalog>,
    store: Arc<dyn PermissionStore>,
    serialize: bool,
}

impl CatalogBootstrapper {
    /// Create a bootstrapper; serialization is enabled automatically when
    /// the store cannot upsert atomically
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn PermissionStore>) -> Self {
        let serialize = !store.supports_atomic_upsert();
        Self {
            catalog,
            store,
            serialize,
        }
    }

    /// Force bootstrap to run behind the process-wide lock
    pub fn serialized(mut self, serialize: bool) -> Self {
        self.serialize = self.serialize || serialize;
        self
    }

    /// The catalog this bootstrapper enforces
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Upsert every catalog permission and return them sorted by
    /// `(module, action)`
    pub async fn ensure_catalog(&self) -> Result<Vec<Permission>> {
        let _guard = if self.serialize {
            Some(bootstrap_lock().lock().await)
        } else {
            None
        };

        // Refuse before writing anything if a stored key belongs to another pair
        for (entry, action) in self.catalog.pairs() {
            let key = canonical_key(&entry.module, action);
            if let Some(existing) = self.store.find_by_key(&key).await? {
                Self::check_identity(existing, &entry.module, action)?;
            }
        }

        let mut permissions = Vec::with_capacity(self.catalog.len());

        for (entry, action) in self.catalog.pairs() {
            let permission = self
                .store
                .upsert_by_key(
                    PermissionSeed::new(&entry.module, action),
                    PermissionRefresh {
                        description: entry.describe(action),
                        category: entry.category.clone(),
                        active: true,
                    },
                )
                .await?;
            permissions.push(Self::check_identity(permission, &entry.module, action)?);
        }

        permissions.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        info!(
            "Catalog v{} ensured: {} permissions across {} modules",
            self.catalog.version,
            permissions.len(),
            self.catalog.modules.len()
        );

        Ok(permissions)
    }

    /// Resolve a single catalog pair, creating it if it does not exist yet
    ///
    /// Returns `None` when the catalog does not allow the pair, or when the
    /// permission exists but was deactivated by an administrator. Unlike
    /// [`ensure_catalog`](Self::ensure_catalog) this never reactivates.
    pub async fn ensure_permission(&self, module: &str, action: &str) -> Result<Option<Permission>> {
        let Some(entry) = self.catalog.entry(module) else {
            return Ok(None);
        };
        let action = normalize_key(action);
        if !entry.actions.contains(&action) {
            return Ok(None);
        }

        if let Some(existing) = self.store.find_by_key(&canonical_key(module, &action)).await? {
            let existing = Self::check_identity(existing, &entry.module, &action)?;
            return Ok(existing.active.then_some(existing));
        }

        let permission = self
            .store
            .upsert_by_key(
                PermissionSeed::new(&entry.module, &action),
                PermissionRefresh {
                    description: entry.describe(&action),
                    category: entry.category.clone(),
                    active: true,
                },
            )
            .await?;
        let permission = Self::check_identity(permission, &entry.module, &action)?;

        info!("Lazily created permission {}", permission.canonical_key);
        Ok(Some(permission))
    }

    /// Reject a record stored under the same canonical key for a different
    /// `(module, action)` pair, e.g. `KYC_DOCS.READ` vs `KYC.DOCS_READ`
    fn check_identity(permission: Permission, module: &str, action: &str) -> Result<Permission> {
        if permission.module == module && permission.action == action {
            return Ok(permission);
        }

        Err(AuthzError::Conflict(format!(
            "Permission key {} belongs to {}.{}, not {}.{}",
            permission.canonical_key, permission.module, permission.action, module, action
        )))
    }

    /// Idempotently ensure an active super-admin role named `name`
    pub async fn ensure_super_admin_role(&self, roles: &dyn RoleStore, name: &str) -> Result<Role> {
        let role = roles
            .upsert_by_name(
                RoleSeed::new(name, "Unrestricted access to every module"),
                RoleRefresh {
                    active: true,
                    is_super_admin: true,
                },
            )
            .await?;

        debug!("Super-admin role {} ensured ({})", role.name, role.id);
        Ok(role)
    }
}
