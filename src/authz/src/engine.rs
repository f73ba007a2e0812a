//! Authorization engine facade
//!
//! Wires the catalog bootstrapper, normalizer, role service, resolver and
//! checker together from an [`EngineConfig`] over a pair of stores.
//!
//! ```text
//! Catalog → CatalogBootstrapper → PermissionStore ← PermissionNormalizer
//!                                       ↑                  ↓
//!                                 RoleService ────→ RoleStore
//!                                       ↓
//! Principal → EffectivePermissionResolver → AuthorizationChecker → bool
//!                                                     ↓
//!                                                 [Metrics]
//! ```

use crate::bootstrap::CatalogBootstrapper;
use crate::catalog::Catalog;
use crate::checker::AuthorizationChecker;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::normalizer::PermissionNormalizer;
use crate::permission::Permission;
use crate::principal::Principal;
use crate::resolver::{EffectivePermissionResolver, EffectivePermissions};
use crate::role::{Role, RoleService};
use crate::store::{InMemoryStore, PermissionStore, RoleStore};
use crate::types::PermissionId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Entry point for hosting layers
pub struct AuthzEngine {
    config: EngineConfig,
    permission_store: Arc<dyn PermissionStore>,
    role_store: Arc<dyn RoleStore>,
    bootstrapper: CatalogBootstrapper,
    normalizer: PermissionNormalizer,
    roles: RoleService,
    resolver: EffectivePermissionResolver,
    checker: AuthorizationChecker,
    metrics: Option<MetricsCollector>,
}

impl AuthzEngine {
    /// Create an engine over the given stores
    ///
    /// Validates `config` but does not touch the stores; call
    /// [`ensure_catalog`](Self::ensure_catalog) at startup.
    pub fn new(
        config: EngineConfig,
        permission_store: Arc<dyn PermissionStore>,
        role_store: Arc<dyn RoleStore>,
    ) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(config.catalog.clone());
        let bootstrapper = CatalogBootstrapper::new(catalog, permission_store.clone())
            .serialized(config.serialize_bootstrap);
        let normalizer = PermissionNormalizer::new(bootstrapper.clone(), permission_store.clone());
        let roles = RoleService::new(
            role_store.clone(),
            permission_store.clone(),
            normalizer.clone(),
        );
        let resolver = EffectivePermissionResolver::new(
            roles.clone(),
            role_store.clone(),
            permission_store.clone(),
        );

        let metrics = config.enable_metrics.then(MetricsCollector::new);
        let mut checker = AuthorizationChecker::new(resolver.clone(), &config.wildcard_action);
        if let Some(metrics) = &metrics {
            checker = checker.with_metrics(metrics.clone());
        }

        info!(
            "AuthzEngine initialized: catalog v{} ({} modules), metrics={}",
            config.catalog.version,
            config.catalog.modules.len(),
            config.enable_metrics
        );

        Ok(Self {
            config,
            permission_store,
            role_store,
            bootstrapper,
            normalizer,
            roles,
            resolver,
            checker,
            metrics,
        })
    }

    /// Create an engine backed by a fresh [`InMemoryStore`]
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(InMemoryStore::new());
        Self::new(config, store.clone(), store)
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Permission catalog
    pub fn catalog(&self) -> &Catalog {
        self.bootstrapper.catalog()
    }

    /// Bootstrap the catalog and, if configured, the super-admin role
    ///
    /// Safe to call repeatedly and concurrently.
    pub async fn ensure_catalog(&self) -> Result<Vec<Permission>> {
        let permissions = self.bootstrapper.ensure_catalog().await?;

        if self.config.ensure_super_admin_role {
            self.bootstrapper
                .ensure_super_admin_role(self.role_store.as_ref(), &self.config.super_admin_role)
                .await?;
        }

        Ok(permissions)
    }

    /// The configured super-admin role, if it exists
    pub async fn super_admin_role(&self) -> Result<Option<Role>> {
        self.role_store.find_by_name(&self.config.super_admin_role).await
    }

    /// Resolve mixed permission references to ids of active permissions
    pub async fn resolve_mixed_to_ids<S: AsRef<str>>(&self, refs: &[S]) -> Result<Vec<PermissionId>> {
        self.normalizer.resolve_mixed_to_ids(refs).await
    }

    /// Deactivate a permission; it stops counting on the next check
    pub async fn deactivate_permission(&self, id: PermissionId) -> Result<Permission> {
        let permission = self.permission_store.set_active(id, false).await?;
        info!("Deactivated permission {}", permission.canonical_key);
        Ok(permission)
    }

    /// Reactivate a previously deactivated permission
    pub async fn reactivate_permission(&self, id: PermissionId) -> Result<Permission> {
        let permission = self.permission_store.set_active(id, true).await?;
        info!("Reactivated permission {}", permission.canonical_key);
        Ok(permission)
    }

    /// Resolve a principal's effective permissions
    pub async fn compute(&self, principal: &Principal) -> Result<EffectivePermissions> {
        self.resolver.compute(principal).await
    }

    /// Resolve a principal's effective permissions at `now`
    pub async fn compute_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<EffectivePermissions> {
        self.resolver.compute_at(principal, now).await
    }

    /// Whether `principal` may perform `action` on `module`
    pub async fn has_permission(&self, principal: &Principal, module: &str, action: &str) -> bool {
        self.checker.has_permission(principal, module, action).await
    }

    /// Role administration
    pub fn roles(&self) -> &RoleService {
        &self.roles
    }

    /// Permission normalizer
    pub fn normalizer(&self) -> &PermissionNormalizer {
        &self.normalizer
    }

    /// Effective permission resolver
    pub fn resolver(&self) -> &EffectivePermissionResolver {
        &self.resolver
    }

    /// Authorization checker
    pub fn checker(&self) -> &AuthorizationChecker {
        &self.checker
    }

    /// Check metrics, when enabled
    pub fn metrics(&self) -> Option<&MetricsCollector> {
        self.metrics.as_ref()
    }
}
