//! # RBAC Authorization Engine
//!
//! Role-based authorization with inheritance, time-bounded grants and a
//! catalog-driven permission set.
//!
//! ## Features
//!
//! - **Idempotent catalog bootstrap** safe under concurrent startup
//! - **Mixed permission references** (`MODULE.ACTION` keys or canonical ids)
//! - **Role inheritance** with cycle rejection on every new edge
//! - **Direct and delegated grants** with lazy expiry
//! - **Super-admin bypass** as a sentinel in the effective set
//! - **Error-free checks** suitable for every request's hot path
//!
//! ## Example
//!
//! ```rust
//! use rbac_authz::{AuthzEngine, Catalog, CatalogEntry, EngineConfig, NewRole, Principal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::new(1, vec![CatalogEntry::new("VEHICLES", ["READ", "CREATE"], "FLEET")])?;
//!     let engine = AuthzEngine::in_memory(EngineConfig::with_catalog(catalog))?;
//!     engine.ensure_catalog().await?;
//!
//!     let viewer = engine.roles().create(NewRole::new("viewer", ["VEHICLES.READ"])).await?;
//!     let alice = Principal::new("user:alice").with_role(viewer.id);
//!
//!     assert!(engine.has_permission(&alice, "VEHICLES", "READ").await);
//!     assert!(!engine.has_permission(&alice, "VEHICLES", "CREATE").await);
//!
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod catalog;
pub mod checker;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod normalizer;
pub mod permission;
pub mod principal;
pub mod resolver;
pub mod role;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use bootstrap::CatalogBootstrapper;
pub use catalog::{Catalog, CatalogEntry};
pub use checker::AuthorizationChecker;
pub use config::EngineConfig;
pub use engine::AuthzEngine;
pub use error::{AuthzError, Result};
pub use metrics::{CheckMetrics, MetricsCollector};
pub use normalizer::PermissionNormalizer;
pub use permission::{Permission, PermissionRef};
pub use principal::{DelegatedGrant, DirectGrant, Principal};
pub use resolver::{EffectivePermission, EffectivePermissionResolver, EffectivePermissions, GrantSource};
pub use role::{NewRole, Role, RolePermissions, RoleService, RoleUpdate};
pub use store::{InMemoryStore, PermissionFilter, PermissionStore, RoleFilter, RoleStore};
pub use types::{PermissionId, PrincipalId, RoleId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
