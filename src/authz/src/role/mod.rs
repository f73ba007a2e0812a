//! Roles and role inheritance
//!
//! A role carries a normalized permission set plus a list of parent roles.
//! Its transitive permissions are the union over itself and every active
//! ancestor.
//!
//! # Example
//!
//! ```rust,no_run
//! use rbac_authz::role::NewRole;
//! use rbac_authz::AuthzEngine;
//!
//! # async fn example(engine: AuthzEngine) -> rbac_authz::Result<()> {
//! let viewer = engine.roles().create(NewRole::new("viewer", ["VEHICLES.READ"])).await?;
//! let manager = engine.roles().create(NewRole::new("manager", ["VEHICLES.CREATE"])).await?;
//!
//! // MANAGER now carries VEHICLES_READ as well
//! engine.roles().add_inheritance(manager.id, viewer.id).await?;
//!
//! let all = engine.roles().get_all_permissions(manager.id, true).await?;
//! assert_eq!(all.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod graph;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use graph::InheritanceGraph;
pub use service::RoleService;
pub use types::{NewRole, Role, RolePermissions, RoleRefresh, RoleSeed, RoleUpdate};
