//! Role service tests: normalization on save, inheritance edges, closures

use super::*;
use crate::bootstrap::CatalogBootstrapper;
use crate::catalog::{Catalog, CatalogEntry};
use crate::error::{AuthzError, Result};
use crate::normalizer::PermissionNormalizer;
use crate::permission::{Permission, PermissionRefresh, PermissionSeed};
use crate::store::{InMemoryStore, PermissionFilter, PermissionStore, RoleStore};
use crate::types::PermissionId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    store: InMemoryStore,
    roles: RoleService,
}

fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    let catalog = Catalog::new(
        1,
        vec![
            CatalogEntry::new("VEHICLES", ["READ", "CREATE", "DELETE"], "FLEET"),
            CatalogEntry::new("BOOKINGS", ["READ", "ALL"], "OPERATIONS"),
        ],
    )
    .unwrap();

    let permissions: Arc<dyn PermissionStore> = Arc::new(store.clone());
    let role_store: Arc<dyn RoleStore> = Arc::new(store.clone());
    let bootstrapper = CatalogBootstrapper::new(Arc::new(catalog), permissions.clone());
    let normalizer = PermissionNormalizer::new(bootstrapper, permissions.clone());

    Fixture {
        roles: RoleService::new(role_store, permissions, normalizer),
        store,
    }
}

fn keys(permissions: &RolePermissions) -> Vec<String> {
    match permissions {
        RolePermissions::Records(records) => records.iter().map(|p| p.canonical_key.clone()).collect(),
        RolePermissions::Ids(_) => panic!("expected records"),
    }
}

// ============================================================================
// Create / update
// ============================================================================

#[tokio::test]
async fn test_create_normalizes_permissions() {
    let f = fixture();

    let role = f
        .roles
        .create(NewRole::new("viewer", ["vehicles.read", "VEHICLES.READ", "UNKNOWN.ACTION"]))
        .await
        .unwrap();

    assert_eq!(role.name, "VIEWER");
    assert_eq!(role.permissions.len(), 1);

    let all = f.roles.get_all_permissions(role.id, true).await.unwrap();
    assert_eq!(keys(&all), vec!["VEHICLES_READ"]);
}

#[tokio::test]
async fn test_create_rejects_nothing_resolved() {
    let f = fixture();

    let result = f
        .roles
        .create(NewRole::new("broken", ["UNKNOWN.ACTION", "garbage"]))
        .await;

    match result {
        Err(AuthzError::Validation(msg)) => assert_eq!(msg, "no valid permissions resolved"),
        other => panic!("Expected Validation error, got {:?}", other),
    }
    assert_eq!(f.store.role_count().await, 0);
}

#[tokio::test]
async fn test_create_allows_empty_permission_list() {
    let f = fixture();
    let role = f
        .roles
        .create(NewRole::new("placeholder", Vec::<String>::new()))
        .await
        .unwrap();
    assert!(role.permissions.is_empty());
}

#[tokio::test]
async fn test_create_duplicate_name_conflicts() {
    let f = fixture();

    f.roles.create(NewRole::new("viewer", ["VEHICLES.READ"])).await.unwrap();
    let result = f.roles.create(NewRole::new("Viewer", ["VEHICLES.READ"])).await;

    assert!(matches!(result, Err(AuthzError::Conflict(_))));
}

#[tokio::test]
async fn test_create_with_missing_parent() {
    let f = fixture();

    let result = f
        .roles
        .create(NewRole::new("child", ["VEHICLES.READ"]).inheriting(Uuid::new_v4()))
        .await;

    assert!(matches!(result, Err(AuthzError::NotFound { kind: "role", .. })));
    assert_eq!(f.store.role_count().await, 0);
    // The rejected create must not lazily create VEHICLES_READ
    assert_eq!(f.store.permission_count().await, 0);
}

#[tokio::test]
async fn test_create_conflict_leaves_no_permissions() {
    let f = fixture();
    f.roles.create(NewRole::new("viewer", Vec::<String>::new())).await.unwrap();

    let result = f.roles.create(NewRole::new("VIEWER", ["VEHICLES.DELETE"])).await;

    assert!(matches!(result, Err(AuthzError::Conflict(_))));
    assert_eq!(f.store.permission_count().await, 0);
}

/// Deactivates `target` right after the first `find` has answered, i.e.
/// between normalization and the pre-commit check
struct DeactivatingStore {
    inner: InMemoryStore,
    target: PermissionId,
    finds: AtomicUsize,
}

#[async_trait]
impl PermissionStore for DeactivatingStore {
    async fn get(&self, id: PermissionId) -> Result<Option<Permission>> {
        PermissionStore::get(&self.inner, id).await
    }

    async fn find_by_key(&self, canonical_key: &str) -> Result<Option<Permission>> {
        self.inner.find_by_key(canonical_key).await
    }

    async fn find(&self, filter: &PermissionFilter) -> Result<Vec<Permission>> {
        let found = PermissionStore::find(&self.inner, filter).await?;
        if self.finds.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.set_active(self.target, false).await?;
        }
        Ok(found)
    }

    async fn upsert_by_key(
        &self,
        seed: PermissionSeed,
        refresh: PermissionRefresh,
    ) -> Result<Permission> {
        self.inner.upsert_by_key(seed, refresh).await
    }

    async fn set_active(&self, id: PermissionId, active: bool) -> Result<Permission> {
        self.inner.set_active(id, active).await
    }
}

#[tokio::test]
async fn test_create_fails_when_permission_deactivated_before_commit() {
    let store = InMemoryStore::new();
    let catalog = Arc::new(
        Catalog::new(1, vec![CatalogEntry::new("VEHICLES", ["READ"], "FLEET")]).unwrap(),
    );
    CatalogBootstrapper::new(catalog.clone(), Arc::new(store.clone()))
        .ensure_catalog()
        .await
        .unwrap();
    let read = store.find_by_key("VEHICLES_READ").await.unwrap().unwrap();

    let permissions: Arc<dyn PermissionStore> = Arc::new(DeactivatingStore {
        inner: store.clone(),
        target: read.id,
        finds: AtomicUsize::new(0),
    });
    let normalizer = PermissionNormalizer::new(
        CatalogBootstrapper::new(catalog, permissions.clone()),
        permissions.clone(),
    );
    let roles = RoleService::new(Arc::new(store.clone()), permissions, normalizer);

    let result = roles
        .create(NewRole::new("viewer", vec![read.id.to_string()]))
        .await;

    let expected = format!("permission {} is no longer active", read.id);
    assert!(matches!(result, Err(AuthzError::Validation(ref msg)) if *msg == expected));
    assert_eq!(store.role_count().await, 0);
    assert!(store.find_by_name("VIEWER").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_replaces_permissions() {
    let f = fixture();

    let role = f.roles.create(NewRole::new("editor", ["VEHICLES.READ"])).await.unwrap();
    let updated = f
        .roles
        .update(
            role.id,
            RoleUpdate {
                permissions: Some(vec!["VEHICLES.CREATE".into(), "VEHICLES.DELETE".into()]),
                description: Some("Edits vehicles".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.description, "Edits vehicles");
    let all = f.roles.get_all_permissions(role.id, true).await.unwrap();
    assert_eq!(keys(&all), vec!["VEHICLES_CREATE", "VEHICLES_DELETE"]);
}

#[tokio::test]
async fn test_update_drops_deactivated_permissions_on_resave() {
    let f = fixture();

    let role = f
        .roles
        .create(NewRole::new("editor", ["VEHICLES.READ", "VEHICLES.CREATE"]))
        .await
        .unwrap();
    let create_id = f.store.find_by_key("VEHICLES_CREATE").await.unwrap().unwrap().id;
    assert!(role.permissions.contains(&create_id));
    f.store.set_active(create_id, false).await.unwrap();

    // Saving without a permission list re-normalizes the stored ids
    let updated = f
        .roles
        .update(role.id, RoleUpdate { name: Some("writer".into()), ..Default::default() })
        .await
        .unwrap();

    assert_eq!(updated.name, "WRITER");
    assert_eq!(updated.permissions.len(), 1);
    assert!(!updated.permissions.contains(&create_id));
}

#[tokio::test]
async fn test_update_fails_when_everything_deactivated() {
    let f = fixture();

    let role = f.roles.create(NewRole::new("viewer", ["VEHICLES.READ"])).await.unwrap();
    let only = *role.permissions.iter().next().unwrap();
    f.store.set_active(only, false).await.unwrap();

    let result = f.roles.update(role.id, RoleUpdate::default()).await;
    assert!(matches!(result, Err(AuthzError::Validation(_))));

    // Stored record untouched
    let stored = f.roles.get(role.id).await.unwrap();
    assert_eq!(stored.permissions, role.permissions);
}

#[tokio::test]
async fn test_update_missing_role() {
    let f = fixture();
    let result = f.roles.update(Uuid::new_v4(), RoleUpdate::default()).await;
    assert!(matches!(result, Err(AuthzError::NotFound { .. })));
}

// ============================================================================
// Inheritance
// ============================================================================

#[tokio::test]
async fn test_chain_union_is_deduplicated() {
    let f = fixture();

    let c = f
        .roles
        .create(NewRole::new("c", ["VEHICLES.READ", "BOOKINGS.READ"]))
        .await
        .unwrap();
    let b = f
        .roles
        .create(NewRole::new("b", ["VEHICLES.READ", "VEHICLES.CREATE"]))
        .await
        .unwrap();
    let a = f
        .roles
        .create(NewRole::new("a", ["VEHICLES.CREATE", "VEHICLES.DELETE"]))
        .await
        .unwrap();

    f.roles.add_inheritance(a.id, b.id).await.unwrap();
    f.roles.add_inheritance(b.id, c.id).await.unwrap();

    let all = f.roles.get_all_permissions(a.id, true).await.unwrap();
    assert_eq!(
        keys(&all),
        vec!["BOOKINGS_READ", "VEHICLES_CREATE", "VEHICLES_DELETE", "VEHICLES_READ"]
    );

    let ids = f.roles.get_all_permissions(a.id, false).await.unwrap();
    assert!(matches!(ids, RolePermissions::Ids(_)));
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn test_cycle_is_rejected_and_graph_unchanged() {
    let f = fixture();

    let a = f.roles.create(NewRole::new("a", ["VEHICLES.READ"])).await.unwrap();
    let b = f.roles.create(NewRole::new("b", ["VEHICLES.READ"])).await.unwrap();
    let c = f.roles.create(NewRole::new("c", ["VEHICLES.READ"])).await.unwrap();

    f.roles.add_inheritance(a.id, b.id).await.unwrap();
    f.roles.add_inheritance(b.id, c.id).await.unwrap();

    let result = f.roles.add_inheritance(c.id, a.id).await;
    match result {
        Err(AuthzError::CircularInheritance { role, path }) => {
            assert_eq!(role, "C");
            assert_eq!(path, "C -> A -> B -> C");
        }
        other => panic!("Expected CircularInheritance, got {:?}", other),
    }

    let c_after = f.roles.get(c.id).await.unwrap();
    assert!(c_after.inherits.is_empty());
    assert!(f.roles.inheritance_cycles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_self_inheritance_is_rejected() {
    let f = fixture();
    let a = f.roles.create(NewRole::new("a", ["VEHICLES.READ"])).await.unwrap();

    let result = f.roles.add_inheritance(a.id, a.id).await;
    match result {
        Err(AuthzError::CircularInheritance { path, .. }) => assert_eq!(path, "A -> A"),
        other => panic!("Expected CircularInheritance, got {:?}", other),
    }
}

#[tokio::test]
async fn test_add_inheritance_is_idempotent() {
    let f = fixture();
    let a = f.roles.create(NewRole::new("a", ["VEHICLES.READ"])).await.unwrap();
    let b = f.roles.create(NewRole::new("b", ["VEHICLES.CREATE"])).await.unwrap();

    f.roles.add_inheritance(a.id, b.id).await.unwrap();
    let again = f.roles.add_inheritance(a.id, b.id).await.unwrap();
    assert_eq!(again.inherits.len(), 1);
}

#[tokio::test]
async fn test_add_inheritance_missing_parent() {
    let f = fixture();
    let a = f.roles.create(NewRole::new("a", ["VEHICLES.READ"])).await.unwrap();

    let result = f.roles.add_inheritance(a.id, Uuid::new_v4()).await;
    assert!(matches!(result, Err(AuthzError::NotFound { kind: "role", .. })));
}

#[tokio::test]
async fn test_remove_inheritance() {
    let f = fixture();
    let a = f.roles.create(NewRole::new("a", ["VEHICLES.READ"])).await.unwrap();
    let b = f.roles.create(NewRole::new("b", ["VEHICLES.CREATE"])).await.unwrap();

    f.roles.add_inheritance(a.id, b.id).await.unwrap();
    assert_eq!(f.roles.get_all_permissions(a.id, false).await.unwrap().len(), 2);

    let a = f.roles.remove_inheritance(a.id, b.id).await.unwrap();
    assert!(a.inherits.is_empty());
    assert_eq!(f.roles.get_all_permissions(a.id, false).await.unwrap().len(), 1);

    // Removing again is a no-op; the reverse edge is now allowed
    f.roles.remove_inheritance(a.id, b.id).await.unwrap();
    f.roles.add_inheritance(b.id, a.id).await.unwrap();
}

#[tokio::test]
async fn test_inactive_ancestor_contributes_nothing() {
    let f = fixture();
    let a = f.roles.create(NewRole::new("a", ["VEHICLES.READ"])).await.unwrap();
    let b = f.roles.create(NewRole::new("b", ["VEHICLES.CREATE"])).await.unwrap();
    f.roles.add_inheritance(a.id, b.id).await.unwrap();

    f.roles
        .update(b.id, RoleUpdate { active: Some(false), ..Default::default() })
        .await
        .unwrap();

    let all = f.roles.get_all_permissions(a.id, true).await.unwrap();
    assert_eq!(keys(&all), vec!["VEHICLES_READ"]);
}

#[tokio::test]
async fn test_legacy_cycle_terminates() {
    let f = fixture();
    let a = f.roles.create(NewRole::new("a", ["VEHICLES.READ"])).await.unwrap();
    let b = f.roles.create(NewRole::new("b", ["VEHICLES.CREATE"])).await.unwrap();
    f.roles.add_inheritance(a.id, b.id).await.unwrap();

    // Write b -> a around validation
    let mut corrupted = f.roles.get(b.id).await.unwrap();
    corrupted.inherits.insert(a.id);
    f.store.put_role_unchecked(corrupted).await;

    let all = f.roles.get_all_permissions(a.id, true).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(f.roles.inheritance_cycles().await.unwrap().len(), 1);
}

// ============================================================================
// Assignment validation
// ============================================================================

#[tokio::test]
async fn test_validate_assignment() {
    let f = fixture();
    let viewer = f.roles.create(NewRole::new("viewer", ["VEHICLES.READ"])).await.unwrap();
    let editor = f.roles.create(NewRole::new("editor", ["VEHICLES.CREATE"])).await.unwrap();
    let root = f
        .roles
        .create(NewRole::new("root", Vec::<String>::new()).super_admin())
        .await
        .unwrap();

    assert_eq!(f.roles.validate_assignment(&[viewer.id, editor.id]).await.unwrap().len(), 2);
    assert_eq!(f.roles.validate_assignment(&[root.id]).await.unwrap().len(), 1);

    let result = f.roles.validate_assignment(&[root.id, viewer.id]).await;
    assert!(matches!(result, Err(AuthzError::Validation(_))));

    let result = f.roles.validate_assignment(&[viewer.id, Uuid::new_v4()]).await;
    assert!(matches!(result, Err(AuthzError::NotFound { .. })));
}
