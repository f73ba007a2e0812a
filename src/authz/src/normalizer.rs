//! Lenient permission reference normalization
//!
//! Converts a mixed list of canonical identifiers and `MODULE.ACTION`
//! keys into the deduplicated ids of active permissions. Unresolvable
//! entries are dropped without an error; callers needing strict behavior
//! compare cardinalities. Each drop is logged at `debug` since it is the
//! only trace a mistyped key leaves behind.

use crate::bootstrap::CatalogBootstrapper;
use crate::error::Result;
use crate::permission::PermissionRef;
use crate::store::{PermissionFilter, PermissionStore};
use crate::types::PermissionId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Resolves mixed permission references to canonical ids
#[derive(Clone)]
pub struct PermissionNormalizer {
    bootstrapper: CatalogBootstrapper,
    store: Arc<dyn PermissionStore>,
}

impl PermissionNormalizer {
    /// Create a normalizer; symbolic keys are validated against the
    /// bootstrapper's catalog
    pub fn new(bootstrapper: CatalogBootstrapper, store: Arc<dyn PermissionStore>) -> Self {
        Self { bootstrapper, store }
    }

    /// Resolve `refs` to sorted, deduplicated ids of active permissions
    pub async fn resolve_mixed_to_ids<S: AsRef<str>>(&self, refs: &[S]) -> Result<Vec<PermissionId>> {
        let mut ids = BTreeSet::new();
        let mut symbolic = BTreeSet::new();

        for raw in refs {
            match PermissionRef::classify(raw.as_ref()) {
                Some(PermissionRef::Id(id)) => {
                    ids.insert(id);
                }
                Some(PermissionRef::Symbolic { module, action }) => {
                    symbolic.insert((module, action));
                }
                None => debug!("Dropping malformed permission reference {:?}", raw.as_ref()),
            }
        }

        let mut resolved = BTreeSet::new();

        if !ids.is_empty() {
            let active = self
                .store
                .find(&PermissionFilter::active_ids(ids.iter().copied()))
                .await?;
            for permission in active {
                resolved.insert(permission.id);
            }
            for id in ids.iter().filter(|id| !resolved.contains(*id)) {
                debug!("Dropping unknown or inactive permission id {}", id);
            }
        }

        for (module, action) in symbolic {
            match self.bootstrapper.ensure_permission(&module, &action).await? {
                Some(permission) => {
                    resolved.insert(permission.id);
                }
                None => debug!("Dropping unresolvable permission key {}.{}", module, action),
            }
        }

        Ok(resolved.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogEntry};
    use crate::store::InMemoryStore;
    use uuid::Uuid;

    fn setup() -> (InMemoryStore, PermissionNormalizer) {
        let store = InMemoryStore::new();
        let catalog = Catalog::new(
            1,
            vec![CatalogEntry::new("VEHICLES", ["READ", "CREATE"], "FLEET")],
        )
        .unwrap();
        let permissions: Arc<dyn PermissionStore> = Arc::new(store.clone());
        let bootstrapper = CatalogBootstrapper::new(Arc::new(catalog), permissions.clone());
        (store, PermissionNormalizer::new(bootstrapper, permissions))
    }

    #[tokio::test]
    async fn test_duplicate_keys_collapse() {
        let (_, normalizer) = setup();

        let once = normalizer.resolve_mixed_to_ids(&["VEHICLES.READ"]).await.unwrap();
        let twice = normalizer
            .resolve_mixed_to_ids(&["VEHICLES.READ", "vehicles.read"])
            .await
            .unwrap();

        assert_eq!(once.len(), 1);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_unknown_key_is_dropped() {
        let (store, normalizer) = setup();

        let ids = normalizer.resolve_mixed_to_ids(&["UNKNOWN.ACTION"]).await.unwrap();
        assert!(ids.is_empty());

        let ids = normalizer.resolve_mixed_to_ids(&["VEHICLES.DELETE"]).await.unwrap();
        assert!(ids.is_empty());
        assert_eq!(store.permission_count().await, 0);
    }

    #[tokio::test]
    async fn test_mixed_ids_and_keys() {
        let (store, normalizer) = setup();

        let read = normalizer.resolve_mixed_to_ids(&["VEHICLES.READ"]).await.unwrap()[0];
        let create = normalizer.resolve_mixed_to_ids(&["VEHICLES.CREATE"]).await.unwrap()[0];
        store.set_active(create, false).await.unwrap();

        let refs = vec![
            read.to_string(),
            create.to_string(),
            Uuid::new_v4().to_string(),
            "VEHICLES.READ".to_string(),
            "not a reference".to_string(),
        ];
        let ids = normalizer.resolve_mixed_to_ids(&refs).await.unwrap();

        assert_eq!(ids, vec![read]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (_, normalizer) = setup();
        let ids = normalizer.resolve_mixed_to_ids::<&str>(&[]).await.unwrap();
        assert!(ids.is_empty());
    }
}
