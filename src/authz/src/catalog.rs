//! Static permission catalog
//!
//! The catalog is the read-only table of `{module, actions, category}`
//! entries that every canonical permission is derived from. It is loaded
//! once from configuration and injected into the bootstrapper and the
//! normalizer as an `Arc<Catalog>`.

use crate::error::{AuthzError, Result};
use crate::types::{canonical_key, normalize_key};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One catalog row: a module and the actions it allows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Module key (e.g. "VEHICLES")
    pub module: String,

    /// Allowed actions (e.g. "READ", "CREATE", "ALL")
    pub actions: BTreeSet<String>,

    /// Grouping shown to administrators
    #[serde(default)]
    pub category: String,
}

impl CatalogEntry {
    /// Create a new catalog entry; keys are upper-cased
    pub fn new<I, S>(module: &str, actions: I, category: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            module: normalize_key(module),
            actions: actions
                .into_iter()
                .map(|a| normalize_key(a.as_ref()))
                .collect(),
            category: category.into(),
        }
    }

    /// Human-readable description for a permission of this module
    pub fn describe(&self, action: &str) -> String {
        let category = if self.category.is_empty() {
            String::new()
        } else {
            format!(" ({})", self.category)
        };
        format!("{} {}{}", action, self.module, category)
    }
}

/// Versioned permission catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog version, bumped whenever entries change
    #[serde(default)]
    pub version: u32,

    /// Module entries
    #[serde(default)]
    pub modules: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog from entries, normalizing and validating them
    pub fn new(version: u32, modules: Vec<CatalogEntry>) -> Result<Self> {
        let mut catalog = Self { version, modules };
        catalog.normalize();
        catalog.validate()?;
        Ok(catalog)
    }

    /// Upper-case every module and action key in place
    pub fn normalize(&mut self) {
        for entry in &mut self.modules {
            entry.module = normalize_key(&entry.module);
            entry.actions = entry.actions.iter().map(|a| normalize_key(a)).collect();
        }
    }

    /// Validate the catalog definition
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut keys: HashMap<String, (&str, &str)> = HashMap::new();

        for entry in &self.modules {
            if entry.module.is_empty() {
                return Err(AuthzError::Config(
                    "Catalog module key cannot be empty".to_string(),
                ));
            }

            if entry.actions.is_empty() {
                return Err(AuthzError::Config(format!(
                    "Catalog module '{}' must declare at least one action",
                    entry.module
                )));
            }

            if entry.actions.iter().any(|a| a.is_empty()) {
                return Err(AuthzError::Config(format!(
                    "Catalog module '{}' has an empty action",
                    entry.module
                )));
            }

            if !seen.insert(entry.module.as_str()) {
                return Err(AuthzError::Config(format!(
                    "Catalog module '{}' is declared twice",
                    entry.module
                )));
            }

            for action in &entry.actions {
                let key = canonical_key(&entry.module, action);
                let pair = (entry.module.as_str(), action.as_str());
                if let Some((module, other)) = keys.insert(key.clone(), pair) {
                    return Err(AuthzError::Config(format!(
                        "Catalog pairs {}.{} and {}.{} share the canonical key {}",
                        module, other, entry.module, action, key
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a module entry (case-insensitive)
    pub fn entry(&self, module: &str) -> Option<&CatalogEntry> {
        let module = normalize_key(module);
        self.modules.iter().find(|e| e.module == module)
    }

    /// Whether the catalog allows `action` on `module` (case-insensitive)
    pub fn allows(&self, module: &str, action: &str) -> bool {
        self.entry(module)
            .map(|e| e.actions.contains(&normalize_key(action)))
            .unwrap_or(false)
    }

    /// Every `(entry, action)` pair in the catalog
    pub fn pairs(&self) -> impl Iterator<Item = (&CatalogEntry, &str)> {
        self.modules
            .iter()
            .flat_map(|e| e.actions.iter().map(move |a| (e, a.as_str())))
    }

    /// Number of `(module, action)` pairs
    pub fn len(&self) -> usize {
        self.modules.iter().map(|e| e.actions.len()).sum()
    }

    /// Whether the catalog has no pairs at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet_catalog() -> Catalog {
        Catalog::new(
            1,
            vec![
                CatalogEntry::new("vehicles", ["read", "create"], "FLEET"),
                CatalogEntry::new("BOOKINGS", ["READ", "ALL"], "OPERATIONS"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = fleet_catalog();

        assert!(catalog.allows("VEHICLES", "READ"));
        assert!(catalog.allows("vehicles", "create"));
        assert!(catalog.allows("bookings", "all"));
        assert!(!catalog.allows("VEHICLES", "DELETE"));
        assert!(!catalog.allows("UNKNOWN", "READ"));
    }

    #[test]
    fn test_pairs() {
        let catalog = fleet_catalog();
        assert_eq!(catalog.len(), 4);

        let pairs: Vec<_> = catalog.pairs().map(|(e, a)| format!("{}.{}", e.module, a)).collect();
        assert!(pairs.contains(&"VEHICLES.READ".to_string()));
        assert!(pairs.contains(&"BOOKINGS.ALL".to_string()));
    }

    #[test]
    fn test_validation() {
        // Duplicate module
        let result = Catalog::new(
            1,
            vec![
                CatalogEntry::new("VEHICLES", ["READ"], ""),
                CatalogEntry::new("vehicles", ["CREATE"], ""),
            ],
        );
        assert!(matches!(result, Err(AuthzError::Config(_))));

        // No actions
        let result = Catalog::new(1, vec![CatalogEntry::new("VEHICLES", Vec::<String>::new(), "")]);
        assert!(matches!(result, Err(AuthzError::Config(_))));

        // Empty module key
        let result = Catalog::new(1, vec![CatalogEntry::new("  ", ["READ"], "")]);
        assert!(matches!(result, Err(AuthzError::Config(_))));
    }

    #[test]
    fn test_rejects_canonical_key_collision() {
        let result = Catalog::new(
            1,
            vec![
                CatalogEntry::new("KYC_DOCS", ["READ"], ""),
                CatalogEntry::new("KYC", ["DOCS_READ", "APPROVE"], ""),
            ],
        );

        match result {
            Err(AuthzError::Config(msg)) => assert!(msg.contains("KYC_DOCS_READ")),
            other => panic!("expected Config error, got {:?}", other),
        }

        // Underscores alone are fine while keys stay distinct
        assert!(Catalog::new(
            1,
            vec![
                CatalogEntry::new("KYC_DOCS", ["READ"], ""),
                CatalogEntry::new("KYC", ["APPROVE"], ""),
            ],
        )
        .is_ok());
    }

    #[test]
    fn test_describe() {
        let entry = CatalogEntry::new("VEHICLES", ["READ"], "FLEET");
        assert_eq!(entry.describe("READ"), "READ VEHICLES (FLEET)");

        let entry = CatalogEntry::new("VEHICLES", ["READ"], "");
        assert_eq!(entry.describe("READ"), "READ VEHICLES");
    }
}
