//! Permission records and permission references
//!
//! A permission reference arriving from an administrator is either a
//! canonical identifier (a UUID assigned by the store) or a symbolic
//! `MODULE.ACTION` key. [`PermissionRef::classify`] turns the raw string
//! into a tagged variant once, at the boundary, so consumers never
//! inspect strings themselves.

use crate::types::{canonical_key, normalize_key, PermissionId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// Persisted permission record
///
/// Permissions are never hard-deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Canonical identifier
    pub id: PermissionId,

    /// Upper-cased module key
    pub module: String,

    /// Upper-cased action key
    pub action: String,

    /// Globally unique `<MODULE>_<ACTION>`
    pub canonical_key: String,

    /// Catalog category
    pub category: String,

    /// Human-readable description
    pub description: String,

    /// Inactive permissions are ignored everywhere
    pub active: bool,
}

impl Permission {
    /// Build a new record from its insert-once and refreshed halves
    pub fn from_parts(id: PermissionId, seed: PermissionSeed, refresh: PermissionRefresh) -> Self {
        Self {
            id,
            module: seed.module,
            action: seed.action,
            canonical_key: seed.canonical_key,
            category: refresh.category,
            description: refresh.description,
            active: refresh.active,
        }
    }

    /// Apply the refreshed fields, leaving insert-once fields untouched
    pub fn refresh(&mut self, refresh: PermissionRefresh) {
        self.category = refresh.category;
        self.description = refresh.description;
        self.active = refresh.active;
    }

    /// Sort key used when materializing permission lists
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.module, &self.action)
    }
}

/// Fields written only when a permission is first created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSeed {
    pub module: String,
    pub action: String,
    pub canonical_key: String,
}

impl PermissionSeed {
    /// Seed for `(module, action)`; keys are upper-cased
    pub fn new(module: &str, action: &str) -> Self {
        Self {
            module: normalize_key(module),
            action: normalize_key(action),
            canonical_key: canonical_key(module, action),
        }
    }
}

/// Fields refreshed on every bootstrap upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRefresh {
    pub description: String,
    pub category: String,
    pub active: bool,
}

/// A classified permission reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PermissionRef {
    /// Canonical identifier of an existing record
    Id(PermissionId),

    /// Symbolic `MODULE.ACTION` key, upper-cased
    Symbolic { module: String, action: String },
}

fn symbolic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)$").expect("symbolic key pattern is valid")
    })
}

impl PermissionRef {
    /// Classify a raw reference
    ///
    /// Returns `None` for strings that are neither a canonical identifier
    /// nor a `MODULE.ACTION` key.
    pub fn classify(raw: &str) -> Option<Self> {
        let raw = raw.trim();

        if let Ok(id) = Uuid::parse_str(raw) {
            return Some(Self::Id(id));
        }

        let captures = symbolic_pattern().captures(raw)?;
        Some(Self::Symbolic {
            module: normalize_key(&captures[1]),
            action: normalize_key(&captures[2]),
        })
    }
}

impl std::fmt::Display for PermissionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Symbolic { module, action } => write!(f, "{}.{}", module, action),
        }
    }
}
