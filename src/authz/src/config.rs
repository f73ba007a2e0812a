//! Engine configuration loading and validation

use crate::catalog::Catalog;
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete engine configuration
///
/// ```toml
/// log_level = "info"
/// wildcard_action = "ALL"
/// super_admin_role = "SUPERADMIN"
/// ensure_super_admin_role = true
///
/// [catalog]
/// version = 1
///
/// [[catalog.modules]]
/// module = "VEHICLES"
/// actions = ["READ", "CREATE"]
/// category = "FLEET"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log level used by binaries when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Action name granting every action of its module
    #[serde(default = "default_wildcard_action")]
    pub wildcard_action: String,

    /// Run bootstrap behind a process-wide lock even if the store claims
    /// atomic upserts
    #[serde(default)]
    pub serialize_bootstrap: bool,

    /// Name of the super-admin role
    #[serde(default = "default_super_admin_role")]
    pub super_admin_role: String,

    /// Create or reactivate the super-admin role at bootstrap
    #[serde(default = "default_true")]
    pub ensure_super_admin_role: bool,

    /// Record check counters
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Permission catalog
    #[serde(default)]
    pub catalog: Catalog,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_wildcard_action() -> String {
    "ALL".to_string()
}

fn default_super_admin_role() -> String {
    "SUPERADMIN".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            wildcard_action: default_wildcard_action(),
            serialize_bootstrap: false,
            super_admin_role: default_super_admin_role(),
            ensure_super_admin_role: true,
            enable_metrics: true,
            catalog: Catalog::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration with the given catalog and defaults elsewhere
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog,
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|e| AuthzError::Config(format!("Failed to parse config: {}", e)))?;
        config.normalized()
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            AuthzError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.normalized()
    }

    fn normalized(mut self) -> Result<Self> {
        self.catalog.normalize();
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.wildcard_action.trim().is_empty() {
            return Err(AuthzError::Config("wildcard_action cannot be empty".to_string()));
        }

        if self.ensure_super_admin_role && self.super_admin_role.trim().is_empty() {
            return Err(AuthzError::Config(
                "super_admin_role cannot be empty while ensure_super_admin_role is set".to_string(),
            ));
        }

        self.catalog.validate()
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AuthzError::Config(format!("Failed to serialize config: {}", e)))
    }
}
