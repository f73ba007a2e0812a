//! Core identifier types shared across the engine

use uuid::Uuid;

/// Store-assigned canonical permission identifier
pub type PermissionId = Uuid;

/// Store-assigned role identifier
pub type RoleId = Uuid;

/// Principal (user) identifier, owned by the user-management component
pub type PrincipalId = String;

/// Upper-case and trim a module or action key
pub fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

/// Canonical permission key: `<MODULE>_<ACTION>`
pub fn canonical_key(module: &str, action: &str) -> String {
    format!("{}_{}", normalize_key(module), normalize_key(action))
}
