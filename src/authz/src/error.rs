//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
///
/// Mutations surface these synchronously and abort the write. The
/// authorization predicate itself never returns one.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Input was rejected (e.g. a role resolved to no valid permissions)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Adding an inheritance edge would create a cycle
    #[error("Circular inheritance on role {role}: {path}")]
    CircularInheritance {
        /// Role the edge was being added to
        role: String,
        /// Offending path, e.g. `A -> B -> A`
        path: String,
    },

    /// Referenced record does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind ("role", "permission")
        kind: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Unique role name or permission key already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Persistent store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid configuration or catalog
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Shorthand for a missing role
    pub fn role_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "role",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing permission
    pub fn permission_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "permission",
            id: id.to_string(),
        }
    }

    /// Stable machine-readable reason for rejected administrative operations
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::CircularInheritance { .. } => "circular_inheritance",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
            Self::Io(_) => "io",
        }
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
