//! Error types for Tessera Core

use crate::acl::AccessLevel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Participant '{participant}' does not have '{access}' access to resource '{resource}'")]
    AccessDenied {
        participant: String,
        access: AccessLevel,
        resource: String,
        transaction: Option<String>,
    },

    #[error("Cyclic ACL rule detected: rule '{rule}' re-entered during '{access}' check by participant '{participant}'")]
    CyclicAclRule {
        rule: String,
        access: AccessLevel,
        participant: String,
    },

    #[error("Object with ID '{id}' in registry '{registry}' does not exist")]
    ResourceNotFound { registry: String, id: String },

    #[error("Object with ID '{id}' in registry '{registry}' already exists")]
    DuplicateResource { registry: String, id: String },

    #[error("Cannot add type '{class}' to registry '{registry}'")]
    TypeMismatch { registry: String, class: String },

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Type already declared: {0}")]
    DuplicateType(String),

    #[error("Invalid type name: {0}")]
    InvalidTypeName(String),

    #[error("Invalid fully qualified identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Resource of type '{class}' is missing its identifier property '{field}'")]
    MissingIdentifier { class: String, field: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid predicate in rule '{rule}': {message}")]
    PredicateParse { rule: String, message: String },

    #[error("Predicate execution fault: {0}")]
    PredicateFault(String),

    #[error("Duplicate ACL rule name: {0}")]
    DuplicateRule(String),

    #[error("Invalid store definition: {0}")]
    Definition(String),

    #[error("No relationship resolver is bound to the access controller")]
    ResolverUnavailable,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StoreError {
    /// True for denials raised by the access controller (no grant, explicit
    /// DENY, or deny-by-default on a predicate fault).
    pub fn is_access_denied(&self) -> bool {
        matches!(self, StoreError::AccessDenied { .. })
    }

    /// True for the distinct cyclic-rule error.
    pub fn is_cyclic_rule(&self) -> bool {
        matches!(self, StoreError::CyclicAclRule { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
