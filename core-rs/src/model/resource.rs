//! Typed resource instances
//!
//! A [`Resource`] is the materialized form of a stored record: a typed,
//! identified property bag. Relationships to other resources are kept as
//! `resource:<type>#<id>` reference strings inside the property map and are
//! only turned into real objects by the relationship resolver.

use crate::model::identifier::{format_fqi, namespace_of};
use serde_json::{Map, Value};
use std::fmt;

/// Prefix marking a property value as a relationship reference.
pub const RELATIONSHIP_PREFIX: &str = "resource:";

/// The storage kind of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Asset,
    Participant,
    Transaction,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Asset => write!(f, "asset"),
            ResourceKind::Participant => write!(f, "participant"),
            ResourceKind::Transaction => write!(f, "transaction"),
        }
    }
}

/// A typed, identified instance held by a registry.
///
/// Instances are produced by the serializer (or by
/// `ModelRegistry::instantiate`), which precomputes the supertype ancestry so
/// `instance_of` needs no model lookups afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    class: String,
    kind: ResourceKind,
    identifier: String,
    ancestry: Vec<String>,
    properties: Map<String, Value>,
}

impl Resource {
    pub(crate) fn new(
        class: String,
        kind: ResourceKind,
        identifier: String,
        ancestry: Vec<String>,
        properties: Map<String, Value>,
    ) -> Self {
        Resource {
            class,
            kind,
            identifier,
            ancestry,
            properties,
        }
    }

    /// Fully-qualified type name, e.g. `org.acme.Car`.
    pub fn fully_qualified_type(&self) -> &str {
        &self.class
    }

    /// Storage kind of the declared type.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Instance identifier, e.g. `CAR-001`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Fully-qualified identifier, e.g. `org.acme.Car#CAR-001`.
    pub fn fully_qualified_identifier(&self) -> String {
        format_fqi(&self.class, &self.identifier)
    }

    /// Namespace of the type, e.g. `org.acme`.
    pub fn namespace(&self) -> &str {
        namespace_of(&self.class)
    }

    /// True if this instance's type is `type_name` or a subtype of it.
    pub fn instance_of(&self, type_name: &str) -> bool {
        self.ancestry.iter().any(|t| t == type_name)
    }

    /// Supertype chain, starting with the instance's own type.
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    /// Property value by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// The full property map.
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.fully_qualified_identifier())
    }
}

/// Format a relationship reference string for a target instance.
pub fn relationship_to(class: &str, id: &str) -> String {
    format!("{}{}", RELATIONSHIP_PREFIX, format_fqi(class, id))
}

/// If `value` is a relationship reference string, return the referenced
/// fully-qualified identifier.
pub fn relationship_target(value: &Value) -> Option<&str> {
    value.as_str().and_then(|s| s.strip_prefix(RELATIONSHIP_PREFIX))
}
