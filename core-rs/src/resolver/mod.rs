//! Relationship resolution
//!
//! Stored resources reference each other by identifier, never by embedded
//! object. Predicates that walk through a relationship therefore need the
//! target materialized on demand. The [`RelationshipResolver`] trait is the
//! seam the access controller drives: `prepare` produces the predicate-ready
//! form of an instance, and `resolve` materializes one referenced target.
//!
//! The default implementation, [`RegistryResolver`], loads targets through
//! the registries themselves - with the same session - so a predicate that
//! follows a relationship triggers a full nested READ check on the target,
//! which is exactly what makes rule cycles possible (and detectable).

use crate::acl::Session;
use crate::errors::{Result, StoreError};
use crate::model::identifier::split_fqi;
use crate::model::Resource;
use crate::registry::RegistryManager;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Weak;

/// The materialized, predicate-ready form of a resource.
#[derive(Debug, Clone)]
pub struct PreparedBinding {
    resource: Resource,
}

impl PreparedBinding {
    pub fn new(resource: Resource) -> Self {
        PreparedBinding { resource }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }
}

/// Relationship targets materialized so far during one predicate evaluation,
/// keyed by fully-qualified identifier. Shared across the resource,
/// participant, and transaction bindings of a single rule evaluation, and
/// across fix-point passes.
#[derive(Debug, Default)]
pub struct ResolutionState {
    resolved: HashMap<String, Resource>,
}

impl ResolutionState {
    pub fn new() -> Self {
        ResolutionState {
            resolved: HashMap::new(),
        }
    }

    pub fn get(&self, fqi: &str) -> Option<&Resource> {
        self.resolved.get(fqi)
    }

    pub fn contains(&self, fqi: &str) -> bool {
        self.resolved.contains_key(fqi)
    }

    pub fn insert(&mut self, fqi: String, resource: Resource) {
        self.resolved.insert(fqi, resource);
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// Materializes resources and their relationships for predicate execution.
#[async_trait]
pub trait RelationshipResolver: Send + Sync {
    /// Prepare an instance for predicate execution.
    async fn prepare(&self, resource: &Resource) -> Result<PreparedBinding>;

    /// Materialize the instance referenced by `fqi`, enforcing access
    /// control within `session`.
    async fn resolve(&self, session: &Session, fqi: &str) -> Result<Resource>;
}

/// Resolver that loads relationship targets from the store's registries.
pub struct RegistryResolver {
    registries: Weak<RegistryManager>,
}

impl RegistryResolver {
    /// The weak reference avoids an ownership cycle: the registry manager
    /// reaches the resolver through the access controller.
    pub fn new(registries: Weak<RegistryManager>) -> Self {
        RegistryResolver { registries }
    }
}

#[async_trait]
impl RelationshipResolver for RegistryResolver {
    async fn prepare(&self, resource: &Resource) -> Result<PreparedBinding> {
        Ok(PreparedBinding::new(resource.clone()))
    }

    async fn resolve(&self, session: &Session, fqi: &str) -> Result<Resource> {
        let (class, id) = split_fqi(fqi)?;
        let registries = self
            .registries
            .upgrade()
            .ok_or(StoreError::ResolverUnavailable)?;
        let registry = registries.registry(class)?;
        registry.get(session, id).await
    }
}
