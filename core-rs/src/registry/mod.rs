//! Typed registries with access-control enforcement
//!
//! A registry is the CRUD surface over one declared type's collection.
//! Every operation runs the access controller before touching storage (or,
//! for reads, before returning data). Read paths convert denials into
//! absence so callers can never observe resources they cannot read; write
//! paths propagate the denial and abort the batch.

use crate::acl::{AccessController, AccessLevel, Session};
use crate::errors::{Result, StoreError};
use crate::model::{Resource, ResourceKind};
use crate::serializer::Serializer;
use crate::storage::{DataCollection, MemoryCollection};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A change notification emitted by a registry after a successful mutation.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    ResourceAdded {
        registry: String,
        resource_id: String,
        at: DateTime<Utc>,
    },
    ResourceUpdated {
        registry: String,
        resource_id: String,
        at: DateTime<Utc>,
    },
    ResourceRemoved {
        registry: String,
        resource_id: String,
        at: DateTime<Utc>,
    },
}

/// Target of a `remove`: an already-loaded resource, or just an identifier.
/// Given only an identifier, the registry loads the stored value first so
/// the DELETE check runs against a typed instance.
pub enum Removable<'a> {
    Resource(&'a Resource),
    Id(&'a str),
}

impl<'a> From<&'a Resource> for Removable<'a> {
    fn from(resource: &'a Resource) -> Self {
        Removable::Resource(resource)
    }
}

impl<'a> From<&'a str> for Removable<'a> {
    fn from(id: &'a str) -> Self {
        Removable::Id(id)
    }
}

/// CRUD surface over one declared type, with ACL enforcement.
pub struct Registry {
    kind: ResourceKind,
    id: String,
    name: String,
    collection: Arc<dyn DataCollection>,
    serializer: Arc<dyn Serializer>,
    controller: Arc<AccessController>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Registry {
    pub fn new(
        kind: ResourceKind,
        id: impl Into<String>,
        name: impl Into<String>,
        collection: Arc<dyn DataCollection>,
        serializer: Arc<dyn Serializer>,
        controller: Arc<AccessController>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Registry {
            kind,
            id: id.into(),
            name: name.into(),
            collection,
            serializer,
            controller,
            events,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The declared type this registry stores.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualified registry identifier, e.g. `asset:org.acme.Car`.
    pub fn full_id(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::ResourceNotFound {
            registry: self.full_id(),
            id: id.to_string(),
        }
    }

    /// Require the resource to belong to this registry's declared type.
    fn check_type(&self, resource: &Resource) -> Result<()> {
        if resource.kind() != self.kind || !resource.instance_of(&self.id) {
            return Err(StoreError::TypeMismatch {
                registry: self.full_id(),
                class: resource.fully_qualified_type().to_string(),
            });
        }
        Ok(())
    }

    /// All resources the session may read.
    ///
    /// Records that fail to deserialize (the model may have evolved past
    /// them) and resources whose READ check does not pass are silently
    /// dropped: a caller without access can never observe that they exist.
    pub async fn get_all(&self, session: &Session) -> Result<Vec<Resource>> {
        let objects = self.collection.get_all().await?;
        let mut resources = Vec::new();
        for object in objects {
            let resource = match self.serializer.from_json(&object) {
                Ok(resource) => resource,
                Err(error) => {
                    debug!(registry = %self.full_id(), %error, "skipping undeserializable record");
                    continue;
                }
            };
            match self
                .controller
                .check(session, &resource, AccessLevel::Read)
                .await
            {
                Ok(()) => resources.push(resource),
                Err(error) => {
                    debug!(
                        registry = %self.full_id(),
                        resource = %resource.fully_qualified_identifier(),
                        %error,
                        "dropping inaccessible resource"
                    );
                }
            }
        }
        Ok(resources)
    }

    /// One resource by identifier.
    ///
    /// A READ denial surfaces as the same "does not exist" error an absent
    /// record produces, so existence never leaks.
    pub async fn get(&self, session: &Session, id: &str) -> Result<Resource> {
        let object = self.collection.get(id).await?;
        let resource = self.serializer.from_json(&object)?;
        match self
            .controller
            .check(session, &resource, AccessLevel::Read)
            .await
        {
            Ok(()) => Ok(resource),
            Err(error) if error.is_access_denied() => Err(self.not_found(id)),
            Err(error) => Err(error),
        }
    }

    /// Whether a readable resource exists under `id`. Absence, a denial,
    /// and an undeserializable record all resolve to `false`.
    pub async fn exists(&self, session: &Session, id: &str) -> Result<bool> {
        if !self.collection.exists(id).await? {
            return Ok(false);
        }
        let object = self.collection.get(id).await?;
        let resource = match self.serializer.from_json(&object) {
            Ok(resource) => resource,
            Err(_) => return Ok(false),
        };
        match self
            .controller
            .check(session, &resource, AccessLevel::Read)
            .await
        {
            Ok(()) => Ok(true),
            Err(error) if error.is_access_denied() => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Add a resource. The CREATE check runs before storage is touched.
    pub async fn add(&self, session: &Session, resource: &Resource) -> Result<()> {
        self.check_type(resource)?;
        self.controller
            .check(session, resource, AccessLevel::Create)
            .await?;
        let object = self.serializer.to_json(resource)?;
        self.collection.add(resource.identifier(), object).await?;
        self.emit(RegistryEvent::ResourceAdded {
            registry: self.full_id(),
            resource_id: resource.identifier().to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Add resources in order, aborting the batch at the first failure.
    pub async fn add_all(&self, session: &Session, resources: &[Resource]) -> Result<()> {
        for resource in resources {
            self.add(session, resource).await?;
        }
        Ok(())
    }

    /// Update a resource. The UPDATE check runs against the **stored**
    /// version, so a caller cannot gain access by constructing a new value
    /// that a predicate would permit.
    pub async fn update(&self, session: &Session, resource: &Resource) -> Result<()> {
        self.check_type(resource)?;
        let id = resource.identifier();
        let old_object = self.collection.get(id).await?;
        let old_resource = self.serializer.from_json(&old_object)?;
        self.controller
            .check(session, &old_resource, AccessLevel::Update)
            .await?;
        let object = self.serializer.to_json(resource)?;
        self.collection.update(id, object).await?;
        self.emit(RegistryEvent::ResourceUpdated {
            registry: self.full_id(),
            resource_id: id.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Update resources in order, aborting the batch at the first failure.
    pub async fn update_all(&self, session: &Session, resources: &[Resource]) -> Result<()> {
        for resource in resources {
            self.update(session, resource).await?;
        }
        Ok(())
    }

    /// Remove a resource by value or by identifier.
    pub async fn remove<'a>(
        &self,
        session: &Session,
        target: impl Into<Removable<'a>>,
    ) -> Result<()> {
        let target = target.into();
        let loaded;
        let resource: &Resource = match target {
            Removable::Resource(resource) => resource,
            Removable::Id(id) => {
                let object = self.collection.get(id).await?;
                loaded = self.serializer.from_json(&object)?;
                &loaded
            }
        };
        let id = resource.identifier().to_string();
        self.controller
            .check(session, resource, AccessLevel::Delete)
            .await?;
        self.collection.remove(&id).await?;
        self.emit(RegistryEvent::ResourceRemoved {
            registry: self.full_id(),
            resource_id: id,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Remove resources in order, aborting the batch at the first failure.
    /// Removals that already committed stay committed.
    pub async fn remove_all<'a>(
        &self,
        session: &Session,
        targets: Vec<Removable<'a>>,
    ) -> Result<()> {
        for target in targets {
            self.remove(session, target).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Owns the registries of a store, one per declared type.
pub struct RegistryManager {
    serializer: Arc<dyn Serializer>,
    controller: Arc<AccessController>,
    registries: RwLock<HashMap<String, Arc<Registry>>>,
}

impl RegistryManager {
    pub fn new(serializer: Arc<dyn Serializer>, controller: Arc<AccessController>) -> Self {
        RegistryManager {
            serializer,
            controller,
            registries: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Registry>>> {
        self.registries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Registry>>> {
        self.registries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a registry backed by an in-memory collection.
    pub fn add_registry(
        &self,
        kind: ResourceKind,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Arc<Registry>> {
        let id = id.into();
        let collection = Arc::new(MemoryCollection::new(format!("{}:{}", kind, id)));
        self.add_registry_with(kind, id, name, collection)
    }

    /// Create a registry over a caller-supplied collection.
    pub fn add_registry_with(
        &self,
        kind: ResourceKind,
        id: impl Into<String>,
        name: impl Into<String>,
        collection: Arc<dyn DataCollection>,
    ) -> Result<Arc<Registry>> {
        let id = id.into();
        let mut registries = self.write();
        if registries.contains_key(&id) {
            return Err(StoreError::Definition(format!(
                "registry for type '{}' already exists",
                id
            )));
        }
        let registry = Arc::new(Registry::new(
            kind,
            id.clone(),
            name,
            collection,
            self.serializer.clone(),
            self.controller.clone(),
        ));
        registries.insert(id, registry.clone());
        Ok(registry)
    }

    /// Look up the registry storing `type_name`.
    pub fn registry(&self, type_name: &str) -> Result<Arc<Registry>> {
        self.read()
            .get(type_name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownType(type_name.to_string()))
    }

    /// All registries, in no particular order.
    pub fn registries(&self) -> Vec<Arc<Registry>> {
        self.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for RegistryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryManager")
            .field("registries", &self.read().len())
            .finish()
    }
}
