//! Store assembly
//!
//! Wires the model, serializer, access controller, registries, and the
//! registry-backed relationship resolver into one [`ResourceStore`]. One
//! registry is created per declared type. The resolver holds a weak
//! reference back to the registry manager, so the finished object graph has
//! no reference cycle.

pub mod definition;

pub use definition::{BindingDefinition, RuleDefinition, StoreDefinition};

use crate::acl::{AccessController, AccessLevel, AclRule, Session};
use crate::errors::Result;
use crate::model::identifier::short_name_of;
use crate::model::{ModelRegistry, Resource, TypeDeclaration};
use crate::registry::{Registry, RegistryManager};
use crate::resolver::RegistryResolver;
use crate::serializer::{JsonSerializer, Serializer};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// An assembled transactional resource store with ACL enforcement.
pub struct ResourceStore {
    name: String,
    models: Arc<ModelRegistry>,
    serializer: Arc<dyn Serializer>,
    controller: Arc<AccessController>,
    registries: Arc<RegistryManager>,
}

impl ResourceStore {
    pub fn builder(name: impl Into<String>) -> StoreBuilder {
        StoreBuilder {
            name: name.into(),
            types: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Assemble a store from a parsed definition document.
    pub fn from_definition(definition: &StoreDefinition) -> Result<Self> {
        let mut builder = Self::builder(definition.name.clone());
        builder.types = definition.types.clone();
        builder.rules = definition.compile_rules()?;
        builder.build()
    }

    /// Assemble a store from YAML definition text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_definition(&StoreDefinition::from_yaml_str(yaml)?)
    }

    /// Assemble a store from a YAML definition file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_definition(&StoreDefinition::from_yaml_file(path)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    pub fn controller(&self) -> &Arc<AccessController> {
        &self.controller
    }

    pub fn registries(&self) -> &Arc<RegistryManager> {
        &self.registries
    }

    /// The registry storing `type_name`.
    pub fn registry(&self, type_name: &str) -> Result<Arc<Registry>> {
        self.registries.registry(type_name)
    }

    /// Materialize a typed instance from a property document.
    pub fn new_resource(&self, class: &str, properties: Value) -> Result<Resource> {
        let properties = match properties {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(crate::errors::StoreError::Serialization(format!(
                    "expected a property object, got {}",
                    other
                )))
            }
        };
        self.models.instantiate(class, properties)
    }

    /// Run an access check directly.
    pub async fn check(
        &self,
        session: &Session,
        resource: &Resource,
        access: AccessLevel,
    ) -> Result<()> {
        self.controller.check(session, resource, access).await
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("name", &self.name)
            .field("rules", &self.controller.rules().len())
            .finish()
    }
}

/// Step-wise store assembly.
pub struct StoreBuilder {
    name: String,
    types: Vec<TypeDeclaration>,
    rules: Vec<AclRule>,
}

impl StoreBuilder {
    pub fn with_type(mut self, declaration: TypeDeclaration) -> Self {
        self.types.push(declaration);
        self
    }

    pub fn with_rule(mut self, rule: AclRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Wire everything together.
    pub fn build(self) -> Result<ResourceStore> {
        let mut models = ModelRegistry::new();
        for declaration in self.types {
            models.declare(declaration)?;
        }
        let models = Arc::new(models);

        let serializer: Arc<dyn Serializer> = Arc::new(JsonSerializer::new(models.clone()));
        let controller = Arc::new(AccessController::new(self.rules)?);
        let registries = Arc::new(RegistryManager::new(serializer.clone(), controller.clone()));

        for declaration in models.declarations() {
            registries.add_registry(
                declaration.kind,
                declaration.name.clone(),
                short_name_of(&declaration.name).to_string(),
            )?;
        }

        let resolver = Arc::new(RegistryResolver::new(Arc::downgrade(&registries)));
        controller.bind_resolver(resolver);

        Ok(ResourceStore {
            name: self.name,
            models,
            serializer,
            controller,
            registries,
        })
    }
}
