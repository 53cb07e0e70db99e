//! Type model for the resource store
//!
//! The model registry holds the declared types of a deployment: their kind
//! (asset / participant / transaction), their supertype, and the name of
//! their identifier property. It is the authority the serializer and the
//! registries consult when materializing typed instances.

pub mod identifier;
pub mod resource;

pub use resource::{relationship_target, relationship_to, Resource, ResourceKind, RELATIONSHIP_PREFIX};

use crate::errors::{Result, StoreError};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A single declared type.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDeclaration {
    /// Fully-qualified type name, e.g. `org.acme.Car`.
    pub name: String,

    /// Storage kind.
    pub kind: ResourceKind,

    /// Optional supertype (must share the same kind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Identifier property name. May be inherited from a supertype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identified_by: Option<String>,
}

impl TypeDeclaration {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        TypeDeclaration {
            name: name.into(),
            kind,
            extends: None,
            identified_by: None,
        }
    }

    pub fn extends(mut self, super_type: impl Into<String>) -> Self {
        self.extends = Some(super_type.into());
        self
    }

    pub fn identified_by(mut self, field: impl Into<String>) -> Self {
        self.identified_by = Some(field.into());
        self
    }
}

/// Registry of declared types with supertype resolution.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    types: HashMap<String, TypeDeclaration>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        ModelRegistry {
            types: HashMap::new(),
        }
    }

    /// Declare a type.
    ///
    /// # Errors
    /// Rejects invalid names, duplicate declarations, and (once both sides
    /// are declared) supertypes of a different kind
    pub fn declare(&mut self, declaration: TypeDeclaration) -> Result<()> {
        identifier::validate_type_name(&declaration.name)?;
        if let Some(super_name) = &declaration.extends {
            identifier::validate_type_name(super_name)?;
        }
        if self.types.contains_key(&declaration.name) {
            return Err(StoreError::DuplicateType(declaration.name));
        }
        self.types.insert(declaration.name.clone(), declaration);
        Ok(())
    }

    /// Look up a declaration by fully-qualified name.
    pub fn get(&self, name: &str) -> Option<&TypeDeclaration> {
        self.types.get(name)
    }

    /// All declared types, in no particular order.
    pub fn declarations(&self) -> impl Iterator<Item = &TypeDeclaration> {
        self.types.values()
    }

    /// Supertype chain for a type, starting with the type itself.
    ///
    /// # Errors
    /// Returns `UnknownType` when the type or any supertype is undeclared,
    /// or when the inheritance chain is cyclic or crosses kinds
    pub fn ancestry_of(&self, name: &str) -> Result<Vec<String>> {
        let declaration = self
            .types
            .get(name)
            .ok_or_else(|| StoreError::UnknownType(name.to_string()))?;

        let mut chain = vec![name.to_string()];
        let mut current = declaration;
        while let Some(super_name) = &current.extends {
            if chain.iter().any(|seen| seen == super_name) {
                return Err(StoreError::Definition(format!(
                    "cyclic inheritance involving '{}'",
                    super_name
                )));
            }
            let super_decl = self
                .types
                .get(super_name)
                .ok_or_else(|| StoreError::UnknownType(super_name.clone()))?;
            if super_decl.kind != declaration.kind {
                return Err(StoreError::Definition(format!(
                    "'{}' ({}) cannot extend '{}' ({})",
                    declaration.name, declaration.kind, super_decl.name, super_decl.kind
                )));
            }
            chain.push(super_name.clone());
            current = super_decl;
        }
        Ok(chain)
    }

    /// Effective identifier property for a type: its own `identified_by`, or
    /// the nearest inherited one.
    ///
    /// # Errors
    /// Returns `Definition` when no type in the chain declares one
    pub fn identifier_field_of(&self, name: &str) -> Result<String> {
        for ancestor in self.ancestry_of(name)? {
            if let Some(field) = self.types.get(&ancestor).and_then(|d| d.identified_by.clone()) {
                return Ok(field);
            }
        }
        Err(StoreError::Definition(format!(
            "type '{}' declares no identifier property",
            name
        )))
    }

    /// Materialize a typed instance.
    ///
    /// The identifier is taken from the declared identifier property inside
    /// `properties`; the ancestry chain is computed from the declarations.
    pub fn instantiate(&self, class: &str, properties: Map<String, Value>) -> Result<Resource> {
        let declaration = self
            .types
            .get(class)
            .ok_or_else(|| StoreError::UnknownType(class.to_string()))?;
        let ancestry = self.ancestry_of(class)?;
        let field = self.identifier_field_of(class)?;

        let identifier = match properties.get(&field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(StoreError::MissingIdentifier {
                    class: class.to_string(),
                    field,
                })
            }
        };

        Ok(Resource::new(
            class.to_string(),
            declaration.kind,
            identifier,
            ancestry,
            properties,
        ))
    }
}
