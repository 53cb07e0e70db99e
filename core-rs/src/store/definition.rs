//! Store definition documents
//!
//! A deployment is described by a YAML document naming the declared types
//! and the ordered ACL rules. Rule patterns use the same syntax everywhere:
//! `org.acme.Car`, `org.acme.Car#C1`, `org.acme.*`, `org.acme.**`, and the
//! special participant pattern `ANY`.
//!
//! ```yaml
//! name: vehicle-network
//! version: "0.4"
//! types:
//!   - name: org.acme.Member
//!     kind: participant
//!     identifiedBy: email
//!   - name: org.acme.Car
//!     kind: asset
//!     identifiedBy: vin
//! rules:
//!   - name: OwnerCanDrive
//!     verbs: [READ, UPDATE]
//!     resource: { type: org.acme.Car, var: r }
//!     participant: { type: org.acme.Member, var: p }
//!     condition: r.owner == p
//!     action: ALLOW
//! ```

use crate::acl::{AclRule, Action, ModelBinding, Predicate, Verb};
use crate::errors::{Result, StoreError};
use crate::model::{ModelRegistry, TypeDeclaration};
use serde::Deserialize;
use std::path::Path;

/// Participant pattern meaning "any participant".
pub const ANY_PARTICIPANT: &str = "ANY";

/// A binding pattern, either as a bare string or with a predicate variable.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BindingDefinition {
    Pattern(String),
    Detailed {
        #[serde(rename = "type")]
        pattern: String,
        #[serde(default)]
        var: Option<String>,
    },
}

impl BindingDefinition {
    /// Compile into a binding; `ANY` compiles to no binding at all.
    pub fn compile(&self) -> Result<Option<ModelBinding>> {
        let (pattern, var) = match self {
            BindingDefinition::Pattern(pattern) => (pattern.as_str(), None),
            BindingDefinition::Detailed { pattern, var } => (pattern.as_str(), var.as_deref()),
        };
        if pattern == ANY_PARTICIPANT {
            return Ok(None);
        }
        let mut binding = ModelBinding::parse(pattern)?;
        if let Some(var) = var {
            binding = binding.with_variable(var);
        }
        Ok(Some(binding))
    }
}

/// One rule as written in the definition document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub verbs: Vec<Verb>,
    pub resource: BindingDefinition,
    #[serde(default)]
    pub participant: Option<BindingDefinition>,
    #[serde(default)]
    pub transaction: Option<BindingDefinition>,
    #[serde(default)]
    pub condition: Option<String>,
    pub action: Action,
}

impl RuleDefinition {
    /// Compile into an [`AclRule`].
    pub fn compile(&self) -> Result<AclRule> {
        if self.verbs.is_empty() {
            return Err(StoreError::Definition(format!(
                "rule '{}' names no verbs",
                self.name
            )));
        }
        let noun = self.resource.compile()?.ok_or_else(|| {
            StoreError::Definition(format!(
                "rule '{}': the resource pattern cannot be '{}'",
                self.name, ANY_PARTICIPANT
            ))
        })?;

        let mut rule = AclRule::new(self.name.clone(), self.verbs.clone(), noun, self.action);
        if let Some(description) = &self.description {
            rule = rule.with_description(description.clone());
        }
        if let Some(participant) = &self.participant {
            if let Some(binding) = participant.compile()? {
                rule = rule.with_participant(binding);
            }
        }
        if let Some(transaction) = &self.transaction {
            if let Some(binding) = transaction.compile()? {
                rule = rule.with_transaction(binding);
            }
        }
        if let Some(condition) = &self.condition {
            rule = rule.with_predicate(Predicate::new(condition.clone()));
        }
        Ok(rule)
    }
}

/// The full definition document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDefinition {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeDeclaration>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl StoreDefinition {
    /// Parse a definition from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let definition: StoreDefinition = serde_yaml::from_str(yaml)?;
        if definition.name.is_empty() {
            return Err(StoreError::Definition(
                "store definition has an empty name".to_string(),
            ));
        }
        Ok(definition)
    }

    /// Read and parse a definition file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Build the model registry from the declared types.
    pub fn compile_models(&self) -> Result<ModelRegistry> {
        let mut models = ModelRegistry::new();
        for declaration in &self.types {
            models.declare(declaration.clone())?;
        }
        Ok(models)
    }

    /// Compile the ordered rule list.
    pub fn compile_rules(&self) -> Result<Vec<AclRule>> {
        self.rules.iter().map(RuleDefinition::compile).collect()
    }
}
