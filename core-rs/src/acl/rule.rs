//! ACL rule model
//!
//! A compiled rule is a declarative permission statement: verbs + noun
//! pattern + optional participant/transaction patterns + predicate +
//! ALLOW/DENY action. Rules are immutable once built; a policy is an
//! ordered list of them, fixed for the lifetime of a check.

use crate::errors::{Result, StoreError};
use crate::model::identifier::validate_type_name;
use std::fmt;

/// Requested level of access for one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::Create => write!(f, "CREATE"),
            AccessLevel::Read => write!(f, "READ"),
            AccessLevel::Update => write!(f, "UPDATE"),
            AccessLevel::Delete => write!(f, "DELETE"),
        }
    }
}

/// A verb named by a rule. `All` covers every access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
    All,
}

impl Verb {
    /// True if this verb covers the requested access level.
    pub fn covers(&self, access: AccessLevel) -> bool {
        match self {
            Verb::All => true,
            Verb::Create => access == AccessLevel::Create,
            Verb::Read => access == AccessLevel::Read,
            Verb::Update => access == AccessLevel::Update,
            Verb::Delete => access == AccessLevel::Delete,
        }
    }
}

/// Effect of a matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Allow,
    Deny,
}

/// How a binding's type pattern matches instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingScope {
    /// The named type or any of its subtypes.
    Type,
    /// Any type directly inside the named namespace (`ns.*`).
    Namespace,
    /// Any type inside the named namespace or a nested one (`ns.**`).
    RecursiveNamespace,
}

/// A noun / participant / transaction pattern inside a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBinding {
    fully_qualified_name: String,
    scope: BindingScope,
    instance_identifier: Option<String>,
    variable_name: Option<String>,
}

impl ModelBinding {
    /// Parse a pattern string.
    ///
    /// Accepted forms:
    /// * `org.acme.Car` - the type or any subtype
    /// * `org.acme.Car#CAR-1` - one specific instance
    /// * `org.acme.*` - any type in the namespace
    /// * `org.acme.**` - any type in the namespace or nested namespaces
    pub fn parse(pattern: &str) -> Result<Self> {
        let (name, instance_identifier) = match pattern.split_once('#') {
            Some((name, id)) => {
                if id.is_empty() {
                    return Err(StoreError::InvalidIdentifier(pattern.to_string()));
                }
                (name, Some(id.to_string()))
            }
            None => (pattern, None),
        };

        let (name, scope) = if let Some(ns) = name.strip_suffix(".**") {
            (ns, BindingScope::RecursiveNamespace)
        } else if let Some(ns) = name.strip_suffix(".*") {
            (ns, BindingScope::Namespace)
        } else {
            (name, BindingScope::Type)
        };

        if scope != BindingScope::Type && instance_identifier.is_some() {
            return Err(StoreError::Definition(format!(
                "pattern '{}' cannot combine a wildcard with an instance identifier",
                pattern
            )));
        }
        validate_type_name(name)?;

        Ok(ModelBinding {
            fully_qualified_name: name.to_string(),
            scope,
            instance_identifier,
            variable_name: None,
        })
    }

    /// Attach the predicate variable this binding is exposed as.
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable_name = Some(variable.into());
        self
    }

    /// The type or namespace the pattern names.
    pub fn fully_qualified_name(&self) -> &str {
        &self.fully_qualified_name
    }

    pub fn scope(&self) -> BindingScope {
        self.scope
    }

    /// True when the pattern names a namespace rather than a single type.
    pub fn has_wildcard(&self) -> bool {
        self.scope != BindingScope::Type
    }

    /// Specific instance the pattern is narrowed to, if any.
    pub fn instance_identifier(&self) -> Option<&str> {
        self.instance_identifier.as_deref()
    }

    /// Variable name the bound instance is exposed as inside the predicate.
    pub fn variable_name(&self) -> Option<&str> {
        self.variable_name.as_deref()
    }
}

/// The boolean condition of a rule, beyond type/identity matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expression: String,
}

impl Predicate {
    pub fn new(expression: impl Into<String>) -> Self {
        Predicate {
            expression: expression.into(),
        }
    }

    /// The literal `true` predicate every rule defaults to.
    pub fn always_true() -> Self {
        Predicate::new("true")
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// True when the expression is the literal constant `true`.
    pub fn is_literal_true(&self) -> bool {
        self.expression.trim() == "true"
    }

    /// True when the expression is the literal constant `false`.
    pub fn is_literal_false(&self) -> bool {
        self.expression.trim() == "false"
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::always_true()
    }
}

/// One compiled ACL rule.
#[derive(Debug, Clone)]
pub struct AclRule {
    name: String,
    description: Option<String>,
    verbs: Vec<Verb>,
    noun: ModelBinding,
    participant: Option<ModelBinding>,
    transaction: Option<ModelBinding>,
    predicate: Predicate,
    action: Action,
}

impl AclRule {
    pub fn new(name: impl Into<String>, verbs: Vec<Verb>, noun: ModelBinding, action: Action) -> Self {
        AclRule {
            name: name.into(),
            description: None,
            verbs,
            noun,
            participant: None,
            transaction: None,
            predicate: Predicate::always_true(),
            action,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_participant(mut self, participant: ModelBinding) -> Self {
        self.participant = Some(participant);
        self
    }

    pub fn with_transaction(mut self, transaction: ModelBinding) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn noun(&self) -> &ModelBinding {
        &self.noun
    }

    pub fn participant(&self) -> Option<&ModelBinding> {
        self.participant.as_ref()
    }

    pub fn transaction(&self) -> Option<&ModelBinding> {
        self.transaction.as_ref()
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn action(&self) -> Action {
        self.action
    }
}
