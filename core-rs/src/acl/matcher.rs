//! Rule relevance matching
//!
//! Cheap, pure filters that decide whether a rule is even relevant to a
//! (resource, access, participant, transaction) tuple. All four sub-checks
//! must pass. Matching never touches storage or the resolver, so it always
//! runs before predicate evaluation.

use crate::acl::rule::{AccessLevel, AclRule, BindingScope, ModelBinding};
use crate::model::Resource;

/// True if the rule is relevant to the requested tuple.
pub fn matches(
    resource: &Resource,
    access: AccessLevel,
    participant: &Resource,
    transaction: Option<&Resource>,
    rule: &AclRule,
) -> bool {
    match_verb(access, rule)
        && match_noun(resource, rule)
        && match_participant(participant, rule)
        && match_transaction(transaction, rule)
}

/// The rule's verb set contains `ALL` or the requested access level.
pub fn match_verb(access: AccessLevel, rule: &AclRule) -> bool {
    rule.verbs().iter().any(|verb| verb.covers(access))
}

/// The resource matches the rule's noun pattern, including the optional
/// instance identifier.
pub fn match_noun(resource: &Resource, rule: &AclRule) -> bool {
    let noun = rule.noun();
    if !match_binding_type(resource, noun) {
        return false;
    }
    match noun.instance_identifier() {
        Some(required) => resource.identifier() == required,
        None => true,
    }
}

/// Absent pattern matches any participant; otherwise the same type and
/// identifier matching as the noun.
pub fn match_participant(participant: &Resource, rule: &AclRule) -> bool {
    let Some(binding) = rule.participant() else {
        return true;
    };
    if !match_binding_type(participant, binding) {
        return false;
    }
    match binding.instance_identifier() {
        Some(required) => participant.identifier() == required,
        None => true,
    }
}

/// Absent pattern means the rule is transaction-agnostic. A present pattern
/// requires a transaction to be in scope, matched by type hierarchy only.
pub fn match_transaction(transaction: Option<&Resource>, rule: &AclRule) -> bool {
    let Some(binding) = rule.transaction() else {
        return true;
    };
    let Some(transaction) = transaction else {
        return false;
    };
    match_binding_type(transaction, binding)
}

fn match_binding_type(instance: &Resource, binding: &ModelBinding) -> bool {
    let pattern = binding.fully_qualified_name();
    match binding.scope() {
        // The named type or any subtype of it.
        BindingScope::Type => instance.instance_of(pattern),
        // Any type directly inside the namespace.
        BindingScope::Namespace => {
            instance.fully_qualified_type() == pattern || instance.namespace() == pattern
        }
        // Any type inside the namespace or one nested below it.
        BindingScope::RecursiveNamespace => {
            instance.fully_qualified_type() == pattern
                || instance.namespace() == pattern
                || instance
                    .namespace()
                    .starts_with(&format!("{}.", pattern))
        }
    }
}
