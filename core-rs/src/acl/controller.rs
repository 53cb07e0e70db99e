//! Access controller
//!
//! Orchestrates one access check: short-circuits when enforcement is not
//! configured, filters the ordered rule list down to the candidates relevant
//! to the request, and evaluates candidates in declaration order until one
//! permits the action. A matching DENY rule, a cyclic rule evaluation, and
//! an exhausted candidate list all end the check with an error.

use crate::acl::bundle::CompiledAclBundle;
use crate::acl::context::{RuleInvocation, Session};
use crate::acl::matcher;
use crate::acl::predicate::EvalError;
use crate::acl::rule::{AccessLevel, AclRule, Action};
use crate::errors::{Result, StoreError};
use crate::model::Resource;
use crate::resolver::{RelationshipResolver, ResolutionState};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct AccessController {
    rules: Vec<AclRule>,
    bundle: CompiledAclBundle,
    resolver: OnceCell<Arc<dyn RelationshipResolver>>,
}

impl AccessController {
    /// Build a controller for an ordered rule list, compiling every
    /// predicate up front.
    pub fn new(rules: Vec<AclRule>) -> Result<Self> {
        let bundle = CompiledAclBundle::compile(&rules)?;
        Ok(AccessController {
            rules,
            bundle,
            resolver: OnceCell::new(),
        })
    }

    /// Bind the relationship resolver. Called once during store wiring;
    /// later calls are ignored. Rules whose predicates are the literal
    /// constants never need a resolver.
    pub fn bind_resolver(&self, resolver: Arc<dyn RelationshipResolver>) {
        let _ = self.resolver.set(resolver);
    }

    /// The ordered rule list this controller enforces.
    pub fn rules(&self) -> &[AclRule] {
        &self.rules
    }

    /// Check that the session's participant has `access` to `resource`.
    ///
    /// Passes trivially when the session has no participant or no rules are
    /// configured (enforcement is opt-in per deployment).
    ///
    /// # Errors
    /// * `AccessDenied` - no rule permitted the action, a DENY rule matched,
    ///   or a predicate faulted at runtime (deny-by-default)
    /// * `CyclicAclRule` - a predicate re-entered the same rule evaluation
    pub async fn check(
        &self,
        session: &Session,
        resource: &Resource,
        access: AccessLevel,
    ) -> Result<()> {
        let Some(participant) = session.participant() else {
            debug!(
                resource = %resource.fully_qualified_identifier(),
                %access,
                "no participant in session, enforcement disabled"
            );
            return Ok(());
        };

        if self.rules.is_empty() {
            debug!("no ACL rules configured, enforcement disabled");
            return Ok(());
        }

        let transaction = session.transaction();

        // Filtering preserves declaration order; evaluation must not reorder.
        let candidates: Vec<&AclRule> = self
            .rules
            .iter()
            .filter(|rule| matcher::matches(resource, access, participant, transaction, rule))
            .collect();
        debug!(
            resource = %resource.fully_qualified_identifier(),
            %access,
            candidates = candidates.len(),
            "evaluating candidate rules"
        );

        for rule in candidates {
            match self
                .evaluate_rule(session, resource, access, participant, transaction, rule)
                .await
            {
                Ok(true) => {
                    debug!(rule = rule.name(), "rule permits access");
                    return Ok(());
                }
                Ok(false) => {
                    debug!(rule = rule.name(), "rule does not apply");
                }
                Err(e) if e.is_cyclic_rule() || e.is_access_denied() => return Err(e),
                Err(fault) => {
                    // Deny-by-default on internal faults; the cause is logged
                    // but never surfaced to the caller.
                    warn!(
                        rule = rule.name(),
                        error = %fault,
                        "predicate execution fault, treating as denial"
                    );
                    return Err(denial(resource, access, participant, transaction));
                }
            }
        }

        Err(denial(resource, access, participant, transaction))
    }

    /// Evaluate a single candidate rule.
    ///
    /// Returns `Ok(true)` when the rule permits the action, `Ok(false)` when
    /// its predicate does not hold (evaluation continues with the next
    /// candidate), and an error for cycles and explicit DENY rules.
    async fn evaluate_rule(
        &self,
        session: &Session,
        resource: &Resource,
        access: AccessLevel,
        participant: &Resource,
        transaction: Option<&Resource>,
        rule: &AclRule,
    ) -> Result<bool> {
        let invocation = RuleInvocation::new(rule, access, participant, transaction);
        let stack = session.call_stack();
        if stack.contains(&invocation) {
            stack.clear();
            return Err(StoreError::CyclicAclRule {
                rule: rule.name().to_string(),
                access,
                participant: participant.fully_qualified_identifier(),
            });
        }

        stack.push(invocation.clone());
        let outcome = self
            .match_predicate(session, resource, participant, transaction, rule)
            .await;
        // A nested frame may have emptied the stack already; pop tolerates
        // that.
        stack.pop(&invocation);

        if !outcome? {
            return Ok(false);
        }

        match rule.action() {
            Action::Allow => Ok(true),
            Action::Deny => {
                // An explicit DENY is terminal; no later ALLOW is consulted.
                stack.clear();
                Err(denial(resource, access, participant, transaction))
            }
        }
    }

    /// Run the rule's predicate to a fix-point.
    ///
    /// Each execution pass either completes with a boolean or names one
    /// relationship it needs materialized. The loop resolves that target,
    /// records it, and re-executes from scratch; it ends only when a pass
    /// completes without requesting anything new.
    async fn match_predicate(
        &self,
        session: &Session,
        resource: &Resource,
        participant: &Resource,
        transaction: Option<&Resource>,
        rule: &AclRule,
    ) -> Result<bool> {
        // Constant predicates never touch the resolver.
        if rule.predicate().is_literal_true() {
            return Ok(true);
        }
        if rule.predicate().is_literal_false() {
            return Ok(false);
        }

        let resolver = self.resolver.get().ok_or(StoreError::ResolverUnavailable)?;

        let prepared_resource = resolver.prepare(resource).await?;
        let prepared_participant = resolver.prepare(participant).await?;
        let prepared_transaction = match transaction {
            Some(transaction) => Some(resolver.prepare(transaction).await?),
            None => None,
        };

        let mut state = ResolutionState::new();
        loop {
            let pass = self.bundle.execute(
                rule,
                &prepared_resource,
                &prepared_participant,
                prepared_transaction.as_ref(),
                &state,
            );
            match pass {
                Ok(verdict) => return Ok(verdict),
                Err(EvalError::Unresolved(fqi)) => {
                    if state.contains(&fqi) {
                        // The pass re-requested something already
                        // materialized; resolution cannot make progress.
                        return Err(StoreError::PredicateFault(format!(
                            "resolution of '{}' made no progress in rule '{}'",
                            fqi,
                            rule.name()
                        )));
                    }
                    debug!(rule = rule.name(), relationship = %fqi, "materializing relationship");
                    let target = resolver.resolve(session, &fqi).await?;
                    state.insert(fqi, target);
                }
                Err(EvalError::Fault(message)) => {
                    return Err(StoreError::PredicateFault(message));
                }
            }
        }
    }
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("rules", &self.rules.len())
            .field("resolver", &self.resolver.get().map(|_| "<bound>"))
            .finish()
    }
}

fn denial(
    resource: &Resource,
    access: AccessLevel,
    participant: &Resource,
    transaction: Option<&Resource>,
) -> StoreError {
    StoreError::AccessDenied {
        participant: participant.fully_qualified_identifier(),
        access,
        resource: resource.fully_qualified_identifier(),
        transaction: transaction.map(|t| t.fully_qualified_identifier()),
    }
}
