//! Compiled predicate bundle
//!
//! All rule predicates of a policy are parsed once, up front, into a bundle
//! keyed by rule name. Execution binds the prepared resource, participant,
//! and transaction to the rule's declared variable names and interprets the
//! expression. Constant `true`/`false` predicates are compiled to constants
//! and never evaluate anything.

use crate::acl::predicate::{self, Bindings, EvalError, Expr};
use crate::acl::rule::AclRule;
use crate::errors::{Result, StoreError};
use crate::resolver::{PreparedBinding, ResolutionState};
use std::collections::HashMap;

#[derive(Debug)]
enum Program {
    ConstTrue,
    ConstFalse,
    Compiled(Expr),
}

/// The compiled predicates of one policy.
#[derive(Debug, Default)]
pub struct CompiledAclBundle {
    programs: HashMap<String, Program>,
}

impl CompiledAclBundle {
    /// Compile every rule's predicate.
    ///
    /// # Errors
    /// Returns `DuplicateRule` for repeated rule names and `PredicateParse`
    /// for expressions that do not parse
    pub fn compile(rules: &[AclRule]) -> Result<Self> {
        let mut programs = HashMap::new();
        for rule in rules {
            if programs.contains_key(rule.name()) {
                return Err(StoreError::DuplicateRule(rule.name().to_string()));
            }
            let predicate = rule.predicate();
            let program = if predicate.is_literal_true() {
                Program::ConstTrue
            } else if predicate.is_literal_false() {
                Program::ConstFalse
            } else {
                let ast = predicate::parse(predicate.expression()).map_err(|message| {
                    StoreError::PredicateParse {
                        rule: rule.name().to_string(),
                        message,
                    }
                })?;
                Program::Compiled(ast)
            };
            programs.insert(rule.name().to_string(), program);
        }
        Ok(CompiledAclBundle { programs })
    }

    /// Number of compiled programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Execute one rule's predicate against the prepared bindings.
    ///
    /// Completes with the coerced boolean verdict, or reports the first
    /// unmaterialized relationship the expression walked through.
    pub(crate) fn execute(
        &self,
        rule: &AclRule,
        resource: &PreparedBinding,
        participant: &PreparedBinding,
        transaction: Option<&PreparedBinding>,
        state: &ResolutionState,
    ) -> std::result::Result<bool, EvalError> {
        let program = self.programs.get(rule.name()).ok_or_else(|| {
            EvalError::Fault(format!("no compiled predicate for rule '{}'", rule.name()))
        })?;

        match program {
            Program::ConstTrue => Ok(true),
            Program::ConstFalse => Ok(false),
            Program::Compiled(ast) => {
                let mut bindings = Bindings::new();
                if let Some(var) = rule.noun().variable_name() {
                    bindings.bind(var, resource.resource());
                }
                if let Some(var) = rule.participant().and_then(|b| b.variable_name()) {
                    bindings.bind(var, participant.resource());
                }
                if let Some(var) = rule.transaction().and_then(|b| b.variable_name()) {
                    if let Some(transaction) = transaction {
                        bindings.bind(var, transaction.resource());
                    }
                }
                let value = predicate::evaluate(ast, &bindings, state)?;
                Ok(predicate::truthy(&value))
            }
        }
    }
}
