//! Per-transaction evaluation context
//!
//! The surrounding transaction processor constructs one [`Session`] per
//! logical transaction and passes it into every check and registry
//! operation. The session carries the acting participant, the transaction
//! being processed (if any), and the evaluation call stack used for cyclic
//! rule detection. There is no ambient mutable controller state: two
//! sessions never observe each other.

use crate::acl::rule::{AccessLevel, AclRule};
use crate::model::Resource;
use std::sync::Mutex;

/// One frame on the evaluation call stack: which rule is being evaluated,
/// for which access level, by which participant, inside which transaction.
/// Structured fields rather than a concatenated string, so distinct inputs
/// can never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInvocation {
    rule: String,
    access: AccessLevel,
    participant: String,
    transaction: Option<String>,
}

impl RuleInvocation {
    pub fn new(
        rule: &AclRule,
        access: AccessLevel,
        participant: &Resource,
        transaction: Option<&Resource>,
    ) -> Self {
        RuleInvocation {
            rule: rule.name().to_string(),
            access,
            participant: participant.fully_qualified_identifier(),
            transaction: transaction.map(|t| t.fully_qualified_identifier()),
        }
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn access(&self) -> AccessLevel {
        self.access
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }
}

/// The evaluation call stack for one session.
///
/// Frames are pushed before a rule's predicate runs and popped afterwards.
/// Raising a cyclic error or an explicit DENY empties the stack, so the
/// next check on the same session starts clean.
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Mutex<Vec<RuleInvocation>>,
}

impl CallStack {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RuleInvocation>> {
        // A poisoned lock means a panic mid-evaluation; the stack contents
        // are unusable either way, so recover the guard.
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contains(&self, invocation: &RuleInvocation) -> bool {
        self.lock().iter().any(|frame| frame == invocation)
    }

    pub fn push(&self, invocation: RuleInvocation) {
        self.lock().push(invocation);
    }

    /// Pop the top frame if it matches. A nested frame may already have
    /// cleared the whole stack, in which case this is a no-op.
    pub fn pop(&self, invocation: &RuleInvocation) {
        let mut frames = self.lock();
        if frames.last() == Some(invocation) {
            frames.pop();
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn depth(&self) -> usize {
        self.lock().len()
    }
}

/// The identity and transaction scope of one logical transaction.
#[derive(Debug, Default)]
pub struct Session {
    participant: Option<Resource>,
    transaction: Option<Resource>,
    call_stack: CallStack,
}

impl Session {
    /// A session with no participant. Access control is opt-in per
    /// deployment: checks within an anonymous session always pass.
    pub fn anonymous() -> Self {
        Session::default()
    }

    /// A session acting as `participant`.
    pub fn for_participant(participant: Resource) -> Self {
        Session {
            participant: Some(participant),
            transaction: None,
            call_stack: CallStack::default(),
        }
    }

    /// Scope this session to a transaction being processed.
    pub fn with_transaction(mut self, transaction: Resource) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn participant(&self) -> Option<&Resource> {
        self.participant.as_ref()
    }

    pub fn transaction(&self) -> Option<&Resource> {
        self.transaction.as_ref()
    }

    pub(crate) fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }
}
