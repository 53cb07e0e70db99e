//! Attribute-based access control
//!
//! - rule: the compiled rule model (verbs, bindings, predicate, action)
//! - matcher: pure relevance filters run before any predicate work
//! - predicate / bundle: the compiled expression engine
//! - context: per-transaction session and evaluation call stack
//! - controller: first-match-wins evaluation with DENY short-circuiting,
//!   on-demand relationship resolution, and cyclic rule detection

pub mod bundle;
pub mod context;
pub mod controller;
pub mod matcher;
pub(crate) mod predicate;
pub mod rule;

pub use bundle::CompiledAclBundle;
pub use context::{CallStack, RuleInvocation, Session};
pub use controller::AccessController;
pub use rule::{AccessLevel, AclRule, Action, BindingScope, ModelBinding, Predicate, Verb};
