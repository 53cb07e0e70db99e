//! # Tessera Core - Transactional Resource Store
//!
//! Tessera is an embedded, transactional resource store with
//! attribute-based access control. Typed resources (assets, participants,
//! transactions) live in per-type registries; every registry operation is
//! gated by an ordered list of ACL rules evaluated first-match-wins, with
//! explicit ALLOW/DENY short-circuiting.
//!
//! ## Key features
//!
//! - Declarative ACL rules over verbs, type patterns (with namespace
//!   wildcards and supertype matching), specific instances, and boolean
//!   predicates
//! - On-demand relationship resolution: predicates may walk into related
//!   resources, which are materialized lazily through the registries
//!   themselves and re-checked under the same session
//! - Cyclic rule detection, so a predicate that transitively re-enters its
//!   own evaluation fails fast instead of recursing
//! - Read paths that convert denials into absence (no existence leaks) and
//!   write paths that propagate denials verbatim
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                ResourceStore                  │
//! │  ┌──────────┐  ┌────────────┐  ┌───────────┐  │
//! │  │ Registry │─▶│   Access   │─▶│ Compiled  │  │
//! │  │ (CRUD)   │  │ Controller │  │ predicates│  │
//! │  └────┬─────┘  └─────┬──────┘  └───────────┘  │
//! │       │              │ lazy relationship      │
//! │  ┌────▼─────┐  ┌─────▼──────┐                 │
//! │  │ Storage  │  │  Registry  │                 │
//! │  │ (keyed)  │◀─│  Resolver  │                 │
//! │  └──────────┘  └────────────┘                 │
//! └───────────────────────────────────────────────┘
//! ```

pub mod acl;
pub mod errors;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod serializer;
pub mod storage;
pub mod store;

pub use acl::{
    AccessController, AccessLevel, AclRule, Action, BindingScope, CompiledAclBundle, ModelBinding,
    Predicate, RuleInvocation, Session, Verb,
};
pub use errors::{Result, StoreError};
pub use model::{ModelRegistry, Resource, ResourceKind, TypeDeclaration};
pub use registry::{Registry, RegistryEvent, RegistryManager, Removable};
pub use resolver::{PreparedBinding, RegistryResolver, RelationshipResolver, ResolutionState};
pub use serializer::{JsonSerializer, Serializer};
pub use storage::{DataCollection, MemoryCollection};
pub use store::{ResourceStore, StoreBuilder, StoreDefinition};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
