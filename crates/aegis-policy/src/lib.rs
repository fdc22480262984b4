//! # aegis-policy
//!
//! File-driven policy engine for the Aegis agent gateway.
//!
//! Policies are YAML documents in a directory. Each document grants agents
//! allowances on tools (`tool` + `actions` + optional `conditions`). The
//! [`PolicyEngine`] loads the directory, keeps a concurrency-safe
//! [`PolicyStore`] of the parsed documents, and answers
//! [`PolicyEngine::evaluate`] for every inbound tool call. A
//! [`PolicyWatcher`] reconciles the store with the directory at runtime.
//!
//! ## Key invariants
//!
//! - **Default deny**: no matching allowance → denied.
//! - **Isolated loading**: an invalid document is skipped (or keeps its last
//!   good version on reload); it never blocks other documents.
//! - **Atomic replacement**: a reader sees either the old or the new version
//!   of a document, never a mix.
//! - **Deterministic order**: sources are scanned in lexicographic order,
//!   agents and allowances in declaration order.

pub mod condition;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod store;
pub mod watcher;

pub use condition::{Condition, Params};
pub use engine::{Decision, EvaluationRequest, MatchStrategy, PolicyEngine};
pub use error::{LoadError, PolicyError};
pub use loader::LoadReport;
pub use model::{AgentPolicy, Policy, ToolAllowance};
pub use store::{PolicySummary, PolicyStore};
pub use watcher::{PolicyWatcher, DEFAULT_DEBOUNCE};
