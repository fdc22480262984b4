// store.rs — Concurrency-safe index of loaded policies.
//
// Maps source_id → Arc<Policy>. Readers clone a snapshot of the Arcs under a
// read lock and evaluate without holding it; writers hold the write lock only
// for a single insert or remove. A reader therefore sees either the old or the
// new Policy for a source, never a half-updated one.
//
// `BTreeMap` keeps sources sorted, which gives evaluation its deterministic
// lexicographic order.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::model::Policy;

/// Read-only summary of one loaded source, for diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PolicySummary {
    pub source: String,
    pub version: String,
    pub agents: usize,
}

/// The process-wide policy store.
#[derive(Debug, Default)]
pub struct PolicyStore {
    policies: RwLock<BTreeMap<String, Arc<Policy>>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a policy, replacing any previous entry for the same source.
    /// Returns the replaced policy, if any.
    pub fn insert(&self, policy: Policy) -> Option<Arc<Policy>> {
        let policy = Arc::new(policy);
        self.write().insert(policy.source_id.clone(), policy)
    }

    /// Delete the entry for a source. Returns the removed policy, if any.
    pub fn remove(&self, source_id: &str) -> Option<Arc<Policy>> {
        self.write().remove(source_id)
    }

    /// Look up the current policy for a source.
    pub fn get(&self, source_id: &str) -> Option<Arc<Policy>> {
        self.read().get(source_id).cloned()
    }

    /// All current policies, ordered by source_id.
    pub fn snapshot(&self) -> Vec<Arc<Policy>> {
        self.read().values().cloned().collect()
    }

    /// Source identifiers currently loaded, in order.
    pub fn sources(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn summaries(&self) -> Vec<PolicySummary> {
        self.snapshot()
            .iter()
            .map(|p| PolicySummary {
                source: p.source_id.clone(),
                version: p.version.clone(),
                agents: p.agents.len(),
            })
            .collect()
    }

    // A panic while holding the lock cannot leave the map half-written (every
    // critical section is a single insert/remove/clone), so poisoning is safe
    // to ignore.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<Policy>>> {
        self.policies.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<Policy>>> {
        self.policies.write().unwrap_or_else(|e| e.into_inner())
    }
}
