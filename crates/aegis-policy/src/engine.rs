// engine.rs — Policy evaluation engine.
//
// The PolicyEngine answers one question for the gateway: may this agent
// perform this action on this tool with these parameters? Every inbound call
// passes through `evaluate()`, which scans the current store snapshot:
//
// 1. Policies in lexicographic source_id order
// 2. Agent entries whose id matches, in declaration order
// 3. Allowances whose tool matches and whose actions contain the action
// 4. First such allowance: conditions pass → Allow; a condition fails → Deny
//    (or keep scanning, under MatchStrategy::AnyAllowance)
// 5. Nothing matched → Deny with a generic reason
//
// Default deny: an agent with no matching allowance is always denied.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::condition::{self, Params};
use crate::error::PolicyError;
use crate::loader::{self, LoadReport};
use crate::model::Policy;
use crate::store::PolicyStore;

/// A tool call submitted to the engine for evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    /// Which agent is requesting the action.
    pub agent_id: &'a str,
    /// Which downstream tool (e.g., "payments", "files").
    pub tool: &'a str,
    /// Which operation on the tool (e.g., "create", "read").
    pub action: &'a str,
    /// Request parameters the allowance conditions are checked against.
    pub params: &'a Params,
}

/// What happens after the first matching allowance fails its conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// The first matching allowance decides, pass or fail.
    #[default]
    FirstMatch,
    /// Keep scanning; deny only when no matching allowance passes.
    AnyAllowance,
}

/// The result of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    /// Empty on allow.
    pub reason: String,
    /// Source of the policy whose allowance decided the outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_source: Option<String>,
    /// Version of that policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<String>,
}

impl Decision {
    fn allow(policy: &Policy) -> Self {
        Self {
            allowed: true,
            reason: String::new(),
            policy_source: Some(policy.source_id.clone()),
            policy_version: Some(policy.version.clone()),
        }
    }

    fn deny(policy: &Policy, reason: String) -> Self {
        Self {
            allowed: false,
            reason,
            policy_source: Some(policy.source_id.clone()),
            policy_version: Some(policy.version.clone()),
        }
    }

    fn no_match(request: &EvaluationRequest<'_>) -> Self {
        Self {
            allowed: false,
            reason: format!(
                "Agent {} is not allowed to perform action {} on tool {}",
                request.agent_id, request.action, request.tool
            ),
            policy_source: None,
            policy_version: None,
        }
    }
}

/// Evaluates requests against the loaded policies.
#[derive(Debug, Default)]
pub struct PolicyEngine {
    store: Arc<PolicyStore>,
    policy_dir: Option<PathBuf>,
    strategy: MatchStrategy,
}

impl PolicyEngine {
    /// Create an empty engine (denies everything until policies are loaded).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine backed by a policy directory and load every document in it.
    ///
    /// The directory is canonicalized so that store keys match the absolute
    /// paths reported by the filesystem watcher.
    pub fn open(policy_dir: impl AsRef<Path>) -> Result<(Self, LoadReport), PolicyError> {
        let dir = policy_dir.as_ref();
        let dir = dir.canonicalize().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PolicyError::DirectoryMissing {
                    path: dir.to_path_buf(),
                }
            } else {
                PolicyError::DirectoryUnreadable {
                    path: dir.to_path_buf(),
                    source,
                }
            }
        })?;

        let store = Arc::new(PolicyStore::new());
        let report = loader::load_dir(&dir, &store)?;
        tracing::info!(
            dir = %dir.display(),
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Policy directory loaded"
        );

        let engine = Self {
            store,
            policy_dir: Some(dir),
            strategy: MatchStrategy::default(),
        };
        Ok((engine, report))
    }

    /// Set the match strategy and return self (builder pattern).
    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// The canonical policy directory, if the engine was opened from one.
    pub fn policy_dir(&self) -> Option<&Path> {
        self.policy_dir.as_deref()
    }

    /// Read-only access to the store, for diagnostics.
    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    /// Publish an already-parsed policy. Replaces any entry with the same source.
    pub fn load_policy(&self, policy: Policy) {
        self.store.insert(policy);
    }

    /// Reload one policy file. On failure the previous entry is kept.
    pub fn reload_source(&self, path: &Path) -> Result<(), PolicyError> {
        loader::reload_file(path, &self.store)
    }

    /// Drop the entry for a removed policy file. Returns true if one existed.
    pub fn remove_source(&self, path: &Path) -> bool {
        let removed = self.store.remove(&loader::source_id(path)).is_some();
        if removed {
            tracing::info!(source = %path.display(), "Removed policy file");
        }
        removed
    }

    /// Evaluate a request and return a decision.
    ///
    /// Every tool call flows through here.
    pub fn evaluate(&self, request: &EvaluationRequest<'_>) -> Decision {
        let snapshot = self.store.snapshot();
        let mut first_failure: Option<Decision> = None;

        for policy in &snapshot {
            let allowances = policy
                .agents
                .iter()
                .filter(|agent| agent.agent_id == request.agent_id)
                .flat_map(|agent| agent.allow.iter())
                .filter(|allowance| allowance.covers(request.tool, request.action));

            for allowance in allowances {
                match condition::check_all(&allowance.conditions, request.params) {
                    Ok(()) => return Decision::allow(policy),
                    Err(reason) => {
                        let denial = Decision::deny(policy, reason);
                        match self.strategy {
                            MatchStrategy::FirstMatch => return denial,
                            MatchStrategy::AnyAllowance => {
                                first_failure.get_or_insert(denial);
                            }
                        }
                    }
                }
            }
        }

        first_failure.unwrap_or_else(|| Decision::no_match(request))
    }
}
